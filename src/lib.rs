//! Backend for a small microblogging service.
//!
//! Handlers speak `spin_sdk::http` request/response types so the same router
//! serves both the Spin component (`wasm32`) and the native actix server.

pub mod auth;
pub mod config;
pub mod core;
pub mod feed;
pub mod follow;
pub mod graph;
pub mod models;
pub mod pictures;
pub mod router;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;
pub mod token;
pub mod tweets;
pub mod users;

use crate::config::Config;
use crate::core::store::KvStore;
use crate::token::TokenService;

/// Everything a handler needs for one request: immutable configuration, the
/// token service built from it, and the document store.
pub struct AppContext {
    pub config: Config,
    pub tokens: TokenService,
    store: Box<dyn KvStore>,
}

impl AppContext {
    pub fn new(config: Config, store: impl KvStore + 'static) -> Self {
        let tokens = TokenService::new(&config.jwt_secret);
        Self {
            config,
            tokens,
            store: Box::new(store),
        }
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }
}

#[cfg(target_arch = "wasm32")]
#[spin_sdk::http_component]
fn handle(req: spin_sdk::http::Request) -> anyhow::Result<impl spin_sdk::http::IntoResponse> {
    let store = crate::core::store::SpinStore::open_default()?;
    let ctx = AppContext::new(Config::load(), store);
    Ok(router::route(&ctx, req))
}
