#[cfg(not(target_arch = "wasm32"))]
mod native {
    use tracing::{error, info};
    use tracing_subscriber::EnvFilter;

    use warble::config::Config;
    use warble::core::store::{FileStore, KvStore, MemoryStore};
    use warble::graph;
    use warble::server;

    fn repair_graph(store: &dyn KvStore) {
        match graph::repair_pending(store) {
            Ok(0) => {}
            Ok(resolved) => info!(resolved, "restored asymmetric follow edges"),
            Err(err) => error!(error = %err, "graph repair pass failed"),
        }
    }

    pub async fn run() -> std::io::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();

        let config = Config::load();

        match config.data_dir.clone() {
            Some(dir) => {
                let store = FileStore::open(&dir).map_err(std::io::Error::other)?;
                info!(data_dir = %dir, "using file store");
                repair_graph(&store);
                server::run(config, store).await
            }
            None => {
                info!("WARBLE_DATA_DIR not set, data lives in memory only");
                server::run(config, MemoryStore::new()).await
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
