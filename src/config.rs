use std::env;

use tracing::{info, warn};

pub const MAX_TWEET_LENGTH: usize = 140;
pub const MAX_BIO_LENGTH: usize = 280;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Larger `limit` query values are clamped to this.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Largest accepted profile picture upload, in bytes.
pub const MAX_PICTURE_BYTES: usize = 8_000_000;
/// Side of the stored full-size picture; uploads must be at least this big.
pub const PICTURE_ORIGINAL_SIZE: u32 = 685;
pub const PICTURE_THUMB_SIZE: u32 = 360;

/// Picture name of users that never uploaded one.
pub const DEFAULT_PICTURE: &str = "default";

pub const GRAPH_REPAIRS_KEY: &str = "graph_repairs";

const DEFAULT_JWT_SECRET: &str = "jwt_hash_secret";
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_UPLOADS_DIR: &str = "uploads";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn tweet_key(id: &str) -> String {
    format!("tweet:{}", id)
}

/// Unique index from a normalised email to the owning user id.
pub fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

/// Unique index from a username to the owning user id.
pub fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

/// Newest-first list of tweet ids written by one author.
pub fn author_tweets_key(author_id: &str) -> String {
    format!("tweets:{}", author_id)
}

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    /// Public base URL used to build picture links, without trailing slash.
    pub site_url: String,
    pub bind_addr: String,
    /// Directory for the file-backed store; in-memory storage when unset.
    pub data_dir: Option<String>,
    /// Root of the `uf/` picture tree served under `/uf/...`.
    pub uploads_dir: String,
}

impl Config {
    pub fn load() -> Self {
        let jwt_secret = env::var("WARBLE_JWT_SECRET").unwrap_or_else(|_| {
            warn!("WARBLE_JWT_SECRET not set, signing tokens with the built-in secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            jwt_secret,
            site_url: var_or("WARBLE_SITE_URL", DEFAULT_SITE_URL)
                .trim_end_matches('/')
                .to_string(),
            bind_addr: var_or("WARBLE_BIND_ADDR", DEFAULT_BIND_ADDR),
            data_dir: env::var("WARBLE_DATA_DIR").ok().filter(|dir| !dir.is_empty()),
            uploads_dir: var_or("WARBLE_UPLOADS_DIR", DEFAULT_UPLOADS_DIR),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            data_dir: None,
            uploads_dir: DEFAULT_UPLOADS_DIR.to_string(),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}
