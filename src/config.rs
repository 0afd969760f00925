//! Environment-derived server configuration.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn};

/// Runtime configuration for the relab server.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the API binds to.
    pub port: u16,
    /// Postgres connection string.
    pub database_url: String,
    /// Secret used to sign and verify bearer tokens (HS256).
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: i64,
    /// Directory attachments are stored in.
    pub upload_dir: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RELAB_PORT", "8080"),
            database_url: try_load(
                "DATABASE_URL",
                "postgresql://localhost:5432/relab",
            ),
            jwt_secret: try_load("RELAB_JWT_SECRET", "change-me-in-production"),
            token_ttl_secs: try_load("RELAB_TOKEN_TTL_SECS", "86400"),
            upload_dir: try_load("RELAB_UPLOAD_DIR", "./uploads"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
