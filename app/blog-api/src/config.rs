//! Application Configuration
//!
//! Server, storage and paging settings loaded from environment variables.
//! Authentication settings live in [`blognest_auth::AuthConfig`].

use crate::services::ServiceError;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string (from DATABASE_URL env var)
    pub database_url: String,

    /// Listen address (from SERVER_ADDR env var)
    pub server_addr: SocketAddr,

    /// Directory served under `/uploads` (from UPLOADS_DIR env var)
    pub uploads_dir: PathBuf,

    /// Largest accepted image upload in bytes (from MAX_UPLOAD_BYTES env var)
    pub max_upload_bytes: usize,

    /// Allowed browser origin; any origin when unset (from CORS_ORIGIN env var)
    pub cors_origin: Option<String>,

    /// Default page size for post listings (from POSTS_PER_PAGE env var)
    pub posts_per_page: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://blognest.db".to_string(),
            server_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            uploads_dir: PathBuf::from("./uploads"),
            max_upload_bytes: 2 * 1024 * 1024,
            cors_origin: None,
            posts_per_page: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ServiceError> {
        let defaults = Self::default();

        let server_addr = match env::var("SERVER_ADDR") {
            Ok(addr) => addr
                .parse()
                .map_err(|_| ServiceError::Config(format!("Invalid SERVER_ADDR: {}", addr)))?,
            Err(_) => defaults.server_addr,
        };

        let config = Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            server_addr,
            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| !o.trim().is_empty()),
            posts_per_page: parsed("POSTS_PER_PAGE", defaults.posts_per_page),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.max_upload_bytes == 0 {
            return Err(ServiceError::Config(
                "MAX_UPLOAD_BYTES must be positive".to_string(),
            ));
        }

        if !(1..=100).contains(&self.posts_per_page) {
            return Err(ServiceError::Config(
                "POSTS_PER_PAGE must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
