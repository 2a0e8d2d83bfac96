//! BlogNest Authentication Plugin
//!
//! Account and session management for BlogNest providing:
//! - User registration and login
//! - JWT access and refresh tokens signed with separate secrets
//! - Argon2id password hashing
//! - Refresh token rotation against a per-user set of valid tokens
//! - Profile read, update and deletion
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_ACCESS_SECRET` - Secret for signing access tokens (required, min 32 chars)
//! - `JWT_REFRESH_SECRET` - Secret for signing refresh tokens (required, min 32 chars)
//! - `JWT_ACCESS_EXPIRATION` - Access token expiration in seconds (default: 900)
//! - `JWT_REFRESH_EXPIRATION` - Refresh token expiration in seconds (default: 604800)
//! - `JWT_ISSUER` - JWT issuer claim (default: "blognest")
//! - `JWT_AUDIENCE` - JWT audience claim (default: "blognest-api")
//! - `MIN_PASSWORD_LENGTH` - Minimum trimmed password length (default and floor: 6)
//!
//! # Usage
//!
//! ```rust,ignore
//! use blognest_auth::{AuthConfig, AuthPlugin};
//!
//! let plugin = AuthPlugin::new();
//! plugin.activate(pool.clone(), AuthConfig::from_env()?).await?;
//!
//! let auth = plugin.auth_service().await.ok_or("auth plugin inactive")?;
//! let router = Router::new().nest("/api/user", blognest_auth::create_routes(auth));
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use config::AuthConfig;
pub use error::AuthError;
pub use extractors::{AuthUser, JsonBody};
pub use handlers::AuthState;
pub use models::*;
pub use service::{AccountListener, AuthService};

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Plugin metadata
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
}

// ============================================
// Auth Plugin Implementation
// ============================================

/// BlogNest Authentication Plugin
pub struct AuthPlugin {
    info: PluginInfo,
    auth_service: RwLock<Option<Arc<AuthService>>>,
    listener: Option<Arc<dyn AccountListener>>,
}

impl AuthPlugin {
    /// Create a new auth plugin instance
    pub fn new() -> Self {
        Self {
            info: PluginInfo {
                id: "blognest-auth".into(),
                name: "BlogNest Authentication".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            auth_service: RwLock::new(None),
            listener: None,
        }
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Forward account deletions to `listener` once activated
    pub fn with_listener(mut self, listener: Arc<dyn AccountListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get the authentication service, `None` until activated
    pub async fn auth_service(&self) -> Option<Arc<AuthService>> {
        self.auth_service.read().await.clone()
    }

    /// Validate `config`, create the auth tables and start the service
    pub async fn activate(&self, db: SqlitePool, config: AuthConfig) -> Result<(), AuthError> {
        tracing::info!(
            plugin = %self.info.id,
            version = %self.info.version,
            "Activating {}",
            self.info.name
        );

        config.validate()?;
        run_migrations(&db).await?;

        let mut service = AuthService::new(db, config);
        if let Some(listener) = &self.listener {
            service = service.with_listener(listener.clone());
        }

        *self.auth_service.write().await = Some(Arc::new(service));

        tracing::info!("{} activated", self.info.name);
        Ok(())
    }
}

impl Default for AuthPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the authentication tables if they do not exist
pub async fn run_migrations(db: &SqlitePool) -> Result<(), AuthError> {
    tracing::info!("Running authentication database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            avatar TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(db)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id BLOB PRIMARY KEY NOT NULL,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL UNIQUE,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#,
    )
    .execute(db)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);")
        .execute(db)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires ON refresh_tokens(expires_at);",
    )
    .execute(db)
    .await?;

    tracing::info!("Authentication migrations completed");
    Ok(())
}

/// Create authentication routes
///
/// Relative paths; nest the returned router under `/api/user`.
pub fn create_routes(auth_service: Arc<AuthService>) -> Router {
    handlers::create_routes(auth_service)
}

/// Single-connection in-memory database with the auth tables
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

// ============================================
// Module Tests
// ============================================
