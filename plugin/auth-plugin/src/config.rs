//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::AuthError;
use std::env;

/// Smallest password length the service will ever accept (after trimming).
pub const MIN_PASSWORD_FLOOR: usize = 6;

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing access tokens (from JWT_ACCESS_SECRET env var)
    pub access_secret: String,

    /// Secret for signing refresh tokens (from JWT_REFRESH_SECRET env var)
    pub refresh_secret: String,

    /// Access token expiration in seconds (from JWT_ACCESS_EXPIRATION env var)
    pub access_token_expiration: i64,

    /// Refresh token expiration in seconds (from JWT_REFRESH_EXPIRATION env var)
    pub refresh_token_expiration: i64,

    /// JWT issuer (from JWT_ISSUER env var)
    pub jwt_issuer: String,

    /// JWT audience of access tokens (from JWT_AUDIENCE env var)
    pub jwt_audience: String,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Minimum trimmed password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,
}

impl AuthConfig {
    /// Load configuration from environment variables
    ///
    /// Both signing secrets are required; everything else has a default.
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            access_secret: required("JWT_ACCESS_SECRET")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            access_token_expiration: parsed("JWT_ACCESS_EXPIRATION", 900), // 15 minutes
            refresh_token_expiration: parsed("JWT_REFRESH_EXPIRATION", 604800), // 7 days
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "blognest".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "blognest-api".to_string()),
            argon2_memory_cost: parsed("ARGON2_MEMORY_COST", 19456), // 19 MiB
            argon2_time_cost: parsed("ARGON2_TIME_COST", 2),
            argon2_parallelism: parsed("ARGON2_PARALLELISM", 1),
            min_password_length: parsed("MIN_PASSWORD_LENGTH", MIN_PASSWORD_FLOOR),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_ACCESS_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.refresh_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_REFRESH_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Config(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ".to_string(),
            ));
        }

        if self.access_token_expiration <= 0 {
            return Err(AuthError::Config(
                "JWT_ACCESS_EXPIRATION must be positive".to_string(),
            ));
        }

        if self.refresh_token_expiration <= self.access_token_expiration {
            return Err(AuthError::Config(
                "JWT_REFRESH_EXPIRATION must be greater than JWT_ACCESS_EXPIRATION".to_string(),
            ));
        }

        if self.min_password_length < MIN_PASSWORD_FLOOR {
            return Err(AuthError::Config(format!(
                "MIN_PASSWORD_LENGTH must be at least {}",
                MIN_PASSWORD_FLOOR
            )));
        }

        Ok(())
    }
}

fn required(key: &str) -> Result<String, AuthError> {
    env::var(key).map_err(|_| AuthError::Config(format!("{} environment variable must be set", key)))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        access_secret: "a".repeat(32),
        refresh_secret: "r".repeat(32),
        access_token_expiration: 900,
        refresh_token_expiration: 604800,
        jwt_issuer: "test".to_string(),
        jwt_audience: "test-api".to_string(),
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        min_password_length: 6,
    }
}
