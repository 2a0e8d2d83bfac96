//! Authentication Service
//!
//! Core authentication logic including password hashing, JWT generation,
//! refresh token rotation and profile management.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::*;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Scheme marker prefixed to access tokens handed to clients
pub const BEARER_PREFIX: &str = "Bearer ";

/// Notified after an account has been removed from the store
#[async_trait]
pub trait AccountListener: Send + Sync {
    async fn account_deleted(&self, user: &User);
}

/// Authentication service
pub struct AuthService {
    db: SqlitePool,
    config: AuthConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    listener: Option<Arc<dyn AccountListener>>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(db: SqlitePool, config: AuthConfig) -> Self {
        let access_encoding = EncodingKey::from_secret(config.access_secret.as_bytes());
        let access_decoding = DecodingKey::from_secret(config.access_secret.as_bytes());
        let refresh_encoding = EncodingKey::from_secret(config.refresh_secret.as_bytes());
        let refresh_decoding = DecodingKey::from_secret(config.refresh_secret.as_bytes());

        Self {
            db,
            config,
            access_encoding,
            access_decoding,
            refresh_encoding,
            refresh_decoding,
            listener: None,
        }
    }

    /// Attach a listener for account deletion
    pub fn with_listener(mut self, listener: Arc<dyn AccountListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get reference to the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ============================================
    // Password Hashing
    // ============================================

    fn argon2(&self) -> Result<Argon2<'static>, AuthError> {
        let params = Params::new(
            self.config.argon2_memory_cost,
            self.config.argon2_time_cost,
            self.config.argon2_parallelism,
            None,
        )
        .map_err(|_| AuthError::Internal)?;

        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    /// Hash a password using Argon2id
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        Ok(hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::Internal)?;

        Ok(self
            .argon2()?
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Enforce the minimum length, counted without surrounding whitespace
    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.trim().chars().count() < self.config.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters long (excluding spaces)",
                self.config.min_password_length
            )));
        }
        Ok(())
    }

    // ============================================
    // JWT Token Generation
    // ============================================

    /// Generate an access token for a user (without the scheme marker)
    pub fn generate_access_token(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_expiration);

        let claims = AccessTokenClaims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        Ok(token)
    }

    /// Generate a signed refresh token; the caller is responsible for storing it
    pub fn generate_refresh_token(
        &self,
        user_id: Uuid,
    ) -> Result<(String, RefreshTokenClaims), AuthError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.refresh_token_expiration);

        let claims = RefreshTokenClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        Ok((token, claims))
    }

    /// Validate an access token, with or without the `Bearer ` marker
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim();

        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);

        let token_data = decode::<AccessTokenClaims>(token, &self.access_decoding, &validation)?;

        Ok(token_data.claims)
    }

    /// Verify a refresh token's signature, expiry and issuer
    pub fn decode_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.jwt_issuer]);

        let token_data = decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &validation)?;

        Ok(token_data.claims)
    }

    /// Hash a token for storage (SHA256)
    fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Issue a token pair and add the refresh token to the user's valid set
    async fn issue_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access_token = self.generate_access_token(user)?;
        let (refresh_token, claims) = self.generate_refresh_token(user.id)?;

        self.prune_expired_tokens(user.id).await?;
        self.store_refresh_token(&self.db, &refresh_token, &claims)
            .await?;

        Ok(TokenPair {
            access_token: format!("{}{}", BEARER_PREFIX, access_token),
            refresh_token,
        })
    }

    async fn store_refresh_token<'e, E>(
        &self,
        executor: E,
        token: &str,
        claims: &RefreshTokenClaims,
    ) -> Result<(), AuthError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::seconds(self.config.refresh_token_expiration);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(claims.jti)
        .bind(claims.sub)
        .bind(self.hash_token(token))
        .bind(issued_at)
        .bind(expires_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Drop stored tokens whose lifetime has passed
    async fn prune_expired_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND expires_at < $2")
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(
                user_id = %user_id,
                pruned = result.rows_affected(),
                "Pruned expired refresh tokens"
            );
        }

        Ok(())
    }

    /// Currently valid refresh tokens stored for a user
    pub async fn refresh_tokens_for(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, AuthError> {
        let tokens = sqlx::query_as(
            "SELECT * FROM refresh_tokens WHERE user_id = $1 ORDER BY issued_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(tokens)
    }

    // ============================================
    // User Registration
    // ============================================

    /// Register a new user and sign them in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AuthError> {
        req.validate()?;
        self.validate_password(&req.password)?;

        let email = normalize_email(&req.email);

        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = self.hash_password(&req.password)?;
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(&email)
        .bind(&password_hash)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        let tokens = self.issue_tokens(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(AuthSession {
            user: UserResponse::from(user),
            tokens,
        })
    }

    // ============================================
    // Login / Logout
    // ============================================

    /// Attempt to login a user
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AuthError> {
        req.validate()?;

        let user = self
            .get_user_by_email(&normalize_email(&req.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&user).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthSession {
            user: UserResponse::from(user),
            tokens,
        })
    }

    /// Logout by removing one refresh token from the user's valid set
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.decode_refresh_token(refresh_token)?;

        if claims.sub != user_id {
            tracing::warn!(
                user_id = %user_id,
                token_owner = %claims.sub,
                "Logout attempted with another user's refresh token"
            );
            return Err(AuthError::Forbidden);
        }

        self.get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2")
            .bind(user_id)
            .bind(self.hash_token(refresh_token))
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::InvalidRefreshToken);
        }

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    // ============================================
    // Token Refresh
    // ============================================

    /// Exchange a refresh token for a new pair (with rotation)
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .decode_refresh_token(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .get_user(claims.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let access_token = self.generate_access_token(&user)?;
        let (new_refresh_token, new_claims) = self.generate_refresh_token(user.id)?;

        let mut tx = self.db.begin().await?;

        // Consuming the old token must hit exactly one row; a replayed or
        // concurrently used token finds nothing and is rejected.
        let consumed = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2")
            .bind(user.id)
            .bind(self.hash_token(refresh_token))
            .execute(&mut *tx)
            .await?;

        if consumed.rows_affected() != 1 {
            tracing::warn!(user_id = %user.id, "Rejected unknown or already used refresh token");
            return Err(AuthError::InvalidRefreshToken);
        }

        self.store_refresh_token(&mut *tx, &new_refresh_token, &new_claims)
            .await?;

        tx.commit().await?;

        tracing::debug!(user_id = %user.id, "Refresh token rotated");

        Ok(TokenPair {
            access_token: format!("{}{}", BEARER_PREFIX, access_token),
            refresh_token: new_refresh_token,
        })
    }

    // ============================================
    // Profile
    // ============================================

    /// Public profile of a user
    pub async fn profile(&self, user_id: Uuid) -> Result<UserResponse, AuthError> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserResponse::from(user))
    }

    /// Update name, email and/or password of a user
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse, AuthError> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        req.validate_fields()
            .map_err(|e| AuthError::Validation(describe(&e)))?;

        if let Some(name) = &req.name {
            user.name = name.trim().to_string();
        }

        if let Some(email) = &req.email {
            let email = normalize_email(email);
            if email != user.email {
                if let Some(other) = self.get_user_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(AuthError::EmailExists);
                    }
                }
                user.email = email;
            }
        }

        if let Some(new_password) = &req.new_password {
            let old_password = req.old_password.as_deref().unwrap_or_default();
            if !self.verify_password(old_password, &user.password_hash)? {
                return Err(AuthError::IncorrectPassword);
            }
            self.validate_password(new_password)?;
            user.password_hash = self.hash_password(new_password)?;
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET name = $2, email = $3, password_hash = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            user_id = %user.id,
            password_changed = req.new_password.is_some(),
            "Profile updated"
        );

        Ok(UserResponse::from(user))
    }

    /// Point the user's avatar at a new public path
    ///
    /// Returns the updated profile and the previous avatar path, if any.
    pub async fn set_avatar(
        &self,
        user_id: Uuid,
        avatar: &str,
    ) -> Result<(UserResponse, Option<String>), AuthError> {
        let previous = self
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?
            .avatar;

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET avatar = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(avatar)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok((UserResponse::from(user), previous))
    }

    /// Delete an account together with its refresh tokens
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), AuthError> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Account deleted");

        if let Some(listener) = &self.listener {
            listener.account_deleted(&user).await;
        }

        Ok(())
    }

    // ============================================
    // User Lookup Helpers
    // ============================================

    /// Get user by ID
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    /// Get user by (normalized) email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

fn describe(err: &validator::ValidationError) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string())
}
