//! Authentication Models
//!
//! Data structures for authentication requests, responses, and database entities.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use std::sync::OnceLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============================================
// Database Entities
// ============================================

/// User entity from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored refresh token (one row per currently valid token)
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

// ============================================
// Field Validators
// ============================================

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Rejects values that are empty or only whitespace
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(validation_error(
            "blank",
            "Fields are required and cannot be empty or contain only spaces",
        ));
    }
    Ok(())
}

/// Basic `local@domain.tld` shape check on the trimmed value
pub fn email_format(value: &str) -> Result<(), ValidationError> {
    if !email_regex().is_match(value.trim()) {
        return Err(validation_error("email", "Invalid email format"));
    }
    Ok(())
}

/// Required email: non-blank and well formed
pub fn email_field(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    email_format(value)
}

/// Canonical form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================
// Request DTOs
// ============================================

/// Registration request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = "email_field"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

/// Body carrying a refresh token (logout, refresh)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RefreshTokenRequest {
    /// The token, if present and non-blank
    pub fn token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Partial profile update; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

impl UpdateProfileRequest {
    /// Shape checks that do not need the database
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            not_blank(name)?;
        }
        if let Some(email) = &self.email {
            email_field(email)?;
        }
        if self.new_password.is_some() && self.old_password.is_none() {
            return Err(validation_error(
                "old_password",
                "Old password is required to update the password",
            ));
        }
        Ok(())
    }
}

// ============================================
// Response DTOs
// ============================================

/// Public profile fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
        }
    }
}

/// Freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Access token including the `Bearer ` scheme marker
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful registration or login
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// JSON envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
            access_token: None,
            refresh_token: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
        self
    }
}

impl ApiResponse<()> {
    /// Envelope with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
            data: None,
            access_token: None,
            refresh_token: None,
        }
    }

    /// Envelope with tokens and no data
    pub fn tokens(tokens: TokenPair) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: None,
            access_token: None,
            refresh_token: None,
        }
        .with_tokens(tokens)
    }
}

// ============================================
// JWT Claims
// ============================================

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub jti: Uuid,
}

/// JWT claims for refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Unique per token so two tokens issued in the same second differ
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}
