//! Authentication Extractors
//!
//! Axum extractors for the authenticated user and JSON bodies.

use crate::error::AuthError;
use crate::models::AccessTokenClaims;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Authenticated user information extracted from access token claims
///
/// Only available behind [`crate::middleware::require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl AuthUser {
    /// Create user from JWT claims
    pub fn from_claims(claims: &AccessTokenClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email.clone(),
            name: claims.name.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessTokenClaims>()
            .map(AuthUser::from_claims)
            .ok_or(AuthError::Unauthorized)
    }
}

/// `Json` that reports malformed bodies with the API error envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> AuthError {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AuthError::Validation("Expected a JSON request body".to_string())
        }
        _ => AuthError::Validation("Malformed JSON request body".to_string()),
    }
}
