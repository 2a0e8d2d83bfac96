//! Authentication Middleware
//!
//! Access token validation using the service's verification keys.

use crate::error::AuthError;
use crate::models::AccessTokenClaims;
use crate::service::{AuthService, BEARER_PREFIX};

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract and validate the access token from an Authorization header value
pub fn validate_header(
    auth: &AuthService,
    header: Option<&str>,
) -> Result<AccessTokenClaims, AuthError> {
    let header = header.ok_or(AuthError::Unauthorized)?;

    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::Unauthorized)?;

    auth.validate_access_token(token)
}

/// Require authenticated user
///
/// Validates the access token from the Authorization header and stores
/// the claims in request extensions for use by extractors.
pub async fn require_auth(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let claims = validate_header(&auth, header)?;

    tracing::trace!(user_id = %claims.sub, "Request authenticated");
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
