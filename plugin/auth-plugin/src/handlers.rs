//! Authentication HTTP Handlers
//!
//! REST API endpoints for accounts, sessions and profiles. Mounted by the
//! application under `/api/user`.

use crate::error::AuthError;
use crate::extractors::{AuthUser, JsonBody};
use crate::middleware;
use crate::models::*;
use crate::service::AuthService;

use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::sync::Arc;

/// Shared auth service state
pub type AuthState = Arc<AuthService>;

// ============================================
// Route Builder
// ============================================

/// Create authentication routes
pub fn create_routes(auth_service: Arc<AuthService>) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/", get(greeting))
        .route("/test", get(test_route))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token));

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/profile", get(get_profile))
        .route("/update", patch(update_profile))
        .route("/delete", delete(delete_profile))
        .layer(axum_middleware::from_fn_with_state(
            auth_service.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(auth_service)
}

/// GET /
async fn greeting() -> &'static str {
    "Hello from the user router"
}

/// GET /test
async fn test_route() -> impl IntoResponse {
    Json(ApiResponse::message("User router is working"))
}

// ============================================
// Registration
// ============================================

/// POST /register
///
/// Create an account and sign it in
pub async fn register(
    State(auth): State<AuthState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = auth.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::success(session.user)
                .with_message("User registered successfully")
                .with_tokens(session.tokens),
        ),
    ))
}

// ============================================
// Login / Logout
// ============================================

/// POST /login
///
/// Authenticate user and return access/refresh tokens
pub async fn login(
    State(auth): State<AuthState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = auth.login(req).await?;

    Ok(Json(
        ApiResponse::success(session.user)
            .with_message("Login successful")
            .with_tokens(session.tokens),
    ))
}

/// POST /logout
///
/// Remove one refresh token from the caller's valid set
pub async fn logout(
    State(auth): State<AuthState>,
    user: AuthUser,
    body: Option<JsonBody<RefreshTokenRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let req = body.map(|JsonBody(req)| req).unwrap_or_default();
    let token = req
        .token()
        .ok_or_else(|| AuthError::Validation("Refresh token is required".to_string()))?;

    auth.logout(user.id, token).await?;

    Ok(Json(ApiResponse::message("Logged out successfully")))
}

// ============================================
// Token Refresh
// ============================================

/// POST /refresh
///
/// Exchange refresh token for new token pair
pub async fn refresh_token(
    State(auth): State<AuthState>,
    body: Option<JsonBody<RefreshTokenRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let req = body.map(|JsonBody(req)| req).unwrap_or_default();
    let token = req.token().ok_or(AuthError::MissingRefreshToken)?;

    let tokens = auth.refresh_tokens(token).await?;

    Ok(Json(ApiResponse::tokens(tokens)))
}

// ============================================
// Profile
// ============================================

/// GET /profile
pub async fn get_profile(
    State(auth): State<AuthState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    let profile = auth.profile(user.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// PATCH /update
pub async fn update_profile(
    State(auth): State<AuthState>,
    user: AuthUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let profile = auth.update_profile(user.id, req).await?;

    Ok(Json(
        ApiResponse::success(profile).with_message("Profile updated successfully"),
    ))
}

/// DELETE /delete
pub async fn delete_profile(
    State(auth): State<AuthState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    auth.delete_account(user.id).await?;
    Ok(Json(ApiResponse::message("User deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn app() -> Router {
        let auth = Arc::new(AuthService::new(crate::test_pool().await, test_config()));
        create_routes(auth)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, email: &str) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/register",
                serde_json::json!({"name": "Ada", "email": email, "password": "secret1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_register_then_profile() {
        let app = app().await;
        let body = register(&app, "ada@example.com").await;

        let access = body["accessToken"].as_str().unwrap();
        assert!(access.starts_with("Bearer "));
        assert_eq!(body["data"]["email"], "ada@example.com");
        assert!(body["data"].get("password_hash").is_none());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/profile")
                    .header(header::AUTHORIZATION, access)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let app = app().await;
        register(&app, "ada@example.com").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/register",
                serde_json::json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_short_password() {
        let app = app().await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/register",
                serde_json::json!({"name": "Ada", "email": "ada@example.com", "password": " 12345 "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_envelope() {
        let app = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_wrong_password_returns_no_token() {
        let app = app().await;
        register(&app, "ada@example.com").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/login",
                serde_json::json!({"email": "ada@example.com", "password": "nope-nope"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body.get("accessToken").is_none());
        assert!(body.get("refreshToken").is_none());
    }

    #[tokio::test]
    async fn test_refresh_missing_and_reused() {
        let app = app().await;
        let body = register(&app, "ada@example.com").await;
        let refresh = body["refreshToken"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/refresh", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/refresh",
                serde_json::json!({"refreshToken": refresh}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rotated = body_json(response).await;
        assert!(rotated["accessToken"].as_str().unwrap().starts_with("Bearer "));

        let response = app
            .oneshot(json_request(
                "POST",
                "/refresh",
                serde_json::json!({"refreshToken": refresh}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_logout_requires_token_and_auth() {
        let app = app().await;
        let body = register(&app, "ada@example.com").await;
        let access = body["accessToken"].as_str().unwrap().to_string();
        let refresh = body["refreshToken"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/logout",
                serde_json::json!({"refreshToken": refresh}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut missing = json_request("POST", "/logout", serde_json::json!({}));
        missing
            .headers_mut()
            .insert(header::AUTHORIZATION, access.parse().unwrap());
        let response = app.clone().oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut ok = json_request("POST", "/logout", serde_json::json!({"refreshToken": refresh}));
        ok.headers_mut()
            .insert(header::AUTHORIZATION, access.parse().unwrap());
        let response = app.oneshot(ok).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_without_old_password() {
        let app = app().await;
        let body = register(&app, "ada@example.com").await;
        let access = body["accessToken"].as_str().unwrap().to_string();

        let mut req = json_request("PATCH", "/update", serde_json::json!({"newPassword": "another1"}));
        req.headers_mut()
            .insert(header::AUTHORIZATION, access.parse().unwrap());
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_greeting_and_test_routes() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "success");
    }
}
