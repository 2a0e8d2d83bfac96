//! Blog API Handlers

pub mod media;
pub mod posts;

use crate::models::ApiError;
use crate::services::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Convert service errors to HTTP responses
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ServiceError::Auth(err) => return err.into_response(),
            ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ServiceError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ServiceError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "permission_denied",
                ServiceError::PermissionDenied.to_string(),
            ),
            ServiceError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            ServiceError::Storage(msg) | ServiceError::Config(msg) => {
                tracing::error!("Server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ApiError::new(error, &message))).into_response()
    }
}
