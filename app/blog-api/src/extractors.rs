//! Request Extractors
//!
//! Wrappers over axum's `Path`, `Query` and `Multipart` that report bad input
//! with the API error envelope instead of a plain-text rejection.

use crate::services::ServiceError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// Path parameters
#[derive(Debug)]
pub struct PathParam<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParam(value)),
            Err(rejection) => {
                tracing::debug!("Rejected path: {}", rejection.body_text());
                Err(ServiceError::Validation("Invalid path parameter".into()))
            }
        }
    }
}

/// Query string parameters
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => {
                tracing::debug!("Rejected query: {}", rejection.body_text());
                Err(ServiceError::Validation("Invalid query parameters".into()))
            }
        }
    }
}

/// `multipart/form-data` body
pub struct MultipartForm(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Multipart::from_request(req, state).await {
            Ok(multipart) => Ok(MultipartForm(multipart)),
            Err(rejection) => {
                tracing::debug!("Rejected multipart body: {}", rejection.body_text());
                Err(ServiceError::Validation(
                    "Expected a multipart/form-data request body".into(),
                ))
            }
        }
    }
}
