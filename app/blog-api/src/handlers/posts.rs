//! Post Handlers

use crate::extractors::{PathParam, QueryParams};
use crate::models::*;
use crate::services::ServiceError;
use crate::BlogServices;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use blognest_auth::{ApiResponse, AuthUser, JsonBody};
use std::sync::Arc;
use uuid::Uuid;

/// GET /api/posts - List posts, newest first
pub async fn list_posts(
    State(services): State<Arc<BlogServices>>,
    QueryParams(query): QueryParams<PostQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = services.posts.list(&query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(services): State<Arc<BlogServices>>,
    PathParam(id): PathParam<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let post = services.posts.get_by_id(id).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// GET /api/posts/category/:category
pub async fn posts_by_category(
    State(services): State<Arc<BlogServices>>,
    PathParam(category): PathParam<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let posts = services.posts.list_by_category(&category).await?;
    Ok(Json(ApiResponse::success(posts)))
}

/// GET /api/posts/user/:user_id
pub async fn posts_by_user(
    State(services): State<Arc<BlogServices>>,
    PathParam(user_id): PathParam<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let posts = services.posts.list_by_author(user_id).await?;
    Ok(Json(ApiResponse::success(posts)))
}

/// POST /api/posts - Create a new post
pub async fn create_post(
    State(services): State<Arc<BlogServices>>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let post = services.posts.create(user.id, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(post).with_message("Post created successfully")),
    ))
}

/// PATCH /api/posts/:id - Update a post
pub async fn update_post(
    State(services): State<Arc<BlogServices>>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<UpdatePostRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let post = services.posts.update(id, user.id, req).await?;

    Ok(Json(
        ApiResponse::success(post).with_message("Post updated successfully"),
    ))
}

/// DELETE /api/posts/:id - Delete a post
pub async fn delete_post(
    State(services): State<Arc<BlogServices>>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let post = services.posts.delete(id, user.id).await?;

    if let Some(thumbnail) = &post.thumbnail {
        services.media.remove(thumbnail).await;
    }

    Ok(Json(ApiResponse::message("Post deleted successfully")))
}
