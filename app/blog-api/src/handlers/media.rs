//! Media Handlers
//!
//! Avatar and thumbnail uploads. Files land in the uploads directory and are
//! served back under `/uploads`.

use crate::extractors::{MultipartForm, PathParam};
use crate::services::{thumbnail_dir, ServiceError, Upload, AVATAR_DIR};
use crate::BlogServices;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use blognest_auth::{ApiResponse, AuthUser};
use std::sync::Arc;
use uuid::Uuid;

/// Read the file sent in multipart field `field_name`
async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<Upload, ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(e.body_text()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);

        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::Validation(e.body_text()))?;

        if data.len() > max_bytes {
            return Err(ServiceError::Validation(format!(
                "File too large. Max size: {} bytes",
                max_bytes
            )));
        }

        return Ok(Upload {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    Err(ServiceError::Validation(format!(
        "No file found in field '{}'",
        field_name
    )))
}

/// POST /api/user/avatar - Upload avatar
pub async fn upload_avatar(
    State(services): State<Arc<BlogServices>>,
    user: AuthUser,
    MultipartForm(mut multipart): MultipartForm,
) -> Result<impl IntoResponse, ServiceError> {
    let upload = read_file_field(&mut multipart, "avatar", services.media.max_bytes()).await?;

    let path = services
        .media
        .save(AVATAR_DIR, &user.id.to_string(), &upload)
        .await?;

    let (profile, previous) = match services.auth.set_avatar(user.id, &path).await {
        Ok(result) => result,
        Err(e) => {
            services.media.remove(&path).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = previous {
        services.media.remove(&previous).await;
    }

    tracing::info!(user_id = %user.id, avatar = %path, "Avatar uploaded");

    Ok(Json(
        ApiResponse::success(profile).with_message("Avatar uploaded successfully"),
    ))
}

/// POST /api/posts/:id/thumbnail - Upload a post thumbnail
pub async fn upload_thumbnail(
    State(services): State<Arc<BlogServices>>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    MultipartForm(mut multipart): MultipartForm,
) -> Result<impl IntoResponse, ServiceError> {
    // Ownership is checked before anything is written to disk
    services.posts.get_owned(id, user.id).await?;

    let upload = read_file_field(&mut multipart, "thumbnail", services.media.max_bytes()).await?;

    let path = services
        .media
        .save(&thumbnail_dir(user.id), &id.to_string(), &upload)
        .await?;

    let (post, previous) = match services.posts.set_thumbnail(id, user.id, &path).await {
        Ok(result) => result,
        Err(e) => {
            services.media.remove(&path).await;
            return Err(e);
        }
    };

    if let Some(previous) = previous {
        services.media.remove(&previous).await;
    }

    tracing::info!(post_id = %id, thumbnail = %path, "Thumbnail uploaded");

    Ok(Json(
        ApiResponse::success(post).with_message("Thumbnail uploaded successfully"),
    ))
}
