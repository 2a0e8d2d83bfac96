//! Blog Services

use crate::models::*;
use async_trait::async_trait;
use blognest_auth::{AccountListener, AuthError, User};
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("You don't have permission to perform this action")]
    PermissionDenied,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<validator::ValidationError> for ServiceError {
    fn from(err: validator::ValidationError) -> Self {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string());
        ServiceError::Validation(message)
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.author_id, u.name AS author_name, p.title, p.category,
           p.content, p.thumbnail, p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Post service
pub struct PostService {
    db: SqlitePool,
    posts_per_page: i64,
}

impl PostService {
    pub fn new(db: SqlitePool, posts_per_page: i64) -> Self {
        Self { db, posts_per_page }
    }

    /// List posts, newest first, one page at a time
    pub async fn list(&self, query: &PostQuery) -> Result<PostPage, ServiceError> {
        let per_page = query.per_page(self.posts_per_page);

        let posts: Vec<Post> = sqlx::query_as(&format!(
            "{} ORDER BY p.created_at DESC, p.rowid DESC LIMIT $1 OFFSET $2",
            POST_SELECT
        ))
        .bind(per_page)
        .bind(query.offset(self.posts_per_page))
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.db)
            .await?;

        Ok(PostPage {
            posts,
            pagination: PaginationMeta::new(total, query.page(), per_page),
        })
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Post, ServiceError> {
        sqlx::query_as(&format!("{} WHERE p.id = $1", POST_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Post not found".into()))
    }

    /// Posts whose category matches, ignoring case
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Post>, ServiceError> {
        let posts = sqlx::query_as(&format!(
            "{} WHERE p.category = $1 COLLATE NOCASE ORDER BY p.created_at DESC, p.rowid DESC",
            POST_SELECT
        ))
        .bind(category.trim())
        .fetch_all(&self.db)
        .await?;
        Ok(posts)
    }

    pub async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, ServiceError> {
        let posts = sqlx::query_as(&format!(
            "{} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.rowid DESC",
            POST_SELECT
        ))
        .bind(author_id)
        .fetch_all(&self.db)
        .await?;
        Ok(posts)
    }

    pub async fn create(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, ServiceError> {
        req.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO posts (id, author_id, title, category, content, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)"#,
        )
        .bind(id)
        .bind(author_id)
        .bind(req.title.trim())
        .bind(req.category.trim())
        .bind(req.content.trim())
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!(post_id = %id, author_id = %author_id, "Post created");

        self.get_by_id(id).await
    }

    /// Fetch a post and make sure `user_id` wrote it
    pub async fn get_owned(&self, id: Uuid, user_id: Uuid) -> Result<Post, ServiceError> {
        let post = self.get_by_id(id).await?;

        if post.author_id != user_id {
            tracing::warn!(post_id = %id, user_id = %user_id, "Rejected change to another user's post");
            return Err(ServiceError::PermissionDenied);
        }

        Ok(post)
    }

    pub async fn update(&self, id: Uuid, user_id: Uuid, req: UpdatePostRequest) -> Result<Post, ServiceError> {
        let existing = self.get_owned(id, user_id).await?;
        req.validate_fields()?;

        let title = req.title.as_deref().map(str::trim).unwrap_or(&existing.title);
        let category = req
            .category
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.category);
        let content = req
            .content
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.content);

        sqlx::query(
            r#"UPDATE posts SET title = $2, category = $3, content = $4, updated_at = $5
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(title)
        .bind(category)
        .bind(content)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        self.get_by_id(id).await
    }

    /// Delete a post, returning it so its files can be cleaned up
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<Post, ServiceError> {
        let post = self.get_owned(id, user_id).await?;

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(post_id = %id, "Post deleted");
        Ok(post)
    }

    /// Point the thumbnail at `path`, returning the post and the replaced path
    pub async fn set_thumbnail(
        &self,
        id: Uuid,
        user_id: Uuid,
        path: &str,
    ) -> Result<(Post, Option<String>), ServiceError> {
        let previous = self.get_owned(id, user_id).await?.thumbnail;

        sqlx::query("UPDATE posts SET thumbnail = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(path)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok((self.get_by_id(id).await?, previous))
    }
}

/// Image types accepted for avatars and thumbnails, with the stored extension
pub const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Public URL prefix of stored files
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// An uploaded file read from a multipart body
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    /// Declared content type, falling back to a guess from the file name
    pub fn mime_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            self.file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first_raw())
                .map(String::from)
        })
    }
}

/// Local disk storage for uploaded images
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check type and size, returning the extension to store under
    pub fn check(&self, upload: &Upload) -> Result<&'static str, ServiceError> {
        let mime = upload.mime_type().unwrap_or_default();

        let ext = ALLOWED_IMAGE_TYPES
            .iter()
            .find(|(allowed, _)| *allowed == mime)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| {
                ServiceError::Validation(
                    "Invalid image type. Only JPEG, PNG, GIF, and WebP are supported".into(),
                )
            })?;

        if upload.data.is_empty() {
            return Err(ServiceError::Validation("Uploaded file is empty".into()));
        }

        if upload.data.len() > self.max_bytes {
            return Err(ServiceError::Validation(format!(
                "File too large. Max size: {} bytes",
                self.max_bytes
            )));
        }

        Ok(ext)
    }

    /// Write `upload` as `<dir>/<stem>-<random>.<ext>` and return its public path
    pub async fn save(&self, dir: &str, stem: &str, upload: &Upload) -> Result<String, ServiceError> {
        let ext = self.check(upload)?;
        let relative = format!("{}/{}-{}.{}", dir, stem, Uuid::new_v4().simple(), ext);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::Storage(e.to_string()))?;
        }

        tokio::fs::write(&target, &upload.data)
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        tracing::debug!(path = %target.display(), bytes = upload.data.len(), "Stored upload");

        Ok(format!("{}{}", UPLOADS_PREFIX, relative))
    }

    /// Map a public path back into the uploads directory
    fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let relative = Path::new(public_path.strip_prefix(UPLOADS_PREFIX)?);

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.root.join(relative))
    }

    /// Best-effort removal of a stored file
    pub async fn remove(&self, public_path: &str) {
        let Some(path) = self.resolve(public_path) else {
            tracing::warn!(path = %public_path, "Refusing to remove path outside uploads");
            return;
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
            }
        }
    }

    /// Best-effort removal of a whole upload directory
    pub async fn remove_dir(&self, dir: &str) {
        let path = self.root.join(dir);
        if let Err(e) = tokio::fs::remove_dir_all(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload directory");
            }
        }
    }
}

/// Directory holding the thumbnails of one author
pub fn thumbnail_dir(author_id: Uuid) -> String {
    format!("thumbnails/{}", author_id)
}

pub const AVATAR_DIR: &str = "avatars";

/// Removes a deleted account's files; rows are removed by cascade
pub struct UploadCleanup {
    media: Arc<MediaStore>,
}

impl UploadCleanup {
    pub fn new(media: Arc<MediaStore>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl AccountListener for UploadCleanup {
    async fn account_deleted(&self, user: &User) {
        if let Some(avatar) = &user.avatar {
            self.media.remove(avatar).await;
        }
        self.media.remove_dir(&thumbnail_dir(user.id)).await;
    }
}
