//! Blog Models

use blognest_auth::not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const TITLE_MAX: usize = 200;
pub const CATEGORY_MAX: usize = 50;

/// Blog post joined with its author's display name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn trimmed_length(value: &str, max: usize, field: &'static str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        let mut err = ValidationError::new("length");
        err.message = Some(Cow::Owned(format!(
            "{} must be between 1 and {} characters",
            field, max
        )));
        return Err(err);
    }
    Ok(())
}

pub fn valid_title(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, TITLE_MAX, "Title")
}

pub fn valid_category(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, CATEGORY_MAX, "Category")
}

/// Create post request
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct CreatePostRequest {
    #[serde(default)]
    #[validate(custom(function = "valid_title"))]
    pub title: String,

    #[serde(default)]
    #[validate(custom(function = "valid_category"))]
    pub category: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub content: String,
}

/// Partial post update
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
}

impl UpdatePostRequest {
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            valid_title(title)?;
        }
        if let Some(category) = &self.category {
            valid_category(category)?;
        }
        if let Some(content) = &self.content {
            not_blank(content)?;
        }
        Ok(())
    }
}

/// Highest page number accepted from a client
pub const MAX_PAGE: i64 = 1_000_000;

/// Post list query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PostQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn per_page(&self, default: i64) -> i64 {
        self.per_page.unwrap_or(default).clamp(1, 100)
    }

    pub fn offset(&self, default: i64) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page(default))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            total,
            page,
            per_page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One page of posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: PaginationMeta,
}

/// Error body, shaped like the success envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub status: String,
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}
