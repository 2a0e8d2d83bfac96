//! BlogNest Client
//!
//! Typed access to the BlogNest API plus two state stores that mirror what
//! the server holds for the signed-in user and the posts on screen.
//!
//! ```rust,ignore
//! use blognest_client::{ApiClient, PostStore, UserStore};
//! use std::sync::Arc;
//!
//! let client = Arc::new(ApiClient::new("http://localhost:5000")?);
//! let users = UserStore::new(client.clone());
//! let posts = PostStore::new(client);
//!
//! users.login("ada@example.com", "secret1").await?;
//! posts.fetch_posts(1, 10).await?;
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod posts;
pub mod user;

pub use client::{ApiClient, FileUpload, Tokens};
pub use error::ClientError;
pub use models::*;
pub use posts::PostStore;
pub use user::UserStore;
