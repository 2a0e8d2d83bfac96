//! Post Store
//!
//! Cached posts plus the one currently opened, updated after every call.

use crate::client::{ApiClient, FileUpload};
use crate::error::ClientError;
use crate::models::{NewPost, Pagination, Post, PostPage, PostUpdate};

use reqwest::Method;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct PostState {
    posts: Vec<Post>,
    current: Option<Post>,
    pagination: Option<Pagination>,
    loading: bool,
    error: Option<String>,
}

impl PostState {
    /// Replace the cached copy of `post` wherever it appears
    fn merge(&mut self, post: &Post) {
        if let Some(existing) = self.posts.iter_mut().find(|p| p.id == post.id) {
            *existing = post.clone();
        }
        if self.current.as_ref().is_some_and(|c| c.id == post.id) {
            self.current = Some(post.clone());
        }
    }
}

pub struct PostStore {
    client: Arc<ApiClient>,
    state: RwLock<PostState>,
}

impl PostStore {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            state: RwLock::new(PostState::default()),
        }
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.state.read().await.posts.clone()
    }

    pub async fn current(&self) -> Option<Post> {
        self.state.read().await.current.clone()
    }

    /// Pagination of the last full listing
    pub async fn pagination(&self) -> Option<Pagination> {
        self.state.read().await.pagination.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.loading = true;
        state.error = None;
    }

    async fn finish<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        let mut state = self.state.write().await;
        state.loading = false;
        if let Err(e) = &result {
            state.error = Some(e.to_string());
        }
        result
    }

    async fn replace(&self, posts: Vec<Post>, pagination: Option<Pagination>) {
        let mut state = self.state.write().await;
        state.posts = posts;
        state.pagination = pagination;
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        self.begin().await;
        let result = async {
            let post = self
                .client
                .send_json::<Post, _>(Method::POST, &["api", "posts"], post, true)
                .await?
                .into_data()?;
            self.state.write().await.posts.push(post.clone());
            Ok::<_, ClientError>(post)
        }
        .await;
        self.finish(result).await
    }

    pub async fn fetch_posts(&self, page: i64, per_page: i64) -> Result<PostPage, ClientError> {
        self.begin().await;
        let result = async {
            let builder = self
                .client
                .request(Method::GET, &["api", "posts"], false)
                .await?
                .query(&[("page", page), ("per_page", per_page)]);
            let page = self.client.send::<PostPage>(builder).await?.into_data()?;
            self.replace(page.posts.clone(), Some(page.pagination.clone()))
                .await;
            Ok::<_, ClientError>(page)
        }
        .await;
        self.finish(result).await
    }

    pub async fn fetch_post(&self, id: Uuid) -> Result<Post, ClientError> {
        self.begin().await;
        let path_id = id.to_string();
        let result = async {
            let post = self
                .client
                .get::<Post>(&["api", "posts", path_id.as_str()], false)
                .await?
                .into_data()?;
            self.state.write().await.current = Some(post.clone());
            Ok::<_, ClientError>(post)
        }
        .await;
        self.finish(result).await
    }

    pub async fn update_post(&self, id: Uuid, update: &PostUpdate) -> Result<Post, ClientError> {
        self.begin().await;
        let path_id = id.to_string();
        let result = async {
            let post = self
                .client
                .send_json::<Post, _>(
                    Method::PATCH,
                    &["api", "posts", path_id.as_str()],
                    update,
                    true,
                )
                .await?
                .into_data()?;
            self.state.write().await.merge(&post);
            Ok::<_, ClientError>(post)
        }
        .await;
        self.finish(result).await
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<(), ClientError> {
        self.begin().await;
        let path_id = id.to_string();
        let result = async {
            let builder = self
                .client
                .request(Method::DELETE, &["api", "posts", path_id.as_str()], true)
                .await?;
            self.client.send::<serde_json::Value>(builder).await?;

            let mut state = self.state.write().await;
            state.posts.retain(|p| p.id != id);
            if state.current.as_ref().is_some_and(|c| c.id == id) {
                state.current = None;
            }
            Ok::<_, ClientError>(())
        }
        .await;
        self.finish(result).await
    }

    pub async fn fetch_by_category(&self, category: &str) -> Result<Vec<Post>, ClientError> {
        self.begin().await;
        let result = async {
            let posts = self
                .client
                .get::<Vec<Post>>(&["api", "posts", "category", category], false)
                .await?
                .into_data()?;
            self.replace(posts.clone(), None).await;
            Ok::<_, ClientError>(posts)
        }
        .await;
        self.finish(result).await
    }

    pub async fn upload_thumbnail(&self, id: Uuid, file: FileUpload) -> Result<Post, ClientError> {
        self.begin().await;
        let path_id = id.to_string();
        let result = async {
            let post = self
                .client
                .upload::<Post>(&["api", "posts", path_id.as_str(), "thumbnail"], "thumbnail", file)
                .await?
                .into_data()?;
            self.state.write().await.merge(&post);
            Ok::<_, ClientError>(post)
        }
        .await;
        self.finish(result).await
    }

    pub async fn fetch_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, ClientError> {
        self.begin().await;
        let path_id = user_id.to_string();
        let result = async {
            let posts = self
                .client
                .get::<Vec<Post>>(&["api", "posts", "user", path_id.as_str()], false)
                .await?
                .into_data()?;
            self.replace(posts.clone(), None).await;
            Ok::<_, ClientError>(posts)
        }
        .await;
        self.finish(result).await
    }
}
