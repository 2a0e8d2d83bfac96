//! User Store
//!
//! Holds the signed-in user and keeps it in step with the server.

use crate::client::{ApiClient, FileUpload, Tokens};
use crate::error::ClientError;
use crate::models::{Envelope, ProfileUpdate, User};

use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct UserState {
    user: Option<User>,
    loading: bool,
    error: Option<String>,
}

/// Session and profile state of the current user
pub struct UserStore {
    client: Arc<ApiClient>,
    state: RwLock<UserState>,
}

impl UserStore {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            state: RwLock::new(UserState::default()),
        }
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
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

    async fn set_user(&self, user: Option<User>) {
        self.state.write().await.user = user;
    }

    /// Sign in from an envelope carrying tokens and a profile
    async fn start_session(&self, envelope: Envelope<User>) -> Result<User, ClientError> {
        self.client.store_tokens(&envelope).await?;
        let user = envelope.into_data()?;
        self.set_user(Some(user.clone())).await;
        Ok(user)
    }

    async fn clear_session(&self) {
        self.client.set_tokens(None).await;
        self.set_user(None).await;
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, ClientError> {
        self.begin().await;
        let result = async {
            let envelope = self
                .client
                .send_json(
                    Method::POST,
                    &["api", "user", "register"],
                    &json!({"name": name, "email": email, "password": password}),
                    false,
                )
                .await?;
            self.start_session(envelope).await
        }
        .await;
        self.finish(result).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        self.begin().await;
        let result = async {
            let envelope = self
                .client
                .send_json(
                    Method::POST,
                    &["api", "user", "login"],
                    &json!({"email": email, "password": password}),
                    false,
                )
                .await?;
            self.start_session(envelope).await
        }
        .await;
        self.finish(result).await
    }

    /// End the session; local state is cleared even when the server call fails
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.begin().await;
        let result = async {
            let tokens = self.client.tokens().await.ok_or(ClientError::NotAuthenticated)?;
            self.client
                .send_json::<serde_json::Value, _>(
                    Method::POST,
                    &["api", "user", "logout"],
                    &json!({"refreshToken": tokens.refresh_token}),
                    true,
                )
                .await?;
            Ok::<_, ClientError>(())
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Logout failed on the server; clearing local session anyway");
        }
        self.clear_session().await;
        self.finish(result).await
    }

    /// Rotate the session tokens
    pub async fn refresh(&self) -> Result<Tokens, ClientError> {
        self.begin().await;
        let result = async {
            let tokens = self.client.tokens().await.ok_or(ClientError::NotAuthenticated)?;
            let envelope = self
                .client
                .send_json::<serde_json::Value, _>(
                    Method::POST,
                    &["api", "user", "refresh"],
                    &json!({"refreshToken": tokens.refresh_token}),
                    false,
                )
                .await?;
            self.client.store_tokens(&envelope).await?;
            self.client.tokens().await.ok_or(ClientError::NotAuthenticated)
        }
        .await;
        self.finish(result).await
    }

    pub async fn load_profile(&self) -> Result<User, ClientError> {
        self.begin().await;
        let result = async {
            let user = self
                .client
                .get::<User>(&["api", "user", "profile"], true)
                .await?
                .into_data()?;
            self.set_user(Some(user.clone())).await;
            Ok::<_, ClientError>(user)
        }
        .await;
        self.finish(result).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        self.begin().await;
        let result = async {
            let user = self
                .client
                .send_json::<User, _>(Method::PATCH, &["api", "user", "update"], update, true)
                .await?
                .into_data()?;
            self.set_user(Some(user.clone())).await;
            Ok::<_, ClientError>(user)
        }
        .await;
        self.finish(result).await
    }

    /// Delete the account and forget the session
    pub async fn delete_profile(&self) -> Result<(), ClientError> {
        self.begin().await;
        let result = async {
            let builder = self
                .client
                .request(Method::DELETE, &["api", "user", "delete"], true)
                .await?;
            self.client.send::<serde_json::Value>(builder).await?;
            self.clear_session().await;
            Ok::<_, ClientError>(())
        }
        .await;
        self.finish(result).await
    }

    pub async fn upload_avatar(&self, file: FileUpload) -> Result<User, ClientError> {
        self.begin().await;
        let result = async {
            let user = self
                .client
                .upload::<User>(&["api", "user", "avatar"], "avatar", file)
                .await?
                .into_data()?;
            self.set_user(Some(user.clone())).await;
            Ok::<_, ClientError>(user)
        }
        .await;
        self.finish(result).await
    }
}
