//! HTTP Client
//!
//! Thin wrapper over `reqwest` that knows the envelope, the error body and
//! where the session tokens live.

use crate::error::ClientError;
use crate::models::{Envelope, ErrorBody};

use reqwest::{multipart, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

/// Tokens of the current session
#[derive(Debug, Clone, PartialEq)]
pub struct Tokens {
    /// Sent verbatim as the `Authorization` header (already `Bearer `-prefixed)
    pub access_token: String,
    pub refresh_token: String,
}

/// An image to upload
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// BlogNest API client
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: RwLock<Option<Tokens>>,
}

impl ApiClient {
    /// Client for the API rooted at `base_url` (e.g. `http://localhost:5000`)
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            http,
            base_url,
            tokens: RwLock::new(None),
        })
    }

    pub async fn tokens(&self) -> Option<Tokens> {
        self.tokens.read().await.clone()
    }

    pub async fn set_tokens(&self, tokens: Option<Tokens>) {
        *self.tokens.write().await = tokens;
    }

    /// Remember tokens carried by an envelope, if both are present
    pub async fn store_tokens<T>(&self, envelope: &Envelope<T>) -> Result<(), ClientError> {
        let access_token = envelope
            .access_token
            .clone()
            .ok_or(ClientError::MissingField("accessToken"))?;
        let refresh_token = envelope
            .refresh_token
            .clone()
            .ok_or(ClientError::MissingField("refreshToken"))?;

        self.set_tokens(Some(Tokens {
            access_token,
            refresh_token,
        }))
        .await;
        Ok(())
    }

    /// Absolute URL for the given path segments, each percent-encoded
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Request builder carrying the access token when `authenticated`
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        authenticated: bool,
    ) -> Result<RequestBuilder, ClientError> {
        let builder = self.http.request(method, self.url(segments));

        if !authenticated {
            return Ok(builder);
        }

        let tokens = self.tokens().await.ok_or(ClientError::NotAuthenticated)?;
        Ok(builder.header(reqwest::header::AUTHORIZATION, tokens.access_token))
    }

    /// Send a request and decode the envelope
    pub async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Envelope<T>, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), code = ?body.error, "API request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                code: body.error,
                message: body
                    .message
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string()),
            });
        }

        Ok(response.json().await?)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        authenticated: bool,
    ) -> Result<Envelope<T>, ClientError> {
        let builder = self.request(Method::GET, segments, authenticated).await?;
        self.send(builder).await
    }

    pub async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        authenticated: bool,
    ) -> Result<Envelope<T>, ClientError> {
        let builder = self.request(method, segments, authenticated).await?;
        self.send(builder.json(body)).await
    }

    /// Upload a file as multipart field `field`
    pub async fn upload<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        field: &str,
        file: FileUpload,
    ) -> Result<Envelope<T>, ClientError> {
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)?;
        let form = multipart::Form::new().part(field.to_string(), part);

        let builder = self.request(Method::POST, segments, true).await?;
        self.send(builder.multipart(form)).await
    }
}
