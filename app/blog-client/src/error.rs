//! Client Error Types

/// Errors returned by the client and the stores
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("{message} ({status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Response is missing '{0}'")]
    MissingField(&'static str),
}

impl ClientError {
    /// HTTP status for errors reported by the server
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
