//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request did not complete before the deadline
    #[error("http {method} timed out - {url}")]
    Timeout { method: String, url: String },

    /// The remote answered 401 (protected account, revoked token, ...)
    #[error("Not authorized")]
    NotAuthorized,

    /// The remote returned a non-success status
    #[error("Server error code: {status}; msg: {message}")]
    Api { status: u16, message: String },

    /// The first follower page came back empty
    #[error("No followers returned for {subject}")]
    EmptyFollowerList { subject: String },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, ClientError::NotAuthorized)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// The target account is gone or hidden; retrying will not help
    pub fn is_permanent(&self) -> bool {
        matches!(self, ClientError::Api { status: 403 | 404, .. })
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
