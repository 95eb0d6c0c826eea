//! Status store error types.

use thiserror::Error;

/// Result type for status store operations.
pub type StatusResult<T> = Result<T, StatusError>;

/// Errors that can occur while talking to the record store.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatusError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatusError::Network(_) | StatusError::RateLimited(_) | StatusError::ServerError(_, _)
        )
    }

    /// Delay requested by the server, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StatusError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// HTTP status this error corresponds to, for metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StatusError::NotFound(_) => Some(404),
            StatusError::Unauthorized(_) => Some(401),
            StatusError::RateLimited(_) => Some(429),
            StatusError::ServerError(code, _) => Some(*code),
            StatusError::RequestFailed(_) => Some(400),
            _ => None,
        }
    }
}
