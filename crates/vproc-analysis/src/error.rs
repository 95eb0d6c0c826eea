//! Analysis error types.

use thiserror::Error;

/// Result type for analysis service calls.
pub type ServiceResult<T> = Result<T, AnalysisError>;

/// Errors that can occur while talking to the analysis service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Analysis API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Asset processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Processing timeout after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        assert_eq!(AnalysisError::Timeout(300).to_string(), "Processing timeout after 300s");
    }

    #[test]
    fn test_api_message() {
        let err = AnalysisError::api(429, "quota exhausted");
        assert_eq!(err.to_string(), "Analysis API returned 429: quota exhausted");
    }
}
