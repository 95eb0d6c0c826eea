//! Worker error types.

use thiserror::Error;
use vproc_models::JobValidationError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    InvalidJob(#[from] JobValidationError),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Downloaded file not found: {0}")]
    DownloadMissing(String),

    #[error("Downloaded file is empty: {0}")]
    DownloadEmpty(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vproc_storage::StorageError),

    #[error("Status store error: {0}")]
    Status(#[from] vproc_status::StatusError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] vproc_analysis::AnalysisError),

    #[error("Queue error: {0}")]
    Queue(#[from] vproc_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}
