//! Status store contract.

use async_trait::async_trait;
use vproc_models::ProcessingStatus;

/// Per-video lifecycle record keeping.
///
/// Every method is idempotent by `job_id` and reports backend failures as
/// `false` / `None` instead of an error, so a bookkeeping failure never
/// takes the worker down.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Set the processing status. For `Failed`, a present `error_message` is
    /// stored as the record's result text prefixed with `Error: `.
    async fn set_status(
        &self,
        job_id: &str,
        status: ProcessingStatus,
        error_message: Option<&str>,
    ) -> bool;

    /// Store the analysis text and mark the record `completed`.
    async fn save_result(&self, job_id: &str, analysis_text: &str, mark_processed: bool) -> bool;

    /// Current status of a record, `None` if unknown or unreadable.
    async fn get_status(&self, job_id: &str) -> Option<ProcessingStatus>;
}

/// Column written by status updates.
pub(crate) const STATUS_COLUMN: &str = "processing_status";
/// Column holding the analysis text (or the failure reason).
pub(crate) const RESULT_COLUMN: &str = "analysis_result";
/// Column flagged once a result has been stored.
pub(crate) const PROCESSED_COLUMN: &str = "is_processed";

/// Fields written by `set_status`.
pub(crate) fn status_patch(
    status: ProcessingStatus,
    error_message: Option<&str>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut patch = serde_json::Map::new();
    patch.insert(STATUS_COLUMN.into(), status.as_str().into());
    if status == ProcessingStatus::Failed {
        if let Some(msg) = error_message {
            patch.insert(RESULT_COLUMN.into(), format!("Error: {}", msg).into());
        }
    }
    patch
}

/// Fields written by `save_result`.
pub(crate) fn result_patch(
    analysis_text: &str,
    mark_processed: bool,
) -> serde_json::Map<String, serde_json::Value> {
    let mut patch = serde_json::Map::new();
    patch.insert(RESULT_COLUMN.into(), analysis_text.into());
    patch.insert(STATUS_COLUMN.into(), ProcessingStatus::Completed.as_str().into());
    if mark_processed {
        patch.insert(PROCESSED_COLUMN.into(), true.into());
    }
    patch
}
