//! In-memory status store.
//!
//! Applies exactly the same field updates as the Supabase client, so it can
//! stand in for the real table in dry runs and tests. Unlike the REST table,
//! writes to an unknown id create the record.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use vproc_models::ProcessingStatus;

use crate::store::{result_patch, status_patch, StatusStore};

type Row = serde_json::Map<String, serde_json::Value>;

/// Typed view of a stored video record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VideoRecord {
    #[serde(default)]
    pub processing_status: Option<ProcessingStatus>,
    #[serde(default)]
    pub analysis_result: Option<String>,
    #[serde(default)]
    pub is_processed: bool,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<String, Row>,
    history: Vec<(String, ProcessingStatus)>,
}

/// Status store held in process memory.
#[derive(Default)]
pub struct InMemoryStatusStore {
    inner: RwLock<Inner>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record with an initial status.
    pub async fn insert(&self, job_id: &str, status: ProcessingStatus) {
        let mut inner = self.inner.write().await;
        let row = inner.rows.entry(job_id.to_string()).or_default();
        row.extend(status_patch(status, None));
    }

    /// Snapshot of a record.
    pub async fn record(&self, job_id: &str) -> Option<VideoRecord> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(job_id)
            .and_then(|row| serde_json::from_value(serde_json::Value::Object(row.clone())).ok())
    }

    /// Every status written for `job_id`, in order. Seeded values are not included.
    pub async fn history(&self, job_id: &str) -> Vec<ProcessingStatus> {
        let inner = self.inner.read().await;
        inner
            .history
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, status)| *status)
            .collect()
    }

    /// Number of status and result writes across all records.
    pub async fn write_count(&self) -> usize {
        self.inner.read().await.history.len()
    }

    async fn apply(&self, job_id: &str, status: ProcessingStatus, patch: Row) {
        let mut inner = self.inner.write().await;
        inner.rows.entry(job_id.to_string()).or_default().extend(patch);
        inner.history.push((job_id.to_string(), status));
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn set_status(
        &self,
        job_id: &str,
        status: ProcessingStatus,
        error_message: Option<&str>,
    ) -> bool {
        debug!(job_id = %job_id, status = %status, "Status updated (memory)");
        self.apply(job_id, status, status_patch(status, error_message)).await;
        true
    }

    async fn save_result(&self, job_id: &str, analysis_text: &str, mark_processed: bool) -> bool {
        debug!(job_id = %job_id, chars = analysis_text.len(), "Analysis result saved (memory)");
        self.apply(
            job_id,
            ProcessingStatus::Completed,
            result_patch(analysis_text, mark_processed),
        )
        .await;
        true
    }

    async fn get_status(&self, job_id: &str) -> Option<ProcessingStatus> {
        self.record(job_id).await.and_then(|r| r.processing_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_status_records_error_text() {
        let store = InMemoryStatusStore::new();
        assert!(store.set_status("vid-1", ProcessingStatus::Failed, Some("Download failed")).await);

        let record = store.record("vid-1").await.unwrap();
        assert_eq!(record.processing_status, Some(ProcessingStatus::Failed));
        assert_eq!(record.analysis_result.as_deref(), Some("Error: Download failed"));
        assert!(!record.is_processed);
    }

    #[tokio::test]
    async fn test_save_result_is_idempotent() {
        let store = InMemoryStatusStore::new();
        store.insert("vid-1", ProcessingStatus::Queued).await;

        assert!(store.save_result("vid-1", "1. Open the terminal", true).await);
        let first = store.record("vid-1").await;
        assert!(store.save_result("vid-1", "1. Open the terminal", true).await);
        let second = store.record("vid-1").await;

        assert_eq!(first, second);
        assert_eq!(
            second,
            Some(VideoRecord {
                processing_status: Some(ProcessingStatus::Completed),
                analysis_result: Some("1. Open the terminal".to_string()),
                is_processed: true,
            })
        );
    }

    #[tokio::test]
    async fn test_set_status_is_idempotent() {
        let store = InMemoryStatusStore::new();
        store.insert("vid-1", ProcessingStatus::Processing).await;

        assert!(store.set_status("vid-1", ProcessingStatus::Failed, Some("Download failed")).await);
        let first = store.record("vid-1").await;
        assert!(store.set_status("vid-1", ProcessingStatus::Failed, Some("Download failed")).await);
        let second = store.record("vid-1").await;

        assert_eq!(first, second);
        assert_eq!(
            second,
            Some(VideoRecord {
                processing_status: Some(ProcessingStatus::Failed),
                analysis_result: Some("Error: Download failed".to_string()),
                is_processed: false,
            })
        );
        assert_eq!(store.get_status("vid-1").await, Some(ProcessingStatus::Failed));
    }

    #[tokio::test]
    async fn test_history_tracks_writes() {
        let store = InMemoryStatusStore::new();
        store.insert("vid-1", ProcessingStatus::Queued).await;
        store.set_status("vid-1", ProcessingStatus::Downloading, None).await;
        store.set_status("vid-2", ProcessingStatus::Failed, None).await;
        store.set_status("vid-1", ProcessingStatus::Processing, None).await;

        assert_eq!(
            store.history("vid-1").await,
            vec![ProcessingStatus::Downloading, ProcessingStatus::Processing]
        );
        assert_eq!(store.get_status("vid-2").await, Some(ProcessingStatus::Failed));
        assert_eq!(store.get_status("unknown").await, None);
        assert_eq!(store.write_count().await, 3);
    }
}
