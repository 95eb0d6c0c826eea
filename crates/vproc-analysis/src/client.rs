//! Orchestrator-facing analysis client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};
use vproc_models::{AnalysisResult, SourceKind};

use crate::error::{AnalysisError, ServiceResult};
use crate::prompt::VIDEO_ANALYSIS_PROMPT;
use crate::service::{AnalysisService, AssetRef, AssetState, MediaReference};

/// Analysis entry points used by the pipeline. Never fails: every error is
/// reported as an unsuccessful `AnalysisResult`.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Upload a local file, wait for it to become ready, analyze it and
    /// delete the uploaded copy.
    async fn analyze_local(&self, file_path: &Path, job_id: &str, mime_type: &str) -> AnalysisResult;

    /// Analyze media the service can fetch by URL.
    async fn analyze_remote(&self, url: &str, job_id: &str) -> AnalysisResult;
}

/// Readiness polling configuration.
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for AnalysisClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

impl AnalysisClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            poll_interval: std::env::var("GEMINI_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_wait: std::env::var("GEMINI_MAX_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
        }
    }
}

/// Drives an `AnalysisService` through upload, polling, generation and cleanup.
pub struct AnalysisClient<S> {
    service: S,
    config: AnalysisClientConfig,
}

impl<S: AnalysisService> AnalysisClient<S> {
    pub fn new(service: S, config: AnalysisClientConfig) -> Self {
        Self { service, config }
    }

    /// Poll until the asset is `Active`, `Failed`, or the wait budget runs out.
    async fn wait_until_active(&self, asset: &AssetRef, job_id: &str) -> ServiceResult<()> {
        let started = Instant::now();

        loop {
            match self.service.get_asset_state(asset).await {
                Ok(AssetState::Active) => {
                    info!(job_id = %job_id, waited_ms = started.elapsed().as_millis() as u64, "File ready for analysis");
                    return Ok(());
                }
                Ok(AssetState::Failed) => {
                    return Err(AnalysisError::ProcessingFailed(format!(
                        "{} was rejected by the analysis service",
                        asset.name
                    )));
                }
                Ok(state) => {
                    info!(job_id = %job_id, state = ?state, "Waiting for file processing");
                }
                Err(e) => {
                    warn!(job_id = %job_id, "File state query failed, still waiting: {}", e);
                }
            }

            if started.elapsed() + self.config.poll_interval > self.config.max_wait {
                return Err(AnalysisError::Timeout(self.config.max_wait.as_secs()));
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Wait for the uploaded asset and generate the analysis.
    async fn analyze_asset(&self, asset: &AssetRef, job_id: &str) -> ServiceResult<String> {
        self.wait_until_active(asset, job_id).await?;
        self.service
            .generate(&MediaReference::Asset(asset.clone()), VIDEO_ANALYSIS_PROMPT)
            .await
    }
}

#[async_trait]
impl<S: AnalysisService> VideoAnalyzer for AnalysisClient<S> {
    async fn analyze_local(&self, file_path: &Path, job_id: &str, mime_type: &str) -> AnalysisResult {
        let kind = SourceKind::ObjectStore;

        if !tokio::fs::try_exists(file_path).await.unwrap_or(false) {
            warn!(job_id = %job_id, file = %file_path.display(), "Video file not found");
            return AnalysisResult::failed(job_id, kind, "File not found");
        }

        let asset = match self.service.upload(file_path, mime_type, job_id).await {
            Ok(asset) => asset,
            Err(e) => {
                warn!(job_id = %job_id, "Upload failed: {}", e);
                return AnalysisResult::failed(job_id, kind, e.to_string());
            }
        };

        let outcome = self.analyze_asset(&asset, job_id).await;

        // The uploaded copy is removed whatever the outcome.
        if let Err(e) = self.service.delete_asset(&asset).await {
            warn!(job_id = %job_id, asset = %asset.name, "Could not delete uploaded file: {}", e);
        }

        match outcome {
            Ok(text) => {
                info!(job_id = %job_id, chars = text.len(), "Analysis complete");
                AnalysisResult::succeeded(job_id, kind, text)
            }
            Err(e) => {
                warn!(job_id = %job_id, "Analysis failed: {}", e);
                AnalysisResult::failed(job_id, kind, e.to_string())
            }
        }
    }

    async fn analyze_remote(&self, url: &str, job_id: &str) -> AnalysisResult {
        let kind = SourceKind::RemoteUrl;
        info!(job_id = %job_id, url = %url, "Sending remote video for analysis");

        match self
            .service
            .generate(&MediaReference::RemoteUrl(url.to_string()), VIDEO_ANALYSIS_PROMPT)
            .await
        {
            Ok(text) => {
                info!(job_id = %job_id, chars = text.len(), "Analysis complete");
                AnalysisResult::succeeded(job_id, kind, text)
            }
            Err(e) => {
                warn!(job_id = %job_id, "Analysis failed: {}", e);
                AnalysisResult::failed(job_id, kind, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockAnalysisService;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn asset() -> AssetRef {
        AssetRef {
            name: "files/abc".to_string(),
            uri: "https://example.test/files/abc".to_string(),
            mime_type: Some("video/mp4".to_string()),
        }
    }

    fn fast_config() -> AnalysisClientConfig {
        AnalysisClientConfig {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_millis(50),
        }
    }

    fn scratch_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"video").unwrap();
        (dir, file)
    }

    #[tokio::test]
    async fn test_analyze_local_success_deletes_asset() {
        let (_dir, file) = scratch_file();
        let mut service = MockAnalysisService::new();
        service
            .expect_upload()
            .withf(|_, mime, name| mime == "video/mp4" && name == "vid-1")
            .times(1)
            .returning(|_, _, _| Ok(asset()));

        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        service.expect_get_asset_state().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(AssetState::Processing)
            } else {
                Ok(AssetState::Active)
            }
        });
        service
            .expect_generate()
            .withf(|media, prompt| *media == MediaReference::Asset(asset()) && prompt == VIDEO_ANALYSIS_PROMPT)
            .times(1)
            .returning(|_, _| Ok("1. Open the settings".to_string()));
        service.expect_delete_asset().with(eq(asset())).times(1).returning(|_| Ok(()));

        let client = AnalysisClient::new(service, fast_config());
        let result = client.analyze_local(&file, "vid-1", "video/mp4").await;

        assert!(result.success);
        assert_eq!(result.analysis.as_deref(), Some("1. Open the settings"));
        assert_eq!(result.source_kind, SourceKind::ObjectStore);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_analyze_local_times_out_and_still_deletes() {
        let (_dir, file) = scratch_file();
        let mut service = MockAnalysisService::new();
        service.expect_upload().returning(|_, _, _| Ok(asset()));
        service
            .expect_get_asset_state()
            .returning(|_| Ok(AssetState::Processing));
        service.expect_generate().never();
        service.expect_delete_asset().times(1).returning(|_| Ok(()));

        let client = AnalysisClient::new(service, fast_config());
        let result = client.analyze_local(&file, "vid-1", "video/mp4").await;

        assert!(!result.success);
        assert!(result.error_message().contains("timeout"), "{}", result.error_message());
    }

    #[tokio::test]
    async fn test_failed_asset_ends_polling_immediately() {
        let (_dir, file) = scratch_file();
        let mut service = MockAnalysisService::new();
        service.expect_upload().returning(|_, _, _| Ok(asset()));
        service
            .expect_get_asset_state()
            .times(1)
            .returning(|_| Ok(AssetState::Failed));
        service.expect_generate().never();
        service.expect_delete_asset().times(1).returning(|_| Ok(()));

        let client = AnalysisClient::new(service, fast_config());
        let result = client.analyze_local(&file, "vid-1", "video/mp4").await;

        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_state_query_errors_keep_polling() {
        let (_dir, file) = scratch_file();
        let mut service = MockAnalysisService::new();
        service.expect_upload().returning(|_, _, _| Ok(asset()));

        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        service.expect_get_asset_state().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AnalysisError::api(500, "backend error"))
            } else {
                Ok(AssetState::Active)
            }
        });
        service.expect_generate().returning(|_, _| Ok("steps".to_string()));
        service.expect_delete_asset().returning(|_| Ok(()));

        let client = AnalysisClient::new(service, fast_config());
        assert!(client.analyze_local(&file, "vid-1", "video/mp4").await.success);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_change_outcome() {
        let (_dir, file) = scratch_file();
        let mut service = MockAnalysisService::new();
        service.expect_upload().returning(|_, _, _| Ok(asset()));
        service.expect_get_asset_state().returning(|_| Ok(AssetState::Active));
        service.expect_generate().returning(|_, _| Ok("steps".to_string()));
        service
            .expect_delete_asset()
            .times(1)
            .returning(|_| Err(AnalysisError::api(404, "gone")));

        let client = AnalysisClient::new(service, fast_config());
        assert!(client.analyze_local(&file, "vid-1", "video/mp4").await.success);
    }

    #[tokio::test]
    async fn test_missing_file_skips_upload() {
        let mut service = MockAnalysisService::new();
        service.expect_upload().never();

        let client = AnalysisClient::new(service, fast_config());
        let result = client
            .analyze_local(Path::new("/nonexistent/clip.mp4"), "vid-1", "video/mp4")
            .await;

        assert!(!result.success);
        assert_eq!(result.error_message(), "File not found");
    }

    #[tokio::test]
    async fn test_analyze_remote_has_no_asset_lifecycle() {
        let mut service = MockAnalysisService::new();
        service.expect_upload().never();
        service.expect_delete_asset().never();
        service
            .expect_generate()
            .withf(|media, _| *media == MediaReference::RemoteUrl("https://youtu.be/abc".to_string()))
            .times(1)
            .returning(|_, _| Err(AnalysisError::api(400, "unsupported url")));

        let client = AnalysisClient::new(service, fast_config());
        let result = client.analyze_remote("https://youtu.be/abc", "vid-2").await;

        assert!(!result.success);
        assert_eq!(result.source_kind, SourceKind::RemoteUrl);
        assert!(result.error_message().contains("unsupported url"));
    }
}
