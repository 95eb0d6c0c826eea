//! Per-job pipeline.
//!
//! Takes one job descriptor from validation through download, analysis and
//! result persistence. Status writes are fire-and-forget; the returned bool
//! is the only outcome the consumer loop sees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{warn, Instrument};
use vproc_analysis::VideoAnalyzer;
use vproc_models::{AnalysisResult, JobId, ObjectStoreSource, ProcessingStatus, SourceKind, VideoJob};
use vproc_status::StatusStore;
use vproc_storage::ObjectStore;

use crate::cleanup::Cleanup;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Something the consumer loop can hand a job to.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process one job. `true` means it reached `completed` (or already had).
    async fn handle(&self, job: &VideoJob) -> bool;
}

/// Video processing pipeline.
pub struct VideoProcessor {
    storage: Arc<dyn ObjectStore>,
    analyzer: Arc<dyn VideoAnalyzer>,
    status: Arc<dyn StatusStore>,
    default_bucket: String,
    work_dir: PathBuf,
    skip_completed_jobs: bool,
}

impl VideoProcessor {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        analyzer: Arc<dyn VideoAnalyzer>,
        status: Arc<dyn StatusStore>,
        default_bucket: impl Into<String>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            storage,
            analyzer,
            status,
            default_bucket: default_bucket.into(),
            work_dir: config.work_dir.clone(),
            skip_completed_jobs: config.skip_completed_jobs,
        }
    }

    /// Run the pipeline for one job. Never returns an error.
    pub async fn process(&self, job: &VideoJob) -> bool {
        let job_id = match job.job_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping message: {}", e);
                return false;
            }
        };

        let logger = JobLogger::new(job_id, "video_processing");
        let span = logger.create_span();

        self.process_job(job, job_id, logger).instrument(span).await
    }

    async fn process_job(&self, job: &VideoJob, job_id: &JobId, logger: JobLogger) -> bool {
        let id = job_id.as_str();

        // A redelivered message for a completed record is acknowledged without
        // running the pipeline again. Failed records are retried.
        if self.skip_completed_jobs && self.status.get_status(id).await == Some(ProcessingStatus::Completed) {
            logger.log_completion("already completed, skipping redelivered job");
            return true;
        }

        let kind = match job.source_kind() {
            Ok(kind) => kind,
            Err(e) => {
                logger.log_error(&e.to_string());
                self.write_status(&logger, ProcessingStatus::Failed, Some(&e.to_string())).await;
                return false;
            }
        };
        let logger = logger.with_source(kind);
        logger.log_start(job.file_name.as_deref().or(job.source_url.as_deref()).unwrap_or(id));

        self.write_status(&logger, ProcessingStatus::Processing, None).await;

        let outcome = match kind {
            SourceKind::ObjectStore => self.process_object_store(job, job_id, &logger).await,
            SourceKind::RemoteUrl => self.process_remote_url(job, job_id, &logger).await,
        };

        match outcome {
            Ok(result) => self.persist(&logger, &result).await,
            Err(e) => {
                logger.log_error(&e.to_string());
                self.write_status(&logger, ProcessingStatus::Failed, Some(&e.to_string())).await;
                false
            }
        }
    }

    /// Download, verify, analyze, and always clean up the scratch file.
    async fn process_object_store(
        &self,
        job: &VideoJob,
        job_id: &JobId,
        logger: &JobLogger,
    ) -> WorkerResult<AnalysisResult> {
        let source = job.object_store_source(&self.default_bucket)?;

        let job_dir = self.work_dir.join(scratch_dir_name(job_id));
        let cleanup = Cleanup::new(job_dir.join(&source.file_name), &job_dir);

        let outcome = self.download_and_analyze(&source, job_id, cleanup.file(), logger).await;

        cleanup.run().await.log(logger, "Scratch cleanup");
        outcome
    }

    async fn download_and_analyze(
        &self,
        source: &ObjectStoreSource,
        job_id: &JobId,
        local_path: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<AnalysisResult> {
        self.write_status(logger, ProcessingStatus::Downloading, None).await;
        logger.log_progress(&format!(
            "downloading s3://{}/{} to {}",
            source.bucket,
            source.object_key,
            local_path.display()
        ));

        let bytes = self
            .storage
            .download(&source.bucket, &source.object_key, local_path)
            .await
            .map_err(|e| WorkerError::download_failed(e.to_string()))?;

        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|_| WorkerError::DownloadMissing(local_path.display().to_string()))?;
        if metadata.len() == 0 {
            return Err(WorkerError::DownloadEmpty(local_path.display().to_string()));
        }
        if let Some(expected) = source.expected_size {
            if expected != metadata.len() {
                logger.log_warning(&format!(
                    "downloaded {} bytes, upload reported {}",
                    metadata.len(),
                    expected
                ));
            }
        }
        logger.log_progress(&format!("downloaded {} bytes", bytes));

        self.write_status(logger, ProcessingStatus::Uploading, None).await;

        Ok(self
            .analyzer
            .analyze_local(local_path, job_id.as_str(), &source.mime_type)
            .await)
    }

    async fn process_remote_url(
        &self,
        job: &VideoJob,
        job_id: &JobId,
        logger: &JobLogger,
    ) -> WorkerResult<AnalysisResult> {
        let source = job.remote_url_source()?;

        if let Some(title) = &source.title {
            logger.log_progress(&format!("remote video \"{}\"", title));
        }

        self.write_status(logger, ProcessingStatus::Processing, None).await;

        Ok(self.analyzer.analyze_remote(&source.url, job_id.as_str()).await)
    }

    /// Store the outcome of the analysis. Returns whether the job succeeded.
    async fn persist(&self, logger: &JobLogger, result: &AnalysisResult) -> bool {
        match (&result.analysis, result.success) {
            (Some(text), true) => {
                if !self.status.save_result(logger.job_id(), text, true).await {
                    logger.log_warning("failed to save analysis result");
                }
                logger.log_completion(&format!("analysis stored ({} chars)", text.len()));
                true
            }
            _ => {
                let error = result.error_message();
                logger.log_error(&format!("analysis failed: {}", error));
                self.write_status(logger, ProcessingStatus::Failed, Some(error)).await;
                false
            }
        }
    }

    async fn write_status(&self, logger: &JobLogger, status: ProcessingStatus, error: Option<&str>) {
        if !self.status.set_status(logger.job_id(), status, error).await {
            logger.log_warning(&format!("failed to record status {}", status));
        }
    }
}

#[async_trait]
impl JobHandler for VideoProcessor {
    async fn handle(&self, job: &VideoJob) -> bool {
        self.process(job).await
    }
}

/// Directory name for a job's scratch files. Anything outside
/// `[A-Za-z0-9_-]` is replaced so an id can never leave the work dir.
fn scratch_dir_name(job_id: &JobId) -> String {
    job_id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_name() {
        assert_eq!(
            scratch_dir_name(&JobId::from_string("8f14e45f-ceea-467f")),
            "8f14e45f-ceea-467f"
        );
        assert_eq!(scratch_dir_name(&JobId::from_string("../etc")), "___etc");
    }
}
