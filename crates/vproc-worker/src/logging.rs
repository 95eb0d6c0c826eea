//! Structured job logging.
//!
//! Every line carries the job id, the operation and, once known, the
//! source kind, so one job can be followed through the logs.

use tracing::{error, info, warn, Span};
use vproc_models::{JobId, SourceKind};

/// Job logger for structured logging with consistent fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    source: Option<SourceKind>,
}

impl JobLogger {
    /// Create a logger for a specific job and operation.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self::from_string(job_id.as_str(), operation)
    }

    /// Create a logger from a string job id.
    pub fn from_string(job_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            source: None,
        }
    }

    /// Attach the resolved source kind.
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    fn source_str(&self) -> &'static str {
        self.source.map(|s| s.as_str()).unwrap_or("unknown")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            source = self.source_str(),
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            source = self.source_str(),
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            source = self.source_str(),
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            source = self.source_str(),
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            source = self.source_str(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping everything done for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::from_string("vid-1");
        let logger = JobLogger::new(&job_id, "video_processing");

        assert_eq!(logger.job_id(), "vid-1");
        assert_eq!(logger.operation(), "video_processing");
        assert_eq!(logger.source_str(), "unknown");
    }

    #[test]
    fn test_with_source() {
        let logger = JobLogger::from_string("vid-2", "video_processing").with_source(SourceKind::RemoteUrl);
        assert_eq!(logger.source_str(), "youtube");
    }
}
