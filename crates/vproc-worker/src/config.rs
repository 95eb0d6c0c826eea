//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for per-job scratch directories
    pub work_dir: PathBuf,
    /// Long-poll wait per receive
    pub poll_wait: Duration,
    /// Messages requested per receive
    pub max_batch: usize,
    /// Pause after a failed receive
    pub error_backoff: Duration,
    /// Minimum spacing of "no messages" log lines
    pub idle_log_interval: Duration,
    /// Acknowledge redelivered jobs whose record is already completed without reprocessing
    pub skip_completed_jobs: bool,
    /// Retries for a failed message delete
    pub delete_retries: u32,
    /// Base delay for delete retries (doubles each attempt)
    pub delete_retry_base: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./downloads"),
            poll_wait: Duration::from_secs(20),
            max_batch: 10,
            error_backoff: Duration::from_secs(5),
            idle_log_interval: Duration::from_secs(60),
            skip_completed_jobs: true,
            delete_retries: 3,
            delete_retry_base: Duration::from_millis(200),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .or_else(|_| std::env::var("DOWNLOAD_DIR"))
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            poll_wait: Duration::from_secs(
                std::env::var("WORKER_POLL_WAIT_SECS")
                    .or_else(|_| std::env::var("SQS_WAIT_TIME_SECS"))
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            max_batch: std::env::var("WORKER_MAX_BATCH")
                .or_else(|_| std::env::var("SQS_MAX_MESSAGES"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_batch),
            error_backoff: Duration::from_secs(
                std::env::var("WORKER_ERROR_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            idle_log_interval: Duration::from_secs(
                std::env::var("WORKER_IDLE_LOG_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            skip_completed_jobs: std::env::var("WORKER_SKIP_COMPLETED")
                .ok()
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.skip_completed_jobs),
            delete_retries: std::env::var("WORKER_DELETE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.delete_retries),
            delete_retry_base: defaults.delete_retry_base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "WORKER_WORK_DIR",
            "DOWNLOAD_DIR",
            "WORKER_POLL_WAIT_SECS",
            "SQS_WAIT_TIME_SECS",
            "WORKER_MAX_BATCH",
            "SQS_MAX_MESSAGES",
            "WORKER_SKIP_COMPLETED",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = WorkerConfig::from_env();
        assert_eq!(config.work_dir, PathBuf::from("./downloads"));
        assert_eq!(config.poll_wait, Duration::from_secs(20));
        assert_eq!(config.max_batch, 10);
        assert!(config.skip_completed_jobs);
    }

    #[test]
    #[serial]
    fn test_legacy_aliases() {
        clear_env();
        std::env::set_var("DOWNLOAD_DIR", "/var/tmp/videos");
        std::env::set_var("SQS_WAIT_TIME_SECS", "5");
        std::env::set_var("WORKER_SKIP_COMPLETED", "false");
        let config = WorkerConfig::from_env();
        clear_env();

        assert_eq!(config.work_dir, PathBuf::from("/var/tmp/videos"));
        assert_eq!(config.poll_wait, Duration::from_secs(5));
        assert!(!config.skip_completed_jobs);
    }
}
