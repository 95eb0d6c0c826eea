//! Worker metrics.

use metrics::{counter, histogram};

/// Metric names.
pub mod names {
    pub const MESSAGES_RECEIVED: &str = "vproc_worker_messages_received_total";
    pub const MESSAGES_PROCESSED: &str = "vproc_worker_messages_processed_total";
    pub const ERRORS_TOTAL: &str = "vproc_worker_errors_total";
    pub const JOB_DURATION_SECONDS: &str = "vproc_worker_job_duration_seconds";
}

/// Where in the consumer loop an error was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Receive,
    Parse,
    Job,
    Delete,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Parse => "parse",
            Self::Job => "job",
            Self::Delete => "delete",
        }
    }
}

pub fn record_received() {
    counter!(names::MESSAGES_RECEIVED).increment(1);
}

pub fn record_processed(duration_secs: f64) {
    counter!(names::MESSAGES_PROCESSED).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "success").record(duration_secs);
}

pub fn record_job_failed(duration_secs: f64) {
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "failure").record(duration_secs);
}

pub fn record_error(kind: ErrorKind) {
    counter!(names::ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
}
