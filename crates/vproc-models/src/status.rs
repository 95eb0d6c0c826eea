//! Processing status persisted on each video record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a video record.
///
/// The success path is `queued → downloading → uploading → processing →
/// completed`; `failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Waiting on the queue
    #[default]
    Queued,
    /// Fetching the object from storage
    Downloading,
    /// Sending the payload to the analysis service
    Uploading,
    /// Picked up by a worker / analysis running
    Processing,
    /// Analysis stored
    Completed,
    /// Terminal failure, see the stored error
    Failed,
}

impl ProcessingStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Queued => "queued",
            ProcessingStatus::Downloading => "downloading",
            ProcessingStatus::Uploading => "uploading",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown processing status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for ProcessingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ProcessingStatus::Queued),
            "downloading" => Ok(ProcessingStatus::Downloading),
            "uploading" => Ok(ProcessingStatus::Uploading),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::Downloading.is_terminal());
        assert!(!ProcessingStatus::Queued.is_terminal());
    }

    #[test]
    fn test_string_forms_agree() {
        for status in [
            ProcessingStatus::Queued,
            ProcessingStatus::Downloading,
            ProcessingStatus::Uploading,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!("stale".parse::<ProcessingStatus>().is_err());
    }
}
