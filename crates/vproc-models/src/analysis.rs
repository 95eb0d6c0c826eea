//! Outcome of one pipeline run.

use serde::{Deserialize, Serialize};

use crate::job::SourceKind;

/// Result of analysing a single video.
///
/// Exactly one of `analysis` / `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub job_id: String,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Successful analysis carrying the generated text.
    pub fn succeeded(job_id: impl Into<String>, source_kind: SourceKind, analysis: impl Into<String>) -> Self {
        Self {
            success: true,
            job_id: job_id.into(),
            source_kind,
            analysis: Some(analysis.into()),
            error: None,
        }
    }

    /// Failed analysis carrying a human-readable reason.
    pub fn failed(job_id: impl Into<String>, source_kind: SourceKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            job_id: job_id.into(),
            source_kind,
            analysis: None,
            error: Some(error.into()),
        }
    }

    /// Error message, with a generic fallback for malformed results.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error during analysis")
    }
}
