//! Shared data models for the video processing worker.
//!
//! This crate provides Serde-serializable types for:
//! - Queue job descriptors and their source kinds
//! - Processing status values persisted per video
//! - Analysis results produced by the pipeline

pub mod analysis;
pub mod job;
pub mod status;

// Re-export common types
pub use analysis::AnalysisResult;
pub use job::{
    JobId, JobValidationError, ObjectStoreSource, RemoteUrlSource, SourceKind, VideoJob,
    VideoMessage, DEFAULT_MIME_TYPE,
};
pub use status::{ParseStatusError, ProcessingStatus};
