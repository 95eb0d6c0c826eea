//! Queue-driven video analysis worker.
//!
//! This crate provides:
//! - The pipeline that takes one job from validation to a persisted result
//! - The queue consumer loop with cooperative shutdown
//! - Scratch file cleanup and structured job logging

pub mod cleanup;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod retry;

pub use cleanup::{BestEffort, Cleanup};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{wait_for_shutdown, JobExecutor, WorkerStats};
pub use logging::JobLogger;
pub use processor::{JobHandler, VideoProcessor};
