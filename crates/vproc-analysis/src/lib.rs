//! Video analysis client.
//!
//! This crate provides:
//! - The `AnalysisService` capability set (upload, state, generate, delete)
//! - A Gemini REST implementation with model fallback
//! - `AnalysisClient`, which drives upload, readiness polling, generation
//!   and asset cleanup, and reports every outcome as an `AnalysisResult`

pub mod client;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod service;

pub use client::{AnalysisClient, AnalysisClientConfig, VideoAnalyzer};
pub use error::{AnalysisError, ServiceResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use prompt::VIDEO_ANALYSIS_PROMPT;
pub use service::{AnalysisService, AssetRef, AssetState, MediaReference};
