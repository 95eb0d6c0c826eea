//! S3 object store gateway.
//!
//! This crate provides:
//! - The `ObjectStore` contract used by the worker pipeline
//! - An S3 implementation that streams objects to local scratch files

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use store::ObjectStore;
