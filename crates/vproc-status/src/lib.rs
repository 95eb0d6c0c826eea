//! Processing status store.
//!
//! This crate provides:
//! - The `StatusStore` contract (idempotent, non-raising writes keyed by job id)
//! - A Supabase/PostgREST implementation with retry and metrics
//! - An in-memory implementation for dry runs and tests

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod store;

pub use client::{SupabaseConfig, SupabaseStatusStore};
pub use error::{StatusError, StatusResult};
pub use memory::{InMemoryStatusStore, VideoRecord};
pub use retry::StatusRetryConfig;
pub use store::StatusStore;
