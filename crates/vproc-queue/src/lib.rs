//! Video job queue.
//!
//! This crate provides the consumer side of the job queue:
//! - The `MessageQueue` contract (long-poll receive, delete by receipt)
//! - An Amazon SQS implementation
//! - Parsing of message bodies into job descriptors

pub mod error;
pub mod message;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use message::{parse_message, QueueMessage};
pub use queue::{MessageQueue, QueueConfig, SqsQueue, MAX_BATCH_SIZE, MAX_WAIT_TIME};
