//! Job queue using Amazon SQS long polling.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use aws_types::region::Region;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::message::QueueMessage;

/// Longest long-poll SQS accepts.
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);
/// Largest receive batch SQS accepts.
pub const MAX_BATCH_SIZE: usize = 10;

/// Consumer side of a durable message queue.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages` messages, waiting at most `wait`.
    /// An empty result is not an error.
    async fn receive(&self, wait: Duration, max_messages: usize) -> QueueResult<Vec<QueueMessage>>;

    /// Delete a message so it is not redelivered.
    async fn delete(&self, receipt_handle: &str) -> QueueResult<()>;
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub queue_url: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint for SQS-compatible brokers
    pub endpoint_url: Option<String>,
    /// Visibility timeout applied to received messages (queue default when absent)
    pub visibility_timeout: Option<Duration>,
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        let queue_url = std::env::var("AWS_SQS_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| QueueError::config_error("AWS_SQS_URL not set"))?;

        Ok(Self {
            queue_url,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
            visibility_timeout: std::env::var("SQS_VISIBILITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        })
    }
}

/// Clamp a long-poll wait to what SQS accepts, in whole seconds.
fn clamp_wait(wait: Duration) -> i32 {
    wait.min(MAX_WAIT_TIME).as_secs() as i32
}

/// Clamp a batch size to what SQS accepts.
fn clamp_batch(max_messages: usize) -> i32 {
    max_messages.clamp(1, MAX_BATCH_SIZE) as i32
}

/// SQS queue client.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    config: QueueConfig,
}

impl SqsQueue {
    /// Create a new queue client.
    pub async fn new(config: QueueConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        info!("SQS queue client ready: {}", config.queue_url);

        Self {
            client: Client::new(&shared),
            config,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> QueueResult<Self> {
        Ok(Self::new(QueueConfig::from_env()?).await)
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, wait: Duration, max_messages: usize) -> QueueResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .wait_time_seconds(clamp_wait(wait))
            .max_number_of_messages(clamp_batch(max_messages))
            .message_attribute_names("All")
            .set_visibility_timeout(self.config.visibility_timeout.map(|d| d.as_secs() as i32))
            .send()
            .await
            .map_err(|e| QueueError::receive_failed(DisplayErrorContext(&e).to_string()))?;

        let mut messages = Vec::new();

        for message in output.messages() {
            let message_id = message.message_id().unwrap_or_default().to_string();

            let Some(receipt_handle) = message.receipt_handle() else {
                warn!("Skipping message {} without receipt handle", message_id);
                continue;
            };

            messages.push(QueueMessage {
                message_id,
                receipt_handle: receipt_handle.to_string(),
                body: message.body().unwrap_or_default().to_string(),
            });
        }

        if !messages.is_empty() {
            debug!("Received {} message(s)", messages.len());
        }

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::delete_failed(DisplayErrorContext(&e).to_string()))?;

        debug!("Deleted message with receipt {}", receipt_handle);
        Ok(())
    }
}
