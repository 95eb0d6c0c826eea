//! Queue messages and body parsing.

use vproc_models::VideoMessage;

use crate::error::{QueueError, QueueResult};

/// A message as received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Transport-assigned message id
    pub message_id: String,
    /// Handle required to delete the message after processing
    pub receipt_handle: String,
    /// Raw JSON body
    pub body: String,
}

/// Parse a message body into the job envelope.
pub fn parse_message(body: &str) -> QueueResult<VideoMessage> {
    let body = body.trim();
    if body.is_empty() {
        return Err(QueueError::InvalidMessage("empty body".to_string()));
    }
    Ok(serde_json::from_str(body)?)
}
