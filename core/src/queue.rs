//! Message queue abstraction consumed by the ingestion pipeline.
//!
//! A [`MessageSource`] hands out one message at a time and advances the
//! consumer group's committed position only when [`MessageSource::commit`] is
//! called. Delivery is at-least-once: anything fetched but never committed may
//! come back after a restart or rebalance.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`MessageSource`] methods.
pub type QueueFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send + 'a>>;

/// Errors that can occur while talking to the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The governing context was cancelled. Not a failure: consumers stop.
    #[error("Fetch cancelled")]
    Cancelled,

    /// Fetching the next message failed. Transient.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Acknowledging a message failed. The message may be redelivered.
    #[error("Commit failed: {0}")]
    Commit(String),

    /// The client could not be created with the supplied settings.
    #[error("Invalid queue configuration: {0}")]
    Configuration(String),
}

/// One message as fetched from the queue, detached from the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Optional message key.
    pub key: Option<Vec<u8>>,
    /// Raw payload; empty when the message carried none.
    pub payload: Vec<u8>,
}

impl QueueMessage {
    /// Create a message with no key.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
        }
    }
}

impl fmt::Display for QueueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// Pull-based source of queue messages with manual commits.
pub trait MessageSource: Send + Sync {
    /// Wait for the next message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] when the source has been shut down
    /// and [`QueueError::Fetch`] for transient failures.
    fn fetch(&self) -> QueueFuture<'_, QueueMessage>;

    /// Advance the committed position past `message`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Commit`] if the broker rejects the commit.
    fn commit<'a>(&'a self, message: &'a QueueMessage) -> QueueFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_position() {
        let message = QueueMessage::new("orders", 2, 41, b"{}".to_vec());
        assert_eq!(message.to_string(), "orders[2]@41");
        assert!(message.key.is_none());
    }
}
