//! Destination for poison messages.
//!
//! Messages that can never be processed (undecodable payloads, orders that
//! fail validation) are handed to a [`DeadLetterSink`] and then committed so
//! they stop blocking the partition. The sink decides whether they are kept
//! for inspection or simply dropped.

use crate::queue::QueueMessage;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`DeadLetterSink::record`].
pub type DeadLetterFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), DeadLetterError>> + Send + 'a>>;

/// Why a message was classified as poison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoisonKind {
    /// The payload is not a valid order document.
    Decode,
    /// The payload decoded but failed validation.
    Validation,
}

impl PoisonKind {
    /// Stable label used in storage, headers and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Validation => "validation",
        }
    }

    /// Parse a label produced by [`PoisonKind::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decode" => Some(Self::Decode),
            "validation" => Some(Self::Validation),
            _ => None,
        }
    }
}

/// A poison message plus the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The message exactly as fetched.
    pub message: QueueMessage,
    /// Failure class.
    pub kind: PoisonKind,
    /// Human-readable failure detail.
    pub reason: String,
    /// When the pipeline rejected it.
    pub failed_at: DateTime<Utc>,
}

/// Errors raised by a dead-letter sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterError {
    /// The sink could not store the letter.
    #[error("Dead letter write failed: {0}")]
    WriteFailed(String),
}

/// Pluggable destination for poison messages.
pub trait DeadLetterSink: Send + Sync {
    /// Keep (or drop) a rejected message.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::WriteFailed`] if the letter could not be
    /// stored. The pipeline logs this and still commits the message.
    fn record(&self, letter: DeadLetter) -> DeadLetterFuture<'_>;
}

/// Sink that logs and drops every letter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardDeadLetters;

impl DeadLetterSink for DiscardDeadLetters {
    fn record(&self, letter: DeadLetter) -> DeadLetterFuture<'_> {
        Box::pin(async move {
            tracing::warn!(
                topic = %letter.message.topic,
                partition = letter.message.partition,
                offset = letter.message.offset,
                kind = letter.kind.as_str(),
                reason = %letter.reason,
                "Discarding poison message"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn poison_kind_roundtrip() {
        for kind in [PoisonKind::Decode, PoisonKind::Validation] {
            assert_eq!(PoisonKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PoisonKind::parse("timeout"), None);
    }

    #[tokio::test]
    async fn discard_sink_accepts_everything() {
        let letter = DeadLetter {
            message: QueueMessage::new("orders", 0, 7, b"garbage".to_vec()),
            kind: PoisonKind::Decode,
            reason: "expected value at line 1 column 1".to_string(),
            failed_at: Utc::now(),
        };
        DiscardDeadLetters.record(letter).await.unwrap();
    }
}
