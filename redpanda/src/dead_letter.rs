//! Dead-letter topic publisher.

use orderflow_core::dead_letter::{DeadLetter, DeadLetterError, DeadLetterFuture, DeadLetterSink};
use orderflow_core::queue::QueueError;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Header carrying the failure class (`decode` or `validation`).
pub const HEADER_KIND: &str = "orderflow-poison-kind";
/// Header carrying the rejection detail.
pub const HEADER_REASON: &str = "orderflow-poison-reason";
/// Header carrying the source topic.
pub const HEADER_SOURCE_TOPIC: &str = "orderflow-source-topic";
/// Header carrying the source partition.
pub const HEADER_SOURCE_PARTITION: &str = "orderflow-source-partition";
/// Header carrying the source offset.
pub const HEADER_SOURCE_OFFSET: &str = "orderflow-source-offset";
/// Header carrying the RFC 3339 rejection time.
pub const HEADER_FAILED_AT: &str = "orderflow-failed-at";

/// Publishes poison messages, byte for byte, to a dead-letter topic.
///
/// The original key and payload are kept; where the message came from and
/// why it was rejected travel as headers.
pub struct RedpandaDeadLetterSink {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl RedpandaDeadLetterSink {
    /// Create a producer for `topic` on `brokers`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] if the broker list or topic is
    /// empty or the producer cannot be created.
    pub fn new(brokers: &[String], topic: impl Into<String>) -> Result<Self, QueueError> {
        let topic = topic.into();
        let brokers: Vec<&str> = brokers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect();

        if brokers.is_empty() {
            return Err(QueueError::Configuration("no brokers configured".to_string()));
        }
        if topic.trim().is_empty() {
            return Err(QueueError::Configuration("dead-letter topic is empty".to_string()));
        }

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| QueueError::Configuration(format!("Failed to create producer: {e}")))?;

        tracing::info!(topic = %topic, "Dead-letter producer created");

        Ok(Self {
            producer,
            topic,
            timeout: Duration::from_secs(5),
        })
    }

    /// Override how long a publish may wait in the producer queue.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dead-letter topic name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Headers attached to a dead-lettered message.
#[must_use]
pub fn dead_letter_headers(letter: &DeadLetter) -> OwnedHeaders {
    let partition = letter.message.partition.to_string();
    let offset = letter.message.offset.to_string();
    let failed_at = letter.failed_at.to_rfc3339();

    OwnedHeaders::new()
        .insert(Header {
            key: HEADER_KIND,
            value: Some(letter.kind.as_str()),
        })
        .insert(Header {
            key: HEADER_REASON,
            value: Some(letter.reason.as_str()),
        })
        .insert(Header {
            key: HEADER_SOURCE_TOPIC,
            value: Some(letter.message.topic.as_str()),
        })
        .insert(Header {
            key: HEADER_SOURCE_PARTITION,
            value: Some(partition.as_str()),
        })
        .insert(Header {
            key: HEADER_SOURCE_OFFSET,
            value: Some(offset.as_str()),
        })
        .insert(Header {
            key: HEADER_FAILED_AT,
            value: Some(failed_at.as_str()),
        })
}

impl std::fmt::Debug for RedpandaDeadLetterSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaDeadLetterSink")
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DeadLetterSink for RedpandaDeadLetterSink {
    fn record(&self, letter: DeadLetter) -> DeadLetterFuture<'_> {
        Box::pin(async move {
            let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic)
                .payload(letter.message.payload.as_slice())
                .headers(dead_letter_headers(&letter));
            if let Some(key) = letter.message.key.as_deref() {
                record = record.key(key);
            }

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::warn!(
                        source = %letter.message,
                        dlq_topic = %self.topic,
                        dlq_partition = partition,
                        dlq_offset = offset,
                        kind = letter.kind.as_str(),
                        reason = %letter.reason,
                        "Poison message published to dead-letter topic"
                    );
                    Ok(())
                },
                Err((kafka_error, _)) => {
                    tracing::error!(
                        source = %letter.message,
                        dlq_topic = %self.topic,
                        error = %kafka_error,
                        "Failed to publish poison message"
                    );
                    Err(DeadLetterError::WriteFailed(kafka_error.to_string()))
                },
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orderflow_core::{PoisonKind, QueueMessage};
    use rdkafka::message::Headers;

    fn letter() -> DeadLetter {
        DeadLetter {
            message: QueueMessage::new("orders", 2, 1337, b"{\"order_uid\":".to_vec()),
            kind: PoisonKind::Decode,
            reason: "EOF while parsing a value".to_string(),
            failed_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn header_value(headers: &OwnedHeaders, key: &str) -> Option<String> {
        headers
            .iter()
            .find(|h| h.key == key)
            .and_then(|h| h.value)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    #[test]
    fn redpanda_dead_letter_sink_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaDeadLetterSink>();
        assert_sync::<RedpandaDeadLetterSink>();
    }

    #[test]
    fn headers_describe_origin_and_reason() {
        let headers = dead_letter_headers(&letter());

        assert_eq!(header_value(&headers, HEADER_KIND).as_deref(), Some("decode"));
        assert_eq!(
            header_value(&headers, HEADER_REASON).as_deref(),
            Some("EOF while parsing a value")
        );
        assert_eq!(header_value(&headers, HEADER_SOURCE_TOPIC).as_deref(), Some("orders"));
        assert_eq!(header_value(&headers, HEADER_SOURCE_PARTITION).as_deref(), Some("2"));
        assert_eq!(header_value(&headers, HEADER_SOURCE_OFFSET).as_deref(), Some("1337"));
        assert_eq!(
            header_value(&headers, HEADER_FAILED_AT).as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn empty_settings_are_rejected() {
        let no_brokers = RedpandaDeadLetterSink::new(&[" ".to_string()], "orders.dlq");
        assert!(matches!(no_brokers, Err(QueueError::Configuration(_))));

        let no_topic = RedpandaDeadLetterSink::new(&["localhost:9092".to_string()], "");
        assert!(matches!(no_topic, Err(QueueError::Configuration(_))));
    }
}
