//! Consumer-group message source with manual offset commits.

use orderflow_core::queue::{MessageSource, QueueError, QueueFuture, QueueMessage};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

/// Default broker list when none is configured.
pub const DEFAULT_BROKERS: &str = "localhost:9092";
/// Default topic.
pub const DEFAULT_TOPIC: &str = "orders";
/// Default consumer group.
pub const DEFAULT_GROUP: &str = "orders-consumer";

/// Kafka-compatible [`MessageSource`] for the order topic.
///
/// Joins a consumer group with auto-commit disabled. [`fetch`] hands out one
/// message at a time; its offset is stored only when [`commit`] is called, so
/// anything fetched but not committed is redelivered after a restart or a
/// rebalance.
///
/// [`fetch`]: MessageSource::fetch
/// [`commit`]: MessageSource::commit
///
/// # Example
///
/// ```no_run
/// use orderflow_redpanda::RedpandaOrderSource;
/// use orderflow_core::MessageSource;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = RedpandaOrderSource::builder()
///     .brokers(["localhost:9092"])
///     .topic("orders")
///     .group_id("orders-consumer")
///     .build()?;
///
/// let message = source.fetch().await?;
/// // ... persist it
/// source.commit(&message).await?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaOrderSource {
    consumer: StreamConsumer,
    topic: String,
    group_id: String,
}

impl RedpandaOrderSource {
    /// Create a builder with the default brokers, topic and group.
    #[must_use]
    pub fn builder() -> RedpandaOrderSourceBuilder {
        RedpandaOrderSourceBuilder::default()
    }

    /// Topic this source is subscribed to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group this source belongs to.
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

impl std::fmt::Debug for RedpandaOrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaOrderSource")
            .field("topic", &self.topic)
            .field("group_id", &self.group_id)
            .finish_non_exhaustive()
    }
}

impl MessageSource for RedpandaOrderSource {
    fn fetch(&self) -> QueueFuture<'_, QueueMessage> {
        Box::pin(async move {
            let message = self
                .consumer
                .recv()
                .await
                .map_err(|e| QueueError::Fetch(e.to_string()))?;

            let fetched = QueueMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            };

            tracing::trace!(message = %fetched, bytes = fetched.payload.len(), "Fetched message");
            Ok(fetched)
        })
    }

    fn commit<'a>(&'a self, message: &'a QueueMessage) -> QueueFuture<'a, ()> {
        Box::pin(async move {
            // The committed offset is the next one to read.
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(
                    &message.topic,
                    message.partition,
                    Offset::Offset(message.offset + 1),
                )
                .map_err(|e| QueueError::Commit(e.to_string()))?;

            self.consumer
                .commit(&offsets, CommitMode::Async)
                .map_err(|e| QueueError::Commit(e.to_string()))?;

            tracing::trace!(%message, "Committed offset");
            Ok(())
        })
    }
}

/// Builder for [`RedpandaOrderSource`].
#[derive(Debug, Clone)]
pub struct RedpandaOrderSourceBuilder {
    brokers: Vec<String>,
    topic: String,
    group_id: String,
    auto_offset_reset: String,
    session_timeout: Duration,
}

impl Default for RedpandaOrderSourceBuilder {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKERS.to_string()],
            topic: DEFAULT_TOPIC.to_string(),
            group_id: DEFAULT_GROUP.to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout: Duration::from_secs(6),
        }
    }
}

impl RedpandaOrderSourceBuilder {
    /// Set bootstrap brokers. Blank entries are ignored.
    #[must_use]
    pub fn brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.brokers = brokers
            .into_iter()
            .map(|b| b.as_ref().trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        self
    }

    /// Set the topic to consume.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the consumer group id.
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    /// Where a group with no committed offset starts reading
    /// (`earliest` or `latest`).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = policy.into();
        self
    }

    /// Set the group session timeout.
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Client configuration the consumer is created from.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] if the broker list, topic or
    /// group id is empty, or the offset reset policy is unknown.
    pub fn client_config(&self) -> Result<ClientConfig, QueueError> {
        if self.brokers.is_empty() {
            return Err(QueueError::Configuration("no brokers configured".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(QueueError::Configuration("topic is empty".to_string()));
        }
        if self.group_id.trim().is_empty() {
            return Err(QueueError::Configuration("consumer group is empty".to_string()));
        }
        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(QueueError::Configuration(format!(
                "unknown auto.offset.reset policy: {}",
                self.auto_offset_reset
            )));
        }

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false");
        Ok(config)
    }

    /// Create the consumer and subscribe to the topic.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] for invalid settings or if the
    /// consumer cannot be created or subscribed.
    pub fn build(self) -> Result<RedpandaOrderSource, QueueError> {
        let consumer: StreamConsumer = self
            .client_config()?
            .create()
            .map_err(|e| QueueError::Configuration(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| QueueError::Configuration(format!("Failed to subscribe: {e}")))?;

        tracing::info!(
            brokers = %self.brokers.join(","),
            topic = %self.topic,
            group_id = %self.group_id,
            auto_offset_reset = %self.auto_offset_reset,
            manual_commit = true,
            "Subscribed to order topic"
        );

        Ok(RedpandaOrderSource {
            consumer,
            topic: self.topic,
            group_id: self.group_id,
        })
    }
}
