//! Kafka-compatible messaging for Orderflow.
//!
//! This crate provides the queue side of the service on top of rdkafka, so it
//! works against Redpanda, Apache Kafka or any other Kafka-protocol broker:
//!
//! - [`RedpandaOrderSource`]: consumer-group [`MessageSource`] with manual
//!   offset commits
//! - [`RedpandaDeadLetterSink`]: publishes poison messages to a dead-letter
//!   topic
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - The pipeline commits a message only after it is persisted (or dead-lettered)
//! - If the process crashes before commit, the message is redelivered
//! - The order upsert is idempotent, so redelivery is harmless
//! - Ordering is guaranteed within a partition
//!
//! [`MessageSource`]: orderflow_core::MessageSource
//!
//! # Example
//!
//! ```no_run
//! use orderflow_redpanda::{RedpandaDeadLetterSink, RedpandaOrderSource};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RedpandaOrderSource::builder()
//!     .brokers(["localhost:9092"])
//!     .topic("orders")
//!     .group_id("orders-consumer")
//!     .build()?;
//!
//! let dead_letters = RedpandaDeadLetterSink::new(&["localhost:9092".to_string()], "orders.dlq")?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dead_letter;
pub mod source;

pub use dead_letter::{RedpandaDeadLetterSink, dead_letter_headers};
pub use source::{
    DEFAULT_BROKERS, DEFAULT_GROUP, DEFAULT_TOPIC, RedpandaOrderSource, RedpandaOrderSourceBuilder,
};
