//! `PostgreSQL` persistence for Orderflow.
//!
//! This crate provides:
//!
//! - [`PostgresOrderStore`]: the durable [`OrderStore`](orderflow_core::OrderStore)
//!   with idempotent, versioned upserts and JSONB-encoded nested structures
//! - [`DeadLetterQueue`]: a `poison_messages` table usable as a
//!   [`DeadLetterSink`](orderflow_core::DeadLetterSink)
//! - Embedded migrations for both tables
//!
//! # Example
//!
//! ```no_run
//! use orderflow_postgres::{DeadLetterQueue, PoolSettings, PostgresOrderStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresOrderStore::connect("postgres://localhost/orders", &PoolSettings::default()).await?;
//!     store.migrate().await?;
//!     let dlq = DeadLetterQueue::new(store.pool().clone());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dead_letter_queue;
pub mod orders;

pub use dead_letter_queue::{DLQStatus, DeadLetterQueue, PoisonMessage};
pub use orders::{PoolSettings, PostgresOrderStore};
