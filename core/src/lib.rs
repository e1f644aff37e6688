//! # Orderflow Core
//!
//! Shared types and seams for the Orderflow order ingestion service.
//!
//! Orderflow drains order records from a message queue, persists them in a
//! relational store under an idempotent upsert, mirrors them into an
//! in-memory cache, and serves point reads through a cache-aside path.
//!
//! ## Seams
//!
//! - [`store::OrderStore`]: durable, versioned persistence
//! - [`queue::MessageSource`]: at-least-once message delivery with manual commits
//! - [`dead_letter::DeadLetterSink`]: destination for poison messages
//! - [`environment::Clock`]: time source
//!
//! Every seam is a `Send + Sync` trait returning boxed futures so it can be
//! held as `Arc<dyn _>` and swapped for the doubles in `orderflow-testing`.
//!
//! ## Flow
//!
//! ```text
//! queue ──fetch──▶ decode ──▶ validate ──▶ upsert ──▶ cache.set ──▶ commit
//!                    │            │
//!                    └──poison────┴──▶ dead letter ──▶ commit
//!
//! GET /order/{id} ──▶ cache ──miss──▶ store ──▶ cache fill ──▶ response
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dead_letter;
pub mod order;
pub mod queue;
pub mod store;

pub use dead_letter::{DeadLetter, DeadLetterError, DeadLetterSink, DiscardDeadLetters, PoisonKind};
pub use order::{Delivery, Item, Order, Payment, ValidationError};
pub use queue::{MessageSource, QueueError, QueueMessage};
pub use store::{OrderStore, StoreError};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Injected dependencies that are not persistence or messaging.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
