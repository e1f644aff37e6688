//! # Orderflow Testing
//!
//! Test doubles and fixtures for Orderflow.
//!
//! This crate provides:
//! - In-memory implementations of the store, queue and dead-letter seams
//! - A fixed clock
//! - Sample orders and payloads
//! - proptest strategies for orders
//!
//! ## Example
//!
//! ```ignore
//! use orderflow_testing::{InMemoryOrderStore, ScriptedMessageSource, order_payload, sample_order};
//!
//! #[tokio::test]
//! async fn test_ingest_one_order() {
//!     let source = ScriptedMessageSource::new();
//!     source.push_payload(order_payload(&sample_order("a1")));
//!
//!     let store = Arc::new(InMemoryOrderStore::new());
//!     let stats = IngestionPipeline::new(Arc::new(source), store.clone(), cache, shutdown_rx)
//!         .run()
//!         .await;
//!
//!     assert_eq!(stats.persisted, 1);
//!     assert_eq!(store.stored("a1").unwrap().version, 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use orderflow_core::environment::Clock;

mod doubles;

pub use doubles::{InMemoryOrderStore, RecordingDeadLetterSink, ScriptedMessageSource};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use orderflow_testing::mocks::FixedClock;
    /// use orderflow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Sample orders shaped like the ones the upstream publisher sends.
pub mod fixtures {
    use chrono::{TimeZone, Utc};
    use orderflow_core::{Delivery, Item, Order, Payment};

    /// A complete, valid order with the given id.
    ///
    /// Store-assigned fields (`created_at`, `updated_at`, `version`) are
    /// left unset.
    #[must_use]
    pub fn sample_order(order_uid: &str) -> Order {
        Order {
            order_uid: order_uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: order_uid.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                deliver_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
                payment_dt: 1_637_907_727,
                bank: "alpha".to_string(),
            },
            items: vec![Item {
                chrt_id: 9_934_930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2_389_212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shard_key: "9".to_string(),
            sm_id: 99,
            date_created: Utc
                .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
                .single()
                .unwrap_or_default(),
            oof_shard: "1".to_string(),
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }

    /// JSON queue payload for `order`.
    ///
    /// # Panics
    ///
    /// Never in practice: every field of [`Order`] is serializable.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn order_payload(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).expect("orders always serialize")
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use super::fixtures::sample_order;
    use orderflow_core::Order;
    use proptest::prelude::*;

    /// Orders with random identity fields and 0..4 items. Roughly a third
    /// have an empty `order_uid`, `customer_id` or item list.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        (
            prop_oneof![Just(String::new()), "[a-z0-9]{1,20}"],
            prop_oneof![Just(String::new()), "[a-z]{1,10}"],
            0..4usize,
        )
            .prop_map(|(order_uid, customer_id, item_count)| {
                let mut order = sample_order(&order_uid);
                order.customer_id = customer_id;
                let template = order.items[0].clone();
                order.items = vec![template; item_count];
                order
            })
    }
}

pub use fixtures::{order_payload, sample_order};
pub use mocks::{FixedClock, test_clock};
