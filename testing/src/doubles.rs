//! In-memory doubles for the service seams.
//!
//! Fast, deterministic stand-ins for the real adapters:
//! - [`InMemoryOrderStore`]: HashMap-based, versioned order storage
//! - [`ScriptedMessageSource`]: replays a scripted sequence of fetch results
//! - [`RecordingDeadLetterSink`]: keeps every dead letter it is given
//!
//! Every double can be told to fail so error paths are testable without a
//! database or a broker.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use crate::mocks::test_clock;
use orderflow_core::dead_letter::{DeadLetter, DeadLetterError, DeadLetterFuture, DeadLetterSink};
use orderflow_core::environment::Clock;
use orderflow_core::queue::{MessageSource, QueueError, QueueFuture, QueueMessage};
use orderflow_core::store::{OrderStore, StoreError, StoreFuture};
use orderflow_core::Order;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// In-memory order store with the same versioning rules as the real one.
///
/// The first upsert of an `order_uid` stores version 1; every later upsert
/// replaces the payload, keeps `created_at`, and increments the version.
/// Timestamps come from a fixed clock.
///
/// # Example
///
/// ```
/// use orderflow_testing::{InMemoryOrderStore, sample_order};
/// use orderflow_core::OrderStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderStore::new();
///
/// let first = store.upsert(&sample_order("a1")).await?;
/// let second = store.upsert(&sample_order("a1")).await?;
/// assert_eq!((first.version, second.version), (1, 2));
///
/// assert_eq!(store.get("a1").await?.version, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
    clock: Arc<dyn Clock>,
    upsert_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    failing_upserts: Arc<AtomicU32>,
    fail_reads: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Create an empty store stamped by [`test_clock`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(test_clock()))
    }

    /// Create an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            clock,
            upsert_calls: Arc::new(AtomicUsize::new(0)),
            get_calls: Arc::new(AtomicUsize::new(0)),
            failing_upserts: Arc::new(AtomicU32::new(0)),
            fail_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next `count` upserts fail with [`StoreError::Persistence`].
    pub fn fail_next_upserts(&self, count: u32) {
        self.failing_upserts.store(count, Ordering::SeqCst);
    }

    /// Make `get`, `list_recent` and `ping` fail (or stop failing).
    pub fn fail_gets(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `upsert` calls, failed ones included.
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of `get` calls, failed ones included.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Inspect a stored order without counting as a `get` call.
    #[must_use]
    pub fn stored(&self, order_uid: &str) -> Option<Order> {
        self.orders.read().unwrap().get(order_uid).cloned()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_upsert_failure(&self) -> bool {
        self.failing_upserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Persistence("injected read failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOrderStore")
            .field("orders", &self.len())
            .field("upsert_calls", &self.upsert_calls())
            .field("get_calls", &self.get_calls())
            .finish_non_exhaustive()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn upsert(&self, order: &Order) -> StoreFuture<'_, Order> {
        let order = order.clone();
        Box::pin(async move {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            if self.take_upsert_failure() {
                return Err(StoreError::Persistence("injected upsert failure".to_string()));
            }

            let now = self.clock.now();
            let mut orders = self.orders.write().unwrap();
            let stored = match orders.get(&order.order_uid) {
                Some(existing) => Order {
                    created_at: existing.created_at,
                    updated_at: Some(now),
                    version: existing.version + 1,
                    ..order
                },
                None => Order {
                    created_at: Some(now),
                    updated_at: Some(now),
                    version: 1,
                    ..order
                },
            };
            orders.insert(stored.order_uid.clone(), stored.clone());
            Ok(stored)
        })
    }

    fn get(&self, order_uid: &str) -> StoreFuture<'_, Order> {
        let order_uid = order_uid.to_string();
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reads()?;
            self.orders
                .read()
                .unwrap()
                .get(&order_uid)
                .cloned()
                .ok_or(StoreError::NotFound(order_uid))
        })
    }

    fn list_recent(&self, limit: usize) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            self.check_reads()?;
            let mut orders: Vec<Order> = self.orders.read().unwrap().values().cloned().collect();
            orders.sort_by(|a, b| b.date_created.cmp(&a.date_created));
            orders.truncate(limit);
            Ok(orders)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check_reads() })
    }
}

/// Message source that replays a script.
///
/// Each `fetch` pops the next scripted entry. When the script is drained the
/// source returns [`QueueError::Cancelled`], which ends a pipeline run, or
/// waits forever if built with [`ScriptedMessageSource::hold_when_drained`].
#[derive(Debug)]
pub struct ScriptedMessageSource {
    topic: String,
    script: Mutex<VecDeque<Result<QueueMessage, QueueError>>>,
    next_offset: AtomicI64,
    commits: Mutex<Vec<QueueMessage>>,
    fail_commits: AtomicBool,
    hold_when_drained: bool,
}

impl ScriptedMessageSource {
    /// Create an empty source on topic `orders`, partition 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topic: "orders".to_string(),
            script: Mutex::new(VecDeque::new()),
            next_offset: AtomicI64::new(0),
            commits: Mutex::new(Vec::new()),
            fail_commits: AtomicBool::new(false),
            hold_when_drained: false,
        }
    }

    /// Block in `fetch` instead of returning `Cancelled` once drained.
    #[must_use]
    pub const fn hold_when_drained(mut self) -> Self {
        self.hold_when_drained = true;
        self
    }

    /// Script a message with the next offset. Returns the offset.
    pub fn push_payload(&self, payload: Vec<u8>) -> i64 {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.push_message(QueueMessage::new(self.topic.clone(), 0, offset, payload));
        offset
    }

    /// Script an exact message.
    pub fn push_message(&self, message: QueueMessage) {
        self.script.lock().unwrap().push_back(Ok(message));
    }

    /// Script a fetch failure.
    pub fn push_error(&self, error: QueueError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Make every commit fail (or stop failing).
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Offsets of successfully committed messages, in commit order.
    #[must_use]
    pub fn committed_offsets(&self) -> Vec<i64> {
        self.commits.lock().unwrap().iter().map(|m| m.offset).collect()
    }

    /// Scripted entries not fetched yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Default for ScriptedMessageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSource for ScriptedMessageSource {
    fn fetch(&self) -> QueueFuture<'_, QueueMessage> {
        Box::pin(async move {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(entry) => entry,
                None if self.hold_when_drained => std::future::pending().await,
                None => Err(QueueError::Cancelled),
            }
        })
    }

    fn commit<'a>(&'a self, message: &'a QueueMessage) -> QueueFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_commits.load(Ordering::SeqCst) {
                return Err(QueueError::Commit("injected commit failure".to_string()));
            }
            self.commits.lock().unwrap().push(message.clone());
            Ok(())
        })
    }
}

/// Dead-letter sink that keeps every letter in memory.
#[derive(Debug, Default)]
pub struct RecordingDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
    fail_writes: AtomicBool,
}

impl RecordingDeadLetterSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail (or stop failing). Failed writes are not kept.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Letters recorded so far.
    #[must_use]
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

impl DeadLetterSink for RecordingDeadLetterSink {
    fn record(&self, letter: DeadLetter) -> DeadLetterFuture<'_> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DeadLetterError::WriteFailed("injected write failure".to_string()));
            }
            self.letters.lock().unwrap().push(letter);
            Ok(())
        })
    }
}
