//! In-memory order cache.
//!
//! A concurrent map from `order_uid` to the last [`Order`] written for it.
//! Reads vastly outnumber writes, so the map sits behind a `RwLock`: readers
//! share the lock and never wait on each other.
//!
//! The cache is unbounded and never evicts. Entries live until the process
//! exits or [`InMemoryOrderCache::delete`] removes them.

use orderflow_core::Order;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Concurrent `order_uid → Order` map.
#[derive(Debug, Default)]
pub struct InMemoryOrderCache {
    entries: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an order. Returns a copy so callers never hold the lock.
    #[must_use]
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_uid)
            .cloned()
    }

    /// Unconditionally store `order` under `order_uid`, replacing any
    /// previous entry. Last writer wins.
    pub fn set(&self, order_uid: impl Into<String>, order: Order) {
        let len = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.insert(order_uid.into(), order);
            entries.len()
        };
        record_len(len);
    }

    /// Store `order` unless the cache already holds the same or a newer
    /// version of it.
    ///
    /// Used by the read path, which may race with the ingestion pipeline: a
    /// reader that loaded version `n` from the store must not overwrite the
    /// version `n + 1` the pipeline cached in the meantime.
    ///
    /// Returns `true` if the entry was written.
    pub fn fill_if_newer(&self, order: Order) -> bool {
        let (written, len) = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let stale = entries
                .get(&order.order_uid)
                .is_some_and(|cached| cached.version >= order.version);
            if !stale {
                entries.insert(order.order_uid.clone(), order);
            }
            (!stale, entries.len())
        };
        record_len(len);
        written
    }

    /// Remove an entry, returning it if present.
    pub fn delete(&self, order_uid: &str) -> Option<Order> {
        let (removed, len) = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let removed = entries.remove(order_uid);
            (removed, entries.len())
        };
        record_len(len);
        removed
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_len(len: usize) {
    metrics::gauge!("orderflow_cache_entries").set(len as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn order(uid: &str, version: i32, track_number: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: track_number.to_string(),
            version,
            ..Order::default()
        }
    }

    #[test]
    fn get_on_empty_cache_misses() {
        let cache = InMemoryOrderCache::new();
        assert!(cache.get("b563feb7b2b84b6test").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn set_then_get_returns_equal_order() {
        let cache = InMemoryOrderCache::new();
        let stored = order("a1", 1, "WBILMTESTTRACK");
        cache.set("a1", stored.clone());
        assert_eq!(cache.get("a1"), Some(stored));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_is_last_writer_wins() {
        let cache = InMemoryOrderCache::new();
        cache.set("a1", order("a1", 2, "newer"));
        cache.set("a1", order("a1", 1, "older"));
        assert_eq!(cache.get("a1").unwrap().track_number, "older");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn fill_if_newer_never_downgrades() {
        let cache = InMemoryOrderCache::new();
        cache.set("a1", order("a1", 3, "pipeline"));

        assert!(!cache.fill_if_newer(order("a1", 2, "stale read")));
        assert!(!cache.fill_if_newer(order("a1", 3, "same version")));
        assert_eq!(cache.get("a1").unwrap().track_number, "pipeline");

        assert!(cache.fill_if_newer(order("a1", 4, "fresh read")));
        assert_eq!(cache.get("a1").unwrap().track_number, "fresh read");
    }

    #[test]
    fn fill_if_newer_writes_missing_entries() {
        let cache = InMemoryOrderCache::new();
        assert!(cache.fill_if_newer(order("a1", 1, "first")));
        assert_eq!(cache.get("a1").unwrap().version, 1);
    }

    #[test]
    fn delete_removes_entry() {
        let cache = InMemoryOrderCache::new();
        cache.set("a1", order("a1", 1, "x"));
        assert!(cache.delete("a1").is_some());
        assert!(cache.delete("a1").is_none());
        assert!(cache.get("a1").is_none());
    }

    proptest::proptest! {
        #[test]
        fn fills_keep_the_highest_version(versions in proptest::collection::vec(1..50i32, 1..20)) {
            let cache = InMemoryOrderCache::new();
            for version in &versions {
                cache.fill_if_newer(order("a1", *version, "t"));
            }
            let max = versions.iter().copied().max().unwrap();
            proptest::prop_assert_eq!(cache.get("a1").unwrap().version, max);
        }
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = Arc::new(InMemoryOrderCache::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let uid = format!("order-{worker}-{i}");
                        cache.set(uid.clone(), order(&uid, 1, "t"));
                        assert!(cache.get(&uid).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 800);
    }
}
