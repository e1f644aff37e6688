//! Cache-aside order reads.

use crate::cache::InMemoryOrderCache;
use crate::metrics::ReadMetrics;
use orderflow_core::{Order, OrderStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// Why a point read failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Neither the cache nor the store knows the order.
    #[error("Order not found: {0}")]
    NotFound(String),
    /// The store failed for a reason other than absence.
    #[error("Order lookup failed: {0}")]
    Internal(StoreError),
}

/// Reads orders from the cache, falling back to the store on a miss and
/// filling the cache with what the store returned.
#[derive(Clone)]
pub struct OrderReader {
    cache: Arc<InMemoryOrderCache>,
    store: Arc<dyn OrderStore>,
}

impl OrderReader {
    /// Create a reader over a shared cache and store.
    #[must_use]
    pub fn new(cache: Arc<InMemoryOrderCache>, store: Arc<dyn OrderStore>) -> Self {
        Self { cache, store }
    }

    /// The cache this reader fills.
    #[must_use]
    pub const fn cache(&self) -> &Arc<InMemoryOrderCache> {
        &self.cache
    }

    /// The store this reader falls back to.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Look up one order.
    ///
    /// A hit never touches the store. A miss loads from the store and fills
    /// the cache through [`InMemoryOrderCache::fill_if_newer`], so a slow read
    /// cannot replace a version the pipeline cached while it was in flight.
    ///
    /// # Errors
    ///
    /// - [`ReadError::NotFound`] if the store has no such order
    /// - [`ReadError::Internal`] for any other store failure
    pub async fn get(&self, order_uid: &str) -> Result<Order, ReadError> {
        if let Some(order) = self.cache.get(order_uid) {
            ReadMetrics::record_hit();
            return Ok(order);
        }
        ReadMetrics::record_miss();

        match self.store.get(order_uid).await {
            Ok(order) => {
                if !self.cache.fill_if_newer(order.clone()) {
                    tracing::debug!(
                        order_uid,
                        version = order.version,
                        "Cache already holds a newer version, not filling"
                    );
                }
                Ok(order)
            },
            Err(e) if e.is_not_found() => {
                ReadMetrics::record_error("not_found");
                Err(ReadError::NotFound(order_uid.to_string()))
            },
            Err(e) => {
                ReadMetrics::record_error("internal");
                tracing::error!(order_uid, error = %e, "Order lookup failed");
                Err(ReadError::Internal(e))
            },
        }
    }
}

impl std::fmt::Debug for OrderReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderReader")
            .field("cached_orders", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use orderflow_testing::{InMemoryOrderStore, sample_order};

    fn reader(store: &Arc<InMemoryOrderStore>) -> OrderReader {
        OrderReader::new(
            Arc::new(InMemoryOrderCache::new()),
            Arc::clone(store) as Arc<dyn OrderStore>,
        )
    }

    #[tokio::test]
    async fn miss_then_hit_touches_store_once() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert(&sample_order("b563feb7b2b84b6test")).await.unwrap();
        let reader = reader(&store);

        let first = reader.get("b563feb7b2b84b6test").await.unwrap();
        let second = reader.get("b563feb7b2b84b6test").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.get_calls(), 1);
        assert_eq!(reader.cache().len(), 1);
    }

    #[tokio::test]
    async fn hit_never_touches_store() {
        let store = Arc::new(InMemoryOrderStore::new());
        let reader = reader(&store);
        reader.cache().set("cached", sample_order("cached"));

        let order = reader.get("cached").await.unwrap();

        assert_eq!(order.order_uid, "cached");
        assert_eq!(store.get_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found_and_not_cached() {
        let store = Arc::new(InMemoryOrderStore::new());
        let reader = reader(&store);

        let err = reader.get("missing").await.unwrap_err();

        assert_eq!(err, ReadError::NotFound("missing".to_string()));
        assert!(reader.cache().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.fail_gets(true);
        let reader = reader(&store);

        let err = reader.get("any").await.unwrap_err();

        assert!(matches!(err, ReadError::Internal(StoreError::Persistence(_))));
        assert!(reader.cache().is_empty());
    }

    #[tokio::test]
    async fn fill_does_not_replace_newer_cached_version() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert(&sample_order("a1")).await.unwrap();
        let reader = reader(&store);

        let stored = store.get("a1").await.unwrap();
        let newer = Order {
            version: stored.version + 1,
            track_number: "NEWER".to_string(),
            ..stored.clone()
        };
        // Pipeline cached a newer version, then a reader with an older view
        // of the store tries to fill.
        reader.cache().set("a1", newer);
        assert!(!reader.cache().fill_if_newer(stored));

        let read = reader.get("a1").await.expect("cached");
        assert_eq!(read.track_number, "NEWER");
    }
}
