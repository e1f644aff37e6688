//! Startup cache warm-up.

use crate::cache::InMemoryOrderCache;
use orderflow_core::{OrderStore, StoreError};

/// Load up to `limit` of the most recently created orders into the cache.
///
/// A `limit` of zero skips the store entirely. Returns how many orders were
/// cached.
///
/// # Errors
///
/// Returns the store error if the listing fails. Callers treat this as
/// non-fatal: the read path fills the cache lazily anyway.
pub async fn warm_cache(
    store: &dyn OrderStore,
    cache: &InMemoryOrderCache,
    limit: usize,
) -> Result<usize, StoreError> {
    if limit == 0 {
        tracing::debug!("Cache warm-up disabled");
        return Ok(0);
    }

    let orders = store.list_recent(limit).await?;
    let loaded = orders.len();

    for order in orders {
        cache.fill_if_newer(order);
    }

    tracing::info!(loaded, limit, "Cache warmed from store");
    Ok(loaded)
}
