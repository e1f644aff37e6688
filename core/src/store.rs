//! Durable order storage.
//!
//! The [`OrderStore`] trait is the only persistence seam in the system. Both
//! the ingestion pipeline and the read endpoint hold the same instance, so
//! implementations must be safe for concurrent use.
//!
//! # Implementations
//!
//! - `PostgresOrderStore` (in `orderflow-postgres`): production storage
//! - `InMemoryOrderStore` (in `orderflow-testing`): call-counting test double

use crate::order::Order;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`OrderStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row matches the requested `order_uid`.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Connectivity, constraint or query failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A nested structure could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error means the key is absent, as opposed to a failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Idempotent, versioned order persistence.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the store can be shared as
/// `Arc<dyn OrderStore>` between the pipeline task and request handlers.
pub trait OrderStore: Send + Sync {
    /// Insert the order, or overwrite every mutable field of the existing row
    /// with the same `order_uid`, bump `version` by one and refresh
    /// `updated_at`. Runs as a single atomic statement.
    ///
    /// Returns the order as stored, including `created_at`, `updated_at`
    /// and `version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if a nested structure cannot be
    /// encoded, or [`StoreError::Persistence`] on any database failure.
    fn upsert(&self, order: &Order) -> StoreFuture<'_, Order>;

    /// Load one order by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row matches, or
    /// [`StoreError::Persistence`] / [`StoreError::Serialization`] on I/O or
    /// decoding failure.
    fn get(&self, order_uid: &str) -> StoreFuture<'_, Order>;

    /// Load up to `limit` orders, newest `date_created` first.
    ///
    /// An empty store yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] on I/O failure.
    fn list_recent(&self, limit: usize) -> StoreFuture<'_, Vec<Order>>;

    /// Cheap connectivity probe used by the readiness endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the store is unreachable.
    fn ping(&self) -> StoreFuture<'_, ()>;
}
