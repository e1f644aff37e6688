//! # Orderflow Runtime
//!
//! The moving parts of the service:
//!
//! - [`IngestionPipeline`]: drains the queue, persists, caches, commits
//! - [`InMemoryOrderCache`]: the concurrent `order_uid → Order` map
//! - [`OrderReader`]: cache-aside point reads
//! - [`warm_cache`]: startup preload of recent orders
//! - [`RetryPolicy`]: backoff between retries
//! - [`metrics`]: Prometheus recorder and metric names
//!
//! # Example
//!
//! ```rust,no_run
//! use orderflow_runtime::{InMemoryOrderCache, IngestionPipeline, OrderReader, warm_cache};
//! use orderflow_core::{MessageSource, OrderStore};
//! use std::sync::Arc;
//! use tokio::sync::broadcast;
//!
//! # async fn example(source: Arc<dyn MessageSource>, store: Arc<dyn OrderStore>) {
//! let cache = Arc::new(InMemoryOrderCache::new());
//! let _ = warm_cache(store.as_ref(), &cache, 1000).await;
//!
//! let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//! let pipeline = IngestionPipeline::new(source, Arc::clone(&store), Arc::clone(&cache), shutdown_rx).spawn();
//!
//! let reader = OrderReader::new(cache, store);
//! let order = reader.get("b563feb7b2b84b6test").await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod metrics;
pub mod pipeline;
pub mod read_path;
pub mod retry;
pub mod warmup;

pub use cache::InMemoryOrderCache;
pub use pipeline::{IngestionPipeline, PipelineConfig, PipelineStats};
pub use read_path::{OrderReader, ReadError};
pub use retry::RetryPolicy;
pub use warmup::warm_cache;
