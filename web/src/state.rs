//! Application state for Axum handlers.

use orderflow_core::OrderStore;
use orderflow_runtime::metrics::MetricsRecorder;
use orderflow_runtime::{InMemoryOrderCache, OrderReader};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all HTTP handlers.
///
/// Cloning is cheap: every field is reference-counted.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Cache-aside order reads.
    pub reader: OrderReader,
    /// Prometheus recorder rendered on `/metrics`.
    pub metrics: MetricsRecorder,
    /// Upper bound for the readiness ping.
    pub ready_timeout: Duration,
}

impl AppState {
    /// Create state over a shared cache and store, with metrics disabled.
    #[must_use]
    pub fn new(cache: Arc<InMemoryOrderCache>, store: Arc<dyn OrderStore>) -> Self {
        Self {
            reader: OrderReader::new(cache, store),
            metrics: MetricsRecorder::default(),
            ready_timeout: Duration::from_secs(2),
        }
    }

    /// Render metrics from `recorder`.
    #[must_use]
    pub fn with_metrics(mut self, recorder: MetricsRecorder) -> Self {
        self.metrics = recorder;
        self
    }
}
