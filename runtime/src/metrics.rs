//! Prometheus metrics for the ingestion pipeline and the read path.
//!
//! Metrics are recorded through the `metrics` facade everywhere in the
//! workspace. [`MetricsRecorder::install`] installs the Prometheus recorder
//! once per process and keeps the handle the HTTP layer renders on
//! `GET /metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use orderflow_runtime::metrics::{MetricsRecorder, PipelineMetrics};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::install()?;
//! PipelineMetrics::record_consumed();
//!
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use orderflow_core::PoisonKind;
use thiserror::Error;

pub use metrics::{counter, gauge};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
#[derive(Clone, Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("installed", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    /// Install the global Prometheus recorder and describe every metric.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the exporter cannot be installed.
    /// A recorder that is already installed (for example by another test in
    /// the same process) is not an error: the returned recorder simply has
    /// no handle to render from.
    pub fn install() -> Result<Self, MetricsError> {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                describe_metrics();
                tracing::info!("Prometheus metrics recorder installed");
                Ok(Self { handle: Some(handle) })
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self::default())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this recorder did not install the exporter.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_metrics() {
    // Ingestion pipeline
    describe_counter!(
        "orderflow_messages_consumed_total",
        "Messages fetched from the queue"
    );
    describe_counter!(
        "orderflow_messages_poisoned_total",
        "Messages rejected as undecodable or invalid, by reason"
    );
    describe_counter!(
        "orderflow_orders_persisted_total",
        "Orders successfully upserted"
    );
    describe_counter!(
        "orderflow_persist_failures_total",
        "Failed upsert attempts (each is retried)"
    );
    describe_counter!(
        "orderflow_fetch_failures_total",
        "Failed fetches from the queue"
    );
    describe_counter!(
        "orderflow_commit_failures_total",
        "Offset commits that failed"
    );

    // Dead letters
    describe_counter!(
        "orderflow_dead_letter_failures_total",
        "Poison messages the dead-letter sink could not store"
    );

    // Read path
    describe_counter!("orderflow_cache_hits_total", "Order reads served from cache");
    describe_counter!(
        "orderflow_cache_misses_total",
        "Order reads that fell through to the store"
    );
    describe_gauge!("orderflow_cache_entries", "Orders currently cached");
    describe_counter!(
        "orderflow_read_errors_total",
        "Order reads that failed, by kind"
    );
}

/// Ingestion pipeline metrics recorder.
pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record a fetched message.
    pub fn record_consumed() {
        counter!("orderflow_messages_consumed_total").increment(1);
    }

    /// Record a poison message.
    pub fn record_poisoned(kind: PoisonKind) {
        counter!("orderflow_messages_poisoned_total", "reason" => kind.as_str()).increment(1);
    }

    /// Record a successful upsert.
    pub fn record_persisted() {
        counter!("orderflow_orders_persisted_total").increment(1);
    }

    /// Record a failed upsert attempt.
    pub fn record_persist_failure() {
        counter!("orderflow_persist_failures_total").increment(1);
    }

    /// Record a failed fetch.
    pub fn record_fetch_failure() {
        counter!("orderflow_fetch_failures_total").increment(1);
    }

    /// Record a failed commit.
    pub fn record_commit_failure() {
        counter!("orderflow_commit_failures_total").increment(1);
    }

    /// Record a dead letter that could not be stored.
    pub fn record_dead_letter_failure() {
        counter!("orderflow_dead_letter_failures_total").increment(1);
    }
}

/// Read path metrics recorder.
pub struct ReadMetrics;

impl ReadMetrics {
    /// Record a cache hit.
    pub fn record_hit() {
        counter!("orderflow_cache_hits_total").increment(1);
    }

    /// Record a cache miss.
    pub fn record_miss() {
        counter!("orderflow_cache_misses_total").increment(1);
    }

    /// Record a failed read (`not_found` or `internal`).
    pub fn record_error(kind: &'static str) {
        counter!("orderflow_read_errors_total", "kind" => kind).increment(1);
    }
}
