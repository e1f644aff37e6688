//! The ingestion pipeline: queue → store → cache → commit.
//!
//! One long-running task drains the [`MessageSource`] one message at a time:
//!
//! 1. **Fetch** the next message. A fetch error is logged and retried after
//!    the fetch backoff. Nothing is committed.
//! 2. **Decode** the payload. Undecodable payloads are poison: they go to the
//!    [`DeadLetterSink`] and are committed so they never block the partition.
//! 3. **Validate** the order. Invalid orders are handled like undecodable ones.
//! 4. **Persist** with an idempotent upsert. On failure the pipeline keeps the
//!    message and retries the upsert after the persist backoff until it
//!    succeeds or shutdown is requested. The message is never committed
//!    before it is durable.
//! 5. **Cache** the stored order (unconditional set).
//! 6. **Commit** the message. A failed commit is logged and counted; the
//!    message may be redelivered, which the idempotent upsert absorbs.
//!
//! Shutdown is observed while waiting for a message and between retries. The
//! pipeline never commits a message it did not finish persisting.

use crate::cache::InMemoryOrderCache;
use crate::metrics::PipelineMetrics;
use crate::retry::RetryPolicy;
use orderflow_core::environment::{Clock, SystemClock};
use orderflow_core::{
    DeadLetter, DeadLetterSink, DiscardDeadLetters, MessageSource, Order, OrderStore, PoisonKind,
    QueueError, QueueMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Backoff settings for the pipeline's two retry loops.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Delay schedule after a failed fetch.
    pub fetch_retry: RetryPolicy,
    /// Delay schedule after a failed upsert.
    pub persist_retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_retry: RetryPolicy::fixed(Duration::from_millis(300)),
            persist_retry: RetryPolicy::fixed(Duration::from_millis(500)),
        }
    }
}

/// Counters reported when the pipeline stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Messages fetched.
    pub consumed: u64,
    /// Orders upserted and cached.
    pub persisted: u64,
    /// Messages rejected as poison.
    pub poisoned: u64,
}

enum Flow {
    Continue,
    Stop,
}

/// Consumes orders from a queue and makes them durable and cached.
///
/// # Example
///
/// ```rust,no_run
/// use orderflow_runtime::{InMemoryOrderCache, IngestionPipeline};
/// use orderflow_core::{MessageSource, OrderStore};
/// use std::sync::Arc;
/// use tokio::sync::broadcast;
///
/// # async fn example(source: Arc<dyn MessageSource>, store: Arc<dyn OrderStore>) {
/// let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
/// let cache = Arc::new(InMemoryOrderCache::new());
///
/// let handle = IngestionPipeline::new(source, store, cache, shutdown_rx).spawn();
///
/// // ... later
/// let _ = shutdown_tx.send(());
/// let stats = handle.await;
/// # }
/// ```
pub struct IngestionPipeline {
    source: Arc<dyn MessageSource>,
    store: Arc<dyn OrderStore>,
    cache: Arc<InMemoryOrderCache>,
    dead_letters: Arc<dyn DeadLetterSink>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    shutdown: broadcast::Receiver<()>,
    stats: PipelineStats,
}

impl IngestionPipeline {
    /// Create a pipeline with default backoff, the system clock and a
    /// dead-letter sink that discards.
    ///
    /// The pipeline stops when `shutdown` receives a value or its sender is
    /// dropped.
    #[must_use]
    pub fn new(
        source: Arc<dyn MessageSource>,
        store: Arc<dyn OrderStore>,
        cache: Arc<InMemoryOrderCache>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            source,
            store,
            cache,
            dead_letters: Arc::new(DiscardDeadLetters),
            clock: Arc::new(SystemClock),
            config: PipelineConfig::default(),
            shutdown,
            stats: PipelineStats::default(),
        }
    }

    /// Send poison messages to `sink`.
    #[must_use]
    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = sink;
        self
    }

    /// Timestamp dead letters with `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the retry backoff.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the pipeline on a new task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<PipelineStats> {
        tokio::spawn(self.run())
    }

    /// Drain the source until shutdown or until the source reports
    /// [`QueueError::Cancelled`].
    pub async fn run(mut self) -> PipelineStats {
        tracing::info!("Ingestion pipeline started");
        let mut fetch_failures: u32 = 0;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    tracing::info!("Shutdown requested, ingestion pipeline stopping");
                    break;
                }
                result = self.source.fetch() => result,
            };

            let message = match fetched {
                Ok(message) => {
                    fetch_failures = 0;
                    message
                },
                Err(QueueError::Cancelled) => {
                    tracing::info!("Message source closed, ingestion pipeline stopping");
                    break;
                },
                Err(e) => {
                    PipelineMetrics::record_fetch_failure();
                    let delay = self.config.fetch_retry.delay_for_attempt(fetch_failures);
                    fetch_failures = fetch_failures.saturating_add(1);
                    tracing::warn!(
                        error = %e,
                        attempt = fetch_failures,
                        delay_ms = delay.as_millis(),
                        "Fetch failed, retrying"
                    );
                    if self.sleep_or_shutdown(delay).await {
                        break;
                    }
                    continue;
                },
            };

            self.stats.consumed += 1;
            PipelineMetrics::record_consumed();

            if matches!(self.process(&message).await, Flow::Stop) {
                break;
            }
        }

        tracing::info!(
            consumed = self.stats.consumed,
            persisted = self.stats.persisted,
            poisoned = self.stats.poisoned,
            "Ingestion pipeline stopped"
        );
        self.stats
    }

    async fn process(&mut self, message: &QueueMessage) -> Flow {
        let order = match Order::from_json(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                self.reject(message, PoisonKind::Decode, e.to_string()).await;
                return Flow::Continue;
            },
        };

        if let Err(e) = order.validate() {
            self.reject(message, PoisonKind::Validation, e.to_string()).await;
            return Flow::Continue;
        }

        let Some(stored) = self.persist(&order, message).await else {
            return Flow::Stop;
        };

        self.cache.set(stored.order_uid.clone(), stored);
        self.commit(message).await;
        self.stats.persisted += 1;

        tracing::debug!(order_uid = %order.order_uid, %message, "Order ingested");
        Flow::Continue
    }

    /// Upsert until it succeeds. Returns `None` if shutdown interrupted the
    /// retries; the message then stays uncommitted.
    async fn persist(&mut self, order: &Order, message: &QueueMessage) -> Option<Order> {
        let mut attempt: u32 = 0;

        loop {
            match self.store.upsert(order).await {
                Ok(stored) => {
                    PipelineMetrics::record_persisted();
                    if attempt > 0 {
                        tracing::info!(
                            order_uid = %order.order_uid,
                            attempts = attempt + 1,
                            "Order persisted after retry"
                        );
                    }
                    return Some(stored);
                },
                Err(e) => {
                    PipelineMetrics::record_persist_failure();
                    let delay = self.config.persist_retry.delay_for_attempt(attempt);
                    attempt = attempt.saturating_add(1);
                    tracing::warn!(
                        order_uid = %order.order_uid,
                        %message,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Upsert failed, retrying"
                    );
                    if self.sleep_or_shutdown(delay).await {
                        tracing::warn!(
                            order_uid = %order.order_uid,
                            %message,
                            "Shutdown during upsert retry, message left uncommitted"
                        );
                        return None;
                    }
                },
            }
        }
    }

    async fn reject(&mut self, message: &QueueMessage, kind: PoisonKind, reason: String) {
        self.stats.poisoned += 1;
        PipelineMetrics::record_poisoned(kind);
        tracing::warn!(%message, kind = kind.as_str(), %reason, "Poison message");

        let letter = DeadLetter {
            message: message.clone(),
            kind,
            reason,
            failed_at: self.clock.now(),
        };
        if let Err(e) = self.dead_letters.record(letter).await {
            PipelineMetrics::record_dead_letter_failure();
            tracing::error!(%message, error = %e, "Failed to record dead letter");
        }

        self.commit(message).await;
    }

    async fn commit(&self, message: &QueueMessage) {
        if let Err(e) = self.source.commit(message).await {
            PipelineMetrics::record_commit_failure();
            tracing::warn!(%message, error = %e, "Commit failed, message may be redelivered");
        }
    }

    /// Wait for `delay`. Returns `true` if shutdown was requested meanwhile.
    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => {
                tracing::info!("Shutdown requested during retry backoff");
                true
            }
            () = tokio::time::sleep(delay) => false,
        }
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
