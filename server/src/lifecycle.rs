//! Application lifecycle management and graceful shutdown.
//!
//! [`Application::build`] performs every fallible startup step:
//!
//! 1. Connect to `PostgreSQL` (and apply migrations when enabled)
//! 2. Warm the cache from the most recent orders
//! 3. Create the queue consumer and the dead-letter sink
//! 4. Bind the HTTP listener
//!
//! [`Application::run`] then spawns the ingestion pipeline and serves HTTP
//! until Ctrl+C or SIGTERM. On the signal:
//!
//! 1. HTTP server stops accepting new connections
//! 2. Shutdown signal broadcast to the pipeline
//! 3. Wait for the pipeline to return (`SHUTDOWN_TIMEOUT`)
//! 4. Close the connection pool

use crate::config::{Config, DeadLetterMode};
use anyhow::Context;
use orderflow_core::{DeadLetterSink, DiscardDeadLetters, MessageSource, OrderStore};
use orderflow_postgres::{DeadLetterQueue, PostgresOrderStore};
use orderflow_redpanda::{RedpandaDeadLetterSink, RedpandaOrderSource};
use orderflow_runtime::metrics::MetricsRecorder;
use orderflow_runtime::{IngestionPipeline, InMemoryOrderCache, PipelineStats, warm_cache};
use orderflow_web::{AppState, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A fully wired service, ready to run.
pub struct Application {
    /// TCP listener for HTTP server
    listener: tokio::net::TcpListener,

    /// Axum router with all HTTP routes
    app: axum::Router,

    /// Ingestion pipeline, spawned by `run`
    pipeline: IngestionPipeline,

    /// Kept to close the pool after the pipeline stops
    store: Arc<PostgresOrderStore>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    /// How long to wait for the pipeline after the signal
    shutdown_timeout: Duration,
}

impl Application {
    /// Connect every dependency and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable, a migration fails,
    /// the queue consumer or dead-letter producer cannot be created, or the
    /// address cannot be bound. A failed cache warm-up is logged, not fatal.
    pub async fn build(config: Config, metrics: MetricsRecorder) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");
        let store = Arc::new(
            PostgresOrderStore::connect(&config.database.url, &config.database.pool_settings())
                .await
                .context("connecting to PostgreSQL")?,
        );
        if config.database.run_migrations {
            store.migrate().await.context("applying migrations")?;
            info!("Migrations applied");
        }

        let cache = Arc::new(InMemoryOrderCache::new());
        match warm_cache(store.as_ref(), &cache, config.cache_warmup_limit).await {
            Ok(loaded) => info!(loaded, "Cache warmed"),
            Err(e) => warn!(error = %e, "Cache warm-up failed, starting cold"),
        }

        info!(
            brokers = ?config.kafka.brokers,
            topic = %config.kafka.topic,
            "Connecting to message queue..."
        );
        let source: Arc<dyn MessageSource> = Arc::new(
            RedpandaOrderSource::builder()
                .brokers(&config.kafka.brokers)
                .topic(&config.kafka.topic)
                .group_id(&config.kafka.group_id)
                .auto_offset_reset(&config.kafka.auto_offset_reset)
                .build()
                .context("creating queue consumer")?,
        );
        let dead_letters = dead_letter_sink(&config, &store)?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let order_store: Arc<dyn OrderStore> = store.clone();
        let pipeline = IngestionPipeline::new(
            source,
            Arc::clone(&order_store),
            Arc::clone(&cache),
            shutdown_rx,
        )
        .with_dead_letters(dead_letters)
        .with_config(config.pipeline.clone());

        let static_dir = config.server.static_dir.as_path();
        let static_dir = static_dir.is_dir().then_some(static_dir);
        if static_dir.is_none() {
            warn!(
                dir = %config.server.static_dir.display(),
                "Static directory not found, serving API only"
            );
        }
        let state = AppState::new(cache, order_store).with_metrics(metrics);
        let app = build_router(state, static_dir);

        let address = config.server.bind_address()?;
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .with_context(|| format!("binding {address}"))?;

        Ok(Self {
            listener,
            app,
            pipeline,
            store,
            shutdown_tx,
            shutdown_timeout: config.server.shutdown_timeout,
        })
    }

    /// Run until a shutdown signal is received, then stop the pipeline and
    /// close the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let pipeline = self.pipeline.spawn();

        info!(
            address = %self.listener.local_addr().context("reading bound address")?,
            "HTTP server listening for requests"
        );
        let served = axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        info!("HTTP server stopped, initiating graceful shutdown...");

        // Send shutdown signal to the pipeline
        let _ = self.shutdown_tx.send(());
        Self::await_pipeline(pipeline, self.shutdown_timeout).await;

        self.store.close().await;
        info!("Graceful shutdown complete");

        served.context("HTTP server failed")
    }

    async fn await_pipeline(handle: JoinHandle<PipelineStats>, timeout: Duration) {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(stats)) => info!(
                consumed = stats.consumed,
                persisted = stats.persisted,
                poisoned = stats.poisoned,
                "Pipeline stopped gracefully"
            ),
            Ok(Err(e)) => warn!(error = %e, "Pipeline task failed"),
            Err(_) => warn!(timeout = ?timeout, "Pipeline shutdown timed out"),
        }
    }
}

fn dead_letter_sink(
    config: &Config,
    store: &PostgresOrderStore,
) -> anyhow::Result<Arc<dyn DeadLetterSink>> {
    let sink: Arc<dyn DeadLetterSink> = match &config.dead_letter {
        DeadLetterMode::Postgres => Arc::new(DeadLetterQueue::new(store.pool().clone())),
        DeadLetterMode::Topic(topic) => Arc::new(
            RedpandaDeadLetterSink::new(&config.kafka.brokers, topic.as_str())
                .context("creating dead-letter producer")?,
        ),
        DeadLetterMode::Discard => Arc::new(DiscardDeadLetters),
    };
    info!(mode = ?config.dead_letter, "Dead-letter sink configured");
    Ok(sink)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn config(pairs: &[(&str, &str)]) -> Config {
        Config::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        })
        .unwrap()
    }

    fn lazy_store() -> PostgresOrderStore {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://orders@127.0.0.1:1/orders")
            .unwrap();
        PostgresOrderStore::from_pool(pool)
    }

    #[tokio::test]
    async fn every_dead_letter_mode_builds_a_sink() {
        let store = lazy_store();
        for mode in ["postgres", "none", "topic"] {
            let config = config(&[("DATABASE_URL", "postgres://x"), ("DEAD_LETTER", mode)]);
            assert!(dead_letter_sink(&config, &store).is_ok(), "{mode}");
        }
    }

    #[tokio::test]
    async fn unreachable_database_fails_the_build() {
        let config = config(&[
            ("DATABASE_URL", "postgres://orders@127.0.0.1:1/orders"),
            ("DATABASE_CONNECT_TIMEOUT", "1"),
        ]);

        let result = Application::build(config, MetricsRecorder::default()).await;

        assert!(result.is_err());
    }
}
