//! Orderflow HTTP server and ingestion worker.
//!
//! Drains orders from Kafka into PostgreSQL and the in-memory cache, and
//! serves them at `GET /order/{order_uid}`.

use anyhow::Context;
use orderflow_runtime::metrics::MetricsRecorder;
use orderflow_server::{Application, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orderflow=debug,sqlx=warn,rdkafka=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Orderflow");

    let config = Config::from_env().context("loading configuration")?;
    info!(
        kafka_brokers = ?config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        dead_letter = ?config.dead_letter,
        "Configuration loaded"
    );

    let metrics = MetricsRecorder::install().context("installing metrics recorder")?;

    Application::build(config, metrics).await?.run().await
}
