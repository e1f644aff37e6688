//! HTTP surface for Orderflow, built on Axum.
//!
//! Serves cache-aside order lookups, health and readiness probes, Prometheus
//! metrics, and the static front-end.
//!
//! # Example
//!
//! ```ignore
//! use orderflow_web::{AppState, build_router};
//!
//! let state = AppState::new(cache, store).with_metrics(recorder);
//! let app = build_router(state, Some(Path::new("web")));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8081").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
