//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Whether the service can serve reads.
    pub ready: bool,
    /// Whether the database answered the ping.
    pub database: bool,
    /// Orders currently cached.
    pub cached_orders: usize,
}

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check: pings the database within the configured timeout.
///
/// # Status Codes
///
/// - 200 OK: the database answered
/// - 503 Service Unavailable: the ping failed or timed out
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let ping = tokio::time::timeout(state.ready_timeout, state.reader.store().ping()).await;

    let database = match ping {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness ping failed");
            false
        },
        Err(_) => {
            tracing::warn!(timeout_ms = state.ready_timeout.as_millis(), "Readiness ping timed out");
            false
        },
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
            cached_orders: state.reader.cache().len(),
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use orderflow_core::OrderStore;
    use orderflow_runtime::InMemoryOrderCache;
    use orderflow_testing::InMemoryOrderStore;
    use std::sync::Arc;

    fn state(store: &Arc<InMemoryOrderStore>) -> AppState {
        AppState::new(
            Arc::new(InMemoryOrderCache::new()),
            Arc::clone(store) as Arc<dyn OrderStore>,
        )
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ready_when_database_answers() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (status, Json(body)) = readiness_check(State(state(&store))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.ready && body.database);
        assert_eq!(body.cached_orders, 0);
    }

    #[tokio::test]
    async fn test_not_ready_when_database_fails() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.fail_gets(true);
        let (status, Json(body)) = readiness_check(State(state(&store))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.ready);
    }
}
