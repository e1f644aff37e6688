//! Route table.

use crate::handlers::{
    get_order, health_check, method_not_allowed, missing_order_uid, readiness_check,
    render_metrics,
};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{MethodFilter, get, on},
};
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the HTTP router.
///
/// | Route               | Handler                                  |
/// |---------------------|------------------------------------------|
/// | `GET /order/{uid}`  | cache-aside order lookup                 |
/// | `GET /order/`       | 400, the id is missing                   |
/// | `GET /order`        | 400, the id is missing                   |
/// | `GET /health`       | liveness                                 |
/// | `GET /ready`        | readiness (database ping)                |
/// | `GET /metrics`      | Prometheus text                          |
/// | anything else       | static files from `static_dir`, if given |
///
/// Any method other than GET on the order routes, HEAD included, answers 405.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route(
            "/order/:order_uid",
            on(MethodFilter::GET, get_order).fallback(method_not_allowed),
        )
        .route(
            "/order/",
            on(MethodFilter::GET, missing_order_uid).fallback(method_not_allowed),
        )
        .route(
            "/order",
            on(MethodFilter::GET, missing_order_uid).fallback(method_not_allowed),
        )
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(render_metrics));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
