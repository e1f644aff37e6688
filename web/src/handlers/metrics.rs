//! Prometheus scrape endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::header, response::IntoResponse};

/// Render every recorded metric in Prometheus text format.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// Returns 503 if no Prometheus recorder was installed.
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .ok_or_else(|| AppError::unavailable("metrics recorder not installed"))?;

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
