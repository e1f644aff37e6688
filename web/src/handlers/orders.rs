//! Order lookup endpoint.

use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use orderflow_core::Order;

/// Return one order as JSON.
///
/// Served from the cache when possible; a miss loads from the store and
/// fills the cache.
///
/// # Endpoint
///
/// ```text
/// GET /order/{order_uid}
/// ```
///
/// # Errors
///
/// - 400 if `order_uid` is empty
/// - 404 if the order does not exist
/// - 500 if the store fails
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
    correlation_id: CorrelationId,
) -> Result<Json<Order>, AppError> {
    if order_uid.is_empty() {
        return Err(missing_uid());
    }

    let order = state.reader.get(&order_uid).await.map_err(|e| {
        tracing::debug!(%order_uid, %correlation_id, error = %e, "Order lookup failed");
        AppError::from(e)
    })?;

    Ok(Json(order))
}

/// `GET /order/` with no id.
///
/// # Errors
///
/// Always returns 400.
#[allow(clippy::unused_async)]
pub async fn missing_order_uid() -> Result<Json<Order>, AppError> {
    Err(missing_uid())
}

/// Any non-GET method on the order routes.
#[allow(clippy::unused_async)]
pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}

fn missing_uid() -> AppError {
    AppError::bad_request("order_uid is required")
}
