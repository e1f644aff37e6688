//! HTTP request handlers.

pub mod health;
pub mod metrics;
pub mod orders;

pub use health::{health_check, readiness_check};
pub use metrics::render_metrics;
pub use orders::{get_order, method_not_allowed, missing_order_uid};
