//! Error types for web handlers.
//!
//! [`AppError`] bridges read-path errors and HTTP responses. Every error is
//! rendered as a JSON body `{"code": ..., "message": ...}`; server errors are
//! logged with their source but never expose it to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orderflow_runtime::ReadError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Underlying error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error. It is logged but never returned.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST")
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// Create a 405 Method Not Allowed error.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
            "METHOD_NOT_ALLOWED",
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE",
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<ReadError> for AppError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::NotFound(order_uid) => Self::not_found("Order", order_uid),
            ReadError::Internal(source) => {
                Self::internal("An internal error occurred")
                    .with_source(anyhow::Error::new(source))
            },
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use orderflow_core::StoreError;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("order_uid is required");
        assert_eq!(err.to_string(), "[BAD_REQUEST] order_uid is required");
    }

    #[test]
    fn test_not_found_from_read_error() {
        let err = AppError::from(ReadError::NotFound("a1".to_string()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "[NOT_FOUND] Order with id a1 not found");
    }

    #[test]
    fn test_internal_hides_store_detail() {
        let err = AppError::from(ReadError::Internal(StoreError::Persistence(
            "password authentication failed for user \"orders\"".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("password"));
    }

    #[test]
    fn test_internal_keeps_store_error_as_source() {
        let err = AppError::from(ReadError::Internal(StoreError::Persistence(
            "connection reset".to_string(),
        )));

        let source = std::error::Error::source(&err).expect("store error kept as source");
        assert_eq!(source.to_string(), "Persistence error: connection reset");
        assert!(source.downcast_ref::<StoreError>().is_some());
    }

    #[test]
    fn test_method_not_allowed() {
        let err = AppError::method_not_allowed();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.code(), "METHOD_NOT_ALLOWED");
    }
}
