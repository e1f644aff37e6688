//! Correlation ID middleware.
//!
//! Every request gets a correlation ID: the caller's `X-Correlation-ID` when it
//! is usable, a fresh UUID v4 otherwise. The ID is stored in the request
//! extensions, recorded on the request's tracing span, and echoed back in the
//! response header.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use orderflow_web::middleware::correlation_id_layer;
//!
//! let app = Router::new()
//!     .route("/order/:order_uid", get(get_order))
//!     .layer(correlation_id_layer());
//! ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{HeaderValue, request::Parts},
    response::Response,
};
use std::convert::Infallible;
use std::fmt;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

const MAX_CORRELATION_ID_LEN: usize = 128;

/// Request correlation ID.
///
/// Usable as an extractor in handlers. Without the middleware installed it
/// falls back to reading the header, or generates a new ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// A fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied ID if it is non-empty, at most 128 bytes,
    /// and visible ASCII only.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let usable = !value.is_empty()
            && value.len() <= MAX_CORRELATION_ID_LEN
            && value.bytes().all(|b| b.is_ascii_graphic());
        usable.then(|| Self(value.to_string()))
    }

    /// Take the ID from request headers, or generate one.
    #[must_use]
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse)
            .unwrap_or_else(Self::generate)
    }

    /// The ID as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_else(|| Self::from_headers(&parts.headers)))
    }
}

/// Create a layer that adds correlation ID tracking to all requests.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = CorrelationId::from_headers(req.headers());
        req.extensions_mut().insert(correlation_id.clone());

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(correlation_id.as_str()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/test", get(|id: CorrelationId| async move { id.to_string() }))
            .layer(correlation_id_layer())
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parse_rejects_unusable_values() {
        assert!(CorrelationId::parse("").is_none());
        assert!(CorrelationId::parse("   ").is_none());
        assert!(CorrelationId::parse("has space").is_none());
        assert!(CorrelationId::parse(&"x".repeat(129)).is_none());
        assert_eq!(
            CorrelationId::parse("req-42").map(|id| id.to_string()),
            Some("req-42".to_string())
        );
    }

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();

        let header = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&header).is_ok());
        // The handler saw the same ID the client got back.
        assert_eq!(body_string(response).await, header);
    }

    #[tokio::test]
    async fn test_correlation_id_preserved_from_request() {
        let request = Request::builder()
            .uri("/test")
            .header(CORRELATION_ID_HEADER, "checkout-7f3a")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        let response_id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap();
        assert_eq!(response_id, "checkout-7f3a");
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_generates_id() {
        let app = Router::new().route("/test", get(|id: CorrelationId| async move { id.to_string() }));
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert!(Uuid::parse_str(&body_string(response).await).is_ok());
    }
}
