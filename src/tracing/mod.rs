//! Request correlation and HTTP tracing.
//!
//! Every inbound request gets a [`RequestId`] (taken from `x-request-id` or
//! freshly generated). It is attached to the tracing span, to the request
//! extensions and to a task-local so error bodies can echo it back.

use axum::http::Request;
use std::{
    cell::RefCell,
    fmt,
    future::Future,
    time::{Duration, Instant},
};
use tower_http::{
    classify::{SharedClassifier, StatusInRangeAsFailures},
    trace::{DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, MakeSpan, TraceLayer},
};
use uuid::Uuid;

pub use tracing::{debug, error, info, trace, warn};

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID tracking information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    /// Accepts a caller-supplied id only if it is short printable ASCII, otherwise
    /// generates a fresh one so it can always be echoed back as a header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() && v.len() <= 128 && v.bytes().all(|b| b.is_ascii_graphic()) => {
                RequestId::new(v)
            }
            _ => RequestId::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

#[derive(Clone, Default)]
pub struct RequestSpanMaker;

impl<B> MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| {
                RequestId::from_header(
                    request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok()),
                )
            });

        tracing::info_span!(
            "http.request",
            request_id = %request_id.as_str(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

/// Configure tracing for the application with tower-http
pub fn configure_http_tracing() -> TraceLayer<
    SharedClassifier<StatusInRangeAsFailures>,
    RequestSpanMaker,
    DefaultOnRequest,
    DefaultOnResponse,
    tower_http::trace::DefaultOnBodyChunk,
    tower_http::trace::DefaultOnEos,
    DefaultOnFailure,
> {
    let classifier = SharedClassifier::new(StatusInRangeAsFailures::new(500..=599));
    TraceLayer::new(classifier)
        .make_span_with(RequestSpanMaker)
        .on_request(DefaultOnRequest::default())
        .on_response(DefaultOnResponse::default())
        .on_failure(DefaultOnFailure::default())
}

/// Runs `operation` and emits a warning when it takes longer than `threshold`.
///
/// Used around document export and SMTP delivery, which are the only calls
/// that leave the process besides the database.
pub async fn timed<F, T>(operation: &'static str, threshold: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let output = fut.await;
    let elapsed = started.elapsed();
    if elapsed > threshold {
        warn!(operation, elapsed_ms = elapsed.as_millis() as u64, "slow operation");
    } else {
        debug!(operation, elapsed_ms = elapsed.as_millis() as u64, "operation finished");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_id_is_visible_inside_scope_only() {
        assert!(current_request_id().is_none());
        let seen = scope_request_id(RequestId::new("abc"), async { current_request_id() }).await;
        assert_eq!(seen, Some(RequestId::new("abc")));
        assert!(current_request_id().is_none());
    }

    #[test]
    fn header_values_are_sanitised() {
        assert_eq!(RequestId::from_header(Some("req-1")).as_str(), "req-1");
        assert_ne!(RequestId::from_header(Some("bad id")).as_str(), "bad id");
        assert_ne!(RequestId::from_header(Some("")).as_str(), "");
        let long = "x".repeat(200);
        assert_ne!(RequestId::from_header(Some(&long)).as_str(), long);
        assert!(!RequestId::from_header(None).as_str().is_empty());
    }

    #[tokio::test]
    async fn timed_returns_inner_output() {
        let value = timed("noop", Duration::from_secs(5), async { 41 + 1 }).await;
        assert_eq!(value, 42);
    }
}
