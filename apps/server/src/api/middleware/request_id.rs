//! Request ids and the per-request tracing span
//!
//! Every request runs inside an `http_request` span. The view handlers fill in
//! its `view` and `action` fields once routing has resolved them.
//!
//! Response headers:
//! - `x-request-id`: always a fresh server id
//! - `x-trace-id`: the OpenTelemetry trace, when one is being recorded
//! - `x-correlation-id`: the caller's own `x-request-id`, echoed back

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::time::Instant;
use tracing::{field::Empty, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::metrics::sanitize_path;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");
const CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Longest caller id echoed back.
const MAX_CORRELATION_ID_LEN: usize = 128;

pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let correlation = correlation_id(req.headers(), &request_id);
    let method = req.method().clone();
    let route = sanitize_path(req.uri().path());

    let span = tracing::info_span!(
        "http_request",
        otel.kind = "server",
        http.method = %method,
        http.route = %route,
        http.response.status_code = Empty,
        view = Empty,
        action = Empty,
        request_id = %request_id,
        correlation_id = Empty,
    );
    if let Some(value) = correlation.as_ref().and_then(|v| v.to_str().ok()) {
        span.record("correlation_id", value);
    }

    let start = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    let status = response.status();
    span.record("http.response.status_code", status.as_u16());

    span.in_scope(|| {
        let elapsed_ms = start.elapsed().as_millis();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), elapsed_ms, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), elapsed_ms, "Request completed");
        }
    });

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID, value);
    }
    if let Some(trace_id) = trace_id(&span) {
        headers.insert(TRACE_ID, trace_id);
    }
    if let Some(value) = correlation {
        headers.insert(CORRELATION_ID, value);
    }
    response
}

/// The caller's `x-request-id`, when it is printable, bounded and not ours.
fn correlation_id(headers: &HeaderMap, request_id: &str) -> Option<HeaderValue> {
    let value = headers.get(&REQUEST_ID)?;
    let text = value.to_str().ok()?.trim();
    if text.is_empty() || text.len() > MAX_CORRELATION_ID_LEN || text == request_id {
        return None;
    }
    HeaderValue::from_str(text).ok()
}

/// Trace id of the span's OpenTelemetry context; `None` when nothing is exported.
fn trace_id(span: &Span) -> Option<HeaderValue> {
    let context = span.context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();
    if !span_context.is_valid() {
        return None;
    }
    HeaderValue::from_str(&span_context.trace_id().to_string()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_request_id(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn caller_id_is_echoed_trimmed() {
        let echoed = correlation_id(&with_request_id(" req-123 "), "server-id").unwrap();
        assert_eq!(echoed, "req-123");
    }

    #[test]
    fn unusable_caller_ids_are_dropped() {
        assert!(correlation_id(&HeaderMap::new(), "server-id").is_none());
        assert!(correlation_id(&with_request_id("  "), "server-id").is_none());
        assert!(correlation_id(&with_request_id("server-id"), "server-id").is_none());
        let long = "x".repeat(MAX_CORRELATION_ID_LEN + 1);
        assert!(correlation_id(&with_request_id(&long), "server-id").is_none());
    }

    #[test]
    fn no_trace_id_without_an_exporter() {
        assert!(trace_id(&Span::none()).is_none());
    }
}
