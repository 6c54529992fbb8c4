//! Metrics collection for the search server
//!
//! This module defines and manages Prometheus metrics for HTTP traffic and the
//! searches sent to the cluster.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};

/// List-level actions whose path segment is not a document id.
const COLLECTION_ACTIONS: &[&str] = &["count", "suggest", "functional_suggest"];

lazy_static! {
    // HTTP Request Metrics

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sieve_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "sieve_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    /// In-flight HTTP requests
    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "sieve_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    // Search Metrics

    /// Searches sent to the cluster by view, action and outcome
    pub static ref SEARCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sieve_search_total",
        "Total number of searches sent to the cluster",
        &["view", "action", "status"]
    )
    .expect("Failed to register SEARCH_TOTAL");

    /// Cluster round-trip time per search
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "sieve_search_duration_seconds",
        "Search duration in seconds, including the cluster round trip",
        &["view", "action"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register SEARCH_DURATION_SECONDS");

    /// Total hits reported per search
    pub static ref SEARCH_HITS: HistogramVec = register_histogram_vec!(
        "sieve_search_hits",
        "Total number of hits matched by a search",
        &["view"],
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
    )
    .expect("Failed to register SEARCH_HITS");
}

/// Helper to sanitize path for metrics labels (remove IDs, limit cardinality)
pub fn sanitize_path(path: &str) -> String {
    let trailing = path.len() > 1 && path.ends_with('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut out: Vec<&str> = match segments.as_slice() {
        [] => return "/".to_string(),
        ["health", ..] | ["metrics", ..] | [_] => segments.clone(),
        [view, action] if COLLECTION_ACTIONS.contains(action) => vec![*view, *action],
        // /view/:id and /view/:id/more_like_this
        [view, _id] => vec![*view, "{id}"],
        [view, _id, "more_like_this"] => vec![*view, "{id}", "more_like_this"],
        // Anything deeper is a 404; keep the view only
        [view, ..] => vec![*view, "{other}"],
    };
    out.insert(0, "");
    let mut sanitized = out.join("/");
    if trailing {
        sanitized.push('/');
    }
    sanitized
}

/// Coarse outcome label for a status code.
pub fn status_class(status: u16) -> &'static str {
    match status {
        200..=399 => "success",
        400..=499 => "client_error",
        _ => "server_error",
    }
}
