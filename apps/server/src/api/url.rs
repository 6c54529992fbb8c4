//! URL helpers for building absolute pagination links.

use axum::http::{HeaderMap, Uri};

/// Build the public origin (`{scheme}://{host}`) using forwarding headers when present.
///
/// This is important for correct `next`/`previous` links when running behind
/// reverse proxies.
pub fn origin_from_headers(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .or_else(|| headers.get("x-forwarded-scheme"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

/// Absolute URL of the request without its query string.
pub fn request_base_url(headers: &HeaderMap, uri: &Uri) -> String {
    format!("{}{}", origin_from_headers(headers), uri.path())
}
