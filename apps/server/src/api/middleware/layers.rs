//! Layer factories for middleware

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
};

/// Response headers cross-origin callers may read.
const EXPOSED_HEADERS: [&str; 3] = ["x-request-id", "x-trace-id", "x-correlation-id"];

/// CORS for the read-only view API.
///
/// No CORS headers are emitted unless at least one valid origin is configured.
pub fn cors(origins: &[String], api_key_header: &HeaderName) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::ACCEPT, api_key_header.clone()])
        .expose_headers(EXPOSED_HEADERS.map(HeaderName::from_static))
}

/// Compression middleware
pub fn compression() -> CompressionLayer {
    CompressionLayer::new()
}
