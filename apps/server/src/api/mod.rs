//! API layer - routes, handlers, and middleware

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod url;

use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Get request body size limit from config
    let max_body_size = state.config.server.max_request_body_size;
    let cors_origins = state.config.server.cors_origins.clone();
    let api_key_header = state.auth.header().clone();

    Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/health/cluster", get(cluster_health))
        // Root endpoint
        .route("/", get(root))
        // Favicon handler (returns 204 to prevent 404 logs)
        .route("/favicon.ico", get(favicon))
        // Prometheus scrape endpoint
        .route("/metrics", get(handlers::metrics_handler))
        // Registered views
        .merge(routes::views::view_routes())
        // Add middleware (applied in reverse order)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
        .layer(middleware::compression())
        .layer(middleware::cors(&cors_origins, &api_key_header))
        // Limit request body size
        .layer(DefaultBodyLimit::max(max_body_size))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "sieve"
    }))
}

async fn cluster_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.cluster.info().await {
        Ok(info) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "cluster_name": info.cluster_name,
                "version": info.version.map(|v| v.number),
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Search cluster health check failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "status": "unavailable",
                    "detail": "Search cluster error."
                })),
            )
        }
    }
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let views: Vec<String> = state.views.names().map(|name| format!("/{name}/")).collect();
    (
        StatusCode::OK,
        Json(json!({
            "server": "sieve",
            "version": env!("CARGO_PKG_VERSION"),
            "views": views,
            "status": "running"
        })),
    )
}

async fn favicon() -> impl IntoResponse {
    // Return 204 No Content to indicate no favicon is available
    // This prevents 404 errors from cluttering logs
    StatusCode::NO_CONTENT
}
