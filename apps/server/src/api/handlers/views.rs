//! View handlers
//!
//! Handles the per-view endpoints:
//! - List (GET /{view}/)
//! - Count (GET /{view}/count/)
//! - Suggest (GET /{view}/suggest/)
//! - Functional suggest (GET /{view}/functional_suggest/)
//! - Retrieve (GET /{view}/{id}/)
//! - More like this (GET /{view}/{id}/more_like_this/)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
    Json,
};
use serde_json::Value;
use sieve_query::{Action, QueryParams};
use tracing::Span;

use crate::{
    api::url as api_url,
    state::{AppState, ViewState},
    views::ViewRequest,
    Error, Result,
};

/// Look up the view and check the caller may use it.
fn authorize_view(
    state: &AppState,
    name: &str,
    action: Action,
    headers: &HeaderMap,
) -> Result<Arc<ViewState>> {
    let view = state.view(name).ok_or(Error::NotFound)?;
    let span = Span::current();
    span.record("view", name);
    span.record("action", action.as_str());
    state.auth.authorize(view.permission, headers)?;
    Ok(view)
}

fn params(uri: &Uri) -> QueryParams {
    QueryParams::from_query(uri.query().unwrap_or(""))
}

pub async fn list(
    State(state): State<AppState>,
    Path(view): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>> {
    let view = authorize_view(&state, &view, Action::List, &headers)?;
    let base_url = api_url::request_base_url(&headers, &uri);
    let body = ViewRequest::new(&state, &view, params(&uri), base_url)
        .list()
        .await?;
    Ok(Json(body))
}

pub async fn count(
    State(state): State<AppState>,
    Path(view): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>> {
    let view = authorize_view(&state, &view, Action::Count, &headers)?;
    let base_url = api_url::request_base_url(&headers, &uri);
    let body = ViewRequest::new(&state, &view, params(&uri), base_url)
        .count()
        .await?;
    Ok(Json(body))
}

pub async fn suggest(
    State(state): State<AppState>,
    Path(view): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>> {
    let view = authorize_view(&state, &view, Action::Suggest, &headers)?;
    let base_url = api_url::request_base_url(&headers, &uri);
    let body = ViewRequest::new(&state, &view, params(&uri), base_url)
        .suggest()
        .await?;
    Ok(Json(body))
}

pub async fn functional_suggest(
    State(state): State<AppState>,
    Path(view): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>> {
    let view = authorize_view(&state, &view, Action::FunctionalSuggest, &headers)?;
    let base_url = api_url::request_base_url(&headers, &uri);
    let body = ViewRequest::new(&state, &view, params(&uri), base_url)
        .functional_suggest()
        .await?;
    Ok(Json(body))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path((view, id)): Path<(String, String)>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>> {
    let view = authorize_view(&state, &view, Action::Retrieve, &headers)?;
    let base_url = api_url::request_base_url(&headers, &uri);
    let body = ViewRequest::new(&state, &view, params(&uri), base_url)
        .retrieve(&id)
        .await?;
    Ok(Json(body))
}

pub async fn more_like_this(
    State(state): State<AppState>,
    Path((view, id)): Path<(String, String)>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>> {
    let view = authorize_view(&state, &view, Action::MoreLikeThis, &headers)?;
    let base_url = api_url::request_base_url(&headers, &uri);
    let body = ViewRequest::new(&state, &view, params(&uri), base_url)
        .more_like_this(&id)
        .await?;
    Ok(Json(body))
}
