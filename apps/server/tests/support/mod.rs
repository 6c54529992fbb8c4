#![allow(dead_code)]

pub mod cluster;
pub mod fixtures;

use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sieve::{api::create_router, AppState, Config};
use tower::ServiceExt as _;

// Re-export commonly used items
pub use cluster::*;
pub use fixtures::*;

pub const ORIGIN: &str = "http://api.test";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub cluster: Arc<MockCluster>,
}

impl TestApp {
    pub fn new() -> anyhow::Result<Self> {
        Self::new_with_config(|_| {})
    }

    pub fn new_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        Self::with_cluster(MockCluster::new(), configure)
    }

    pub fn with_cluster(
        cluster: MockCluster,
        configure: impl FnOnce(&mut Config),
    ) -> anyhow::Result<Self> {
        let mut config = test_config();
        configure(&mut config);

        let cluster = Arc::new(cluster);
        let state =
            AppState::with_cluster(config, cluster.clone()).context("initialize AppState")?;
        let router = create_router(state.clone());

        Ok(Self {
            router,
            state,
            cluster,
        })
    }

    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        self.request_with_extra_headers(method, path_and_query, body, &[])
            .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let request = Request::builder()
            .method(method)
            .uri(path_and_query)
            .header("host", "api.test")
            .header("accept", "application/json")
            .body(match body {
                Some(bytes) => Body::from(bytes),
                None => Body::empty(),
            })
            .context("build request")?;

        let mut request = request;
        for (name, value) in extra_headers {
            request.headers_mut().insert(
                name.parse::<HeaderName>().context("parse header name")?,
                value.parse::<HeaderValue>().context("parse header value")?,
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read response body")?;

        Ok((status, headers, body))
    }

    /// GET `path_and_query` and parse the body as JSON.
    pub async fn get_json(&self, path_and_query: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.get_json_with_headers(path_and_query, &[]).await
    }

    pub async fn get_json_with_headers(
        &self,
        path_and_query: &str,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _, body) = self
            .request_with_extra_headers(Method::GET, path_and_query, None, extra_headers)
            .await?;
        let json = serde_json::from_slice(&body)
            .with_context(|| format!("parse JSON body: {}", String::from_utf8_lossy(&body)))?;
        Ok((status, json))
    }
}

/// Strip the test origin from an absolute link so it can be requested again.
pub fn relative(link: &str) -> anyhow::Result<&str> {
    link.strip_prefix(ORIGIN)
        .with_context(|| format!("link {link} is not under {ORIGIN}"))
}
