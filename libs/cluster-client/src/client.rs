//! HTTP search cluster client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::{ClusterError, Result};

/// Identity reported by the cluster's root endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub name: Option<String>,
    pub cluster_name: String,
    #[serde(default)]
    pub version: Option<ClusterVersion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterVersion {
    pub number: String,
    #[serde(default)]
    pub distribution: Option<String>,
}

/// The cluster operations the REST layer needs.
#[async_trait]
pub trait SearchCluster: Send + Sync {
    /// Run `body` against `index`'s `_search` endpoint and return the raw response.
    async fn search(&self, index: &str, body: &Value, timeout: Option<Duration>) -> Result<Value>;

    async fn info(&self) -> Result<ClusterInfo>;
}

#[derive(Debug, Clone)]
pub struct HttpClusterConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpClusterConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`SearchCluster`] over the cluster's REST API.
#[derive(Debug, Clone)]
pub struct HttpCluster {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl HttpCluster {
    pub fn new(config: &HttpClusterConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.url)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("sieve/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClusterError::InvalidUrl(format!("{path}: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl SearchCluster for HttpCluster {
    async fn search(&self, index: &str, body: &Value, timeout: Option<Duration>) -> Result<Value> {
        let url = self.endpoint(&format!("{index}/_search"))?;
        let request = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout.unwrap_or(self.timeout));

        let response = self.authorize(request).send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            let reason = error_reason(status, &bytes);
            tracing::warn!(index, status = status.as_u16(), %reason, "search request rejected");
            return Err(ClusterError::Upstream {
                status: status.as_u16(),
                reason,
            });
        }

        let value: Value = serde_json::from_slice(&bytes)?;
        if value.get("timed_out").and_then(Value::as_bool) == Some(true) {
            return Err(ClusterError::Timeout);
        }
        Ok(value)
    }

    async fn info(&self) -> Result<ClusterInfo> {
        let url = self.endpoint("")?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(ClusterError::Upstream {
                status: status.as_u16(),
                reason: error_reason(status, &bytes),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| ClusterError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClusterError::InvalidUrl(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn transport_error(error: reqwest::Error) -> ClusterError {
    if error.is_timeout() {
        ClusterError::Timeout
    } else {
        ClusterError::Http(error)
    }
}

/// Pull `error.reason` (or a plain `error` string) out of an error body.
fn error_reason(status: StatusCode, body: &[u8]) -> String {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let from_body = parsed.as_ref().and_then(|v| match v.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(error) => error
            .get("root_cause")
            .and_then(|causes| causes.get(0))
            .and_then(|cause| cause.get("reason"))
            .or_else(|| error.get("reason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    });
    from_body.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    })
}
