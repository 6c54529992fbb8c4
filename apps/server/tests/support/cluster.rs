use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sieve_cluster::{ClusterError, ClusterInfo, ClusterVersion, Result, SearchCluster};

use super::fixtures::search_response;

/// What the mock answers to the next search.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Timeout,
    Upstream(u16),
}

/// In-memory cluster: records every search and replays queued replies in order.
///
/// An empty queue answers with zero hits.
#[derive(Default)]
pub struct MockCluster {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(String, Value)>>,
    unavailable: bool,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn reply(&self, body: Value) {
        self.push(Reply::Json(body));
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// `(index, body)` of every search sent so far.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Value {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|(_, body)| body.clone())
            .expect("no search was sent")
    }
}

#[async_trait]
impl SearchCluster for MockCluster {
    async fn search(&self, index: &str, body: &Value, _timeout: Option<Duration>) -> Result<Value> {
        self.requests
            .lock()
            .unwrap()
            .push((index.to_string(), body.clone()));
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Timeout) => Err(ClusterError::Timeout),
            Some(Reply::Upstream(status)) => Err(ClusterError::Upstream {
                status,
                reason: "mock failure".to_string(),
            }),
            None => Ok(search_response(0, Vec::new())),
        }
    }

    async fn info(&self) -> Result<ClusterInfo> {
        if self.unavailable {
            return Err(ClusterError::Upstream {
                status: 503,
                reason: "master not discovered".to_string(),
            });
        }
        Ok(ClusterInfo {
            name: Some("node-1".to_string()),
            cluster_name: "test-cluster".to_string(),
            version: Some(ClusterVersion {
                number: "8.11.0".to_string(),
                distribution: None,
            }),
        })
    }
}
