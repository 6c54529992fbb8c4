//! Error types for cluster-client

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Search cluster timed out")]
    Timeout,

    #[error("Search cluster returned {status}: {reason}")]
    Upstream { status: u16, reason: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cluster URL: {0}")]
    InvalidUrl(String),
}

impl ClusterError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
