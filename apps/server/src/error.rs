//! Error types for the search server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sieve_cluster::ClusterError;
use sieve_query::QueryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Not found.")]
    NotFound,

    #[error("Authentication credentials were not provided.")]
    Unauthorized,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Query(e) => match e {
                QueryError::InvalidCursor | QueryError::PageOutOfRange(_) => StatusCode::NOT_FOUND,
                QueryError::InvalidFieldConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Error::Cluster(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Error::Cluster(_) => StatusCode::BAD_GATEWAY,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Internal(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; internal and upstream details stay in the logs.
    fn detail(&self, status: StatusCode) -> String {
        match self {
            Error::Cluster(_) if status == StatusCode::GATEWAY_TIMEOUT => {
                "Search cluster timed out.".to_string()
            }
            Error::Cluster(_) => "Search cluster error.".to_string(),
            Error::Query(QueryError::InvalidFieldConfig(_)) | Error::Internal(_) | Error::Other(_) => {
                "Internal server error.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let mut body = json!({ "detail": self.detail(status) });
        if status == StatusCode::GATEWAY_TIMEOUT {
            body["timed_out"] = json!(true);
        }

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("ApiKey"),
            );
        }
        response
    }
}
