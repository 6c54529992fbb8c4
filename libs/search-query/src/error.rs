//! Error types for query construction

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors raised while resolving view configuration or building a search request.
///
/// Everything except [`QueryError::InvalidFieldConfig`] is caused by the incoming
/// request and carries a message that is safe to show to API clients.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Invalid field configuration: {0}")]
    InvalidFieldConfig(String),

    #[error("Unknown lookup '{lookup}' for field '{field}'")]
    UnknownLookup { field: String, lookup: String },

    #[error("Lookup '{lookup}' is not allowed for field '{field}'")]
    DisallowedLookup { field: String, lookup: String },

    #[error("Invalid value for '{param}': {reason}")]
    InvalidValue { param: String, reason: String },

    #[error("Invalid geo value for '{param}': {reason}")]
    BadGeoValue { param: String, reason: String },

    #[error("Invalid cursor")]
    InvalidCursor,

    #[error("Invalid page: {0}")]
    PageOutOfRange(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No suggester parameters given; expected one of: {0}")]
    SuggesterRequired(String),
}

impl QueryError {
    pub(crate) fn invalid_value(param: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_geo(param: &str, reason: impl Into<String>) -> Self {
        Self::BadGeoValue {
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the request rather than the view configuration.
    pub fn is_request_error(&self) -> bool {
        !matches!(self, Self::InvalidFieldConfig(_))
    }
}
