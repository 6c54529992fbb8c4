//! Per-request context handed to every backend.

use crate::params::QueryParams;

/// View action being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Retrieve,
    Count,
    Suggest,
    FunctionalSuggest,
    MoreLikeThis,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Retrieve => "retrieve",
            Self::Count => "count",
            Self::Suggest => "suggest",
            Self::FunctionalSuggest => "functional_suggest",
            Self::MoreLikeThis => "more_like_this",
        }
    }
}

/// What a backend may read about the current request.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub action: Action,
    pub params: QueryParams,
    /// Seed document id for more-like-this.
    pub object_id: Option<String>,
}

impl SearchContext {
    pub fn new(action: Action, params: QueryParams) -> Self {
        Self {
            action,
            params,
            object_id: None,
        }
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }
}
