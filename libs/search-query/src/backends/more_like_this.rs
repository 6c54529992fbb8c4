//! More-like-this
//!
//! Applies only when the context carries a seed document id: the request becomes a
//! `more_like_this` query liked on that document, which is itself excluded.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::Result;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MltOptions {
    /// Fields to compare; empty means the cluster's default.
    pub fields: Vec<String>,
    pub min_term_freq: u32,
    pub max_query_terms: u32,
    pub min_doc_freq: u32,
    pub max_doc_freq: Option<u32>,
}

impl Default for MltOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            min_term_freq: 2,
            max_query_terms: 25,
            min_doc_freq: 5,
            max_doc_freq: None,
        }
    }
}

impl MltOptions {
    pub fn query(&self, index: &str, id: &str) -> Query {
        let mut options = Map::new();
        options.insert("min_term_freq".into(), json!(self.min_term_freq));
        options.insert("max_query_terms".into(), json!(self.max_query_terms));
        options.insert("min_doc_freq".into(), json!(self.min_doc_freq));
        if let Some(max) = self.max_doc_freq {
            options.insert("max_doc_freq".into(), json!(max));
        }
        options.insert("include".into(), Value::Bool(false));
        Query::MoreLikeThis {
            fields: self.fields.clone(),
            like: vec![json!({ "_index": index, "_id": id })],
            options,
        }
    }
}

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let Some(id) = ctx.object_id.as_deref() else {
        return Ok(request.clone());
    };
    Ok(request.clone().with_must(view.mlt.query(&view.index, id)))
}
