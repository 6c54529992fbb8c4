//! Highlighting
//!
//! `highlight=title,summary` (repeatable) highlights allow-listed fields; fields
//! declared with `enabled = true` are always highlighted.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::SearchContext;
use crate::dsl::Highlight;
use crate::error::{QueryError, Result};
use crate::request::SearchRequest;
use crate::view::{FieldMap, ViewConfig};

pub const HIGHLIGHT_PARAM: &str = "highlight";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HighlightSpec {
    Path(String),
    Table(HighlightTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightTable {
    pub field: Option<String>,
    pub enabled: bool,
    /// `fragment_size`, `number_of_fragments`, `pre_tags`, `post_tags`, ...
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightField {
    pub name: String,
    pub document_path: String,
    pub enabled: bool,
    pub options: Map<String, Value>,
}

pub fn resolve_highlight_fields(spec: &FieldMap<HighlightSpec>) -> Result<Vec<HighlightField>> {
    spec.iter()
        .map(|(name, entry)| {
            if name.is_empty() || name.contains(',') {
                return Err(QueryError::InvalidFieldConfig(format!(
                    "highlight_fields: invalid name '{name}'"
                )));
            }
            Ok(match entry {
                HighlightSpec::Path(path) => HighlightField {
                    name: name.clone(),
                    document_path: path.clone(),
                    enabled: false,
                    options: Map::new(),
                },
                HighlightSpec::Table(table) => HighlightField {
                    name: name.clone(),
                    document_path: table.field.clone().unwrap_or_else(|| name.clone()),
                    enabled: table.enabled,
                    options: table.options.clone(),
                },
            })
        })
        .collect()
}

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let requested = ctx.params.list(HIGHLIGHT_PARAM);
    let fields: Vec<(String, Map<String, Value>)> = view
        .highlight_fields
        .iter()
        .filter(|f| f.enabled || requested.iter().any(|r| *r == f.name))
        .map(|f| (f.document_path.clone(), f.options.clone()))
        .collect();
    if fields.is_empty() {
        return Ok(request.clone());
    }
    Ok(request.clone().with_highlight(Highlight { fields }))
}
