//! Compound full-text search
//!
//! `search=<text>` runs a `multi_match` over the view's search fields (and a
//! `nested` multi-match per declared nested path). `search=<field>:<text>` and
//! `search_<field>=<text>` restrict to one field. `query=[<f1>,<f2>:]<text>` runs a
//! `simple_query_string`. Every clause lands in `must`, so search contributes scoring.

use serde::Deserialize;
use serde_json::{json, Map};

use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::{QueryError, Result};
use crate::fields::{parse_search_field, SearchField};
use crate::request::SearchRequest;
use crate::view::{FieldMap, ViewConfig};

pub const SEARCH_PARAM: &str = "search";
pub const QUERY_PARAM: &str = "query";
pub const FIELD_SEARCH_PREFIX: &str = "search_";

/// `search_fields` either as a list of `name[^boost]` or as a table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SearchFieldsSpec {
    List(Vec<String>),
    Map(FieldMap<SearchFieldEntry>),
}

impl Default for SearchFieldsSpec {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SearchFieldEntry {
    Path(String),
    Table(SearchFieldTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchFieldTable {
    pub field: Option<String>,
    pub boost: Option<f64>,
}

/// Fields searched inside one nested object.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedSearch {
    pub path: String,
    pub fields: Vec<String>,
}

pub fn resolve_search_fields(
    spec: &SearchFieldsSpec,
    nested: &FieldMap<Vec<String>>,
) -> Result<(Vec<SearchField>, Vec<NestedSearch>)> {
    let fields = match spec {
        SearchFieldsSpec::List(raw) => raw
            .iter()
            .map(|r| parse_search_field(r))
            .collect::<Result<Vec<_>>>()?,
        SearchFieldsSpec::Map(map) => map
            .iter()
            .map(|(name, entry)| match entry {
                SearchFieldEntry::Path(path) => SearchField {
                    name: name.clone(),
                    document_path: path.clone(),
                    boost: None,
                },
                SearchFieldEntry::Table(table) => SearchField {
                    name: name.clone(),
                    document_path: table.field.clone().unwrap_or_else(|| name.clone()),
                    boost: table.boost,
                },
            })
            .collect(),
    };

    for (i, field) in fields.iter().enumerate() {
        if fields[..i].iter().any(|f| f.name == field.name) {
            return Err(QueryError::InvalidFieldConfig(format!(
                "search_fields: '{}' declared twice",
                field.name
            )));
        }
    }

    let nested = nested
        .iter()
        .map(|(path, fields)| {
            if fields.is_empty() {
                return Err(QueryError::InvalidFieldConfig(format!(
                    "search_nested_fields.{path}: at least one field is required"
                )));
            }
            Ok(NestedSearch {
                path: path.clone(),
                fields: fields.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((fields, nested))
}

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let mut should = Vec::new();
    for value in ctx.params.get_all(SEARCH_PARAM) {
        should.extend(search_clauses(view, value));
    }
    for (key, value) in ctx.params.items() {
        let Some(name) = key.strip_prefix(FIELD_SEARCH_PREFIX) else {
            continue;
        };
        if let Some(field) = view.search_fields.iter().find(|f| f.name == name) {
            if !value.trim().is_empty() {
                should.push(match_query(field, value.trim()));
            }
        }
    }

    let mut simple = Vec::new();
    for value in ctx.params.get_all(QUERY_PARAM) {
        if let Some(query) = simple_query_string(view, value)? {
            simple.push(query);
        }
    }

    let mut out = request.clone();
    if !should.is_empty() {
        out = out.with_must(Query::or(should));
    }
    if !simple.is_empty() {
        out = out.with_must(Query::or(simple));
    }
    Ok(out)
}

/// Whether the request asks for any full-text search.
pub fn is_search_requested(ctx: &SearchContext) -> bool {
    ctx.params.items().iter().any(|(key, value)| {
        !value.trim().is_empty()
            && (key == SEARCH_PARAM || key == QUERY_PARAM || key.starts_with(FIELD_SEARCH_PREFIX))
    })
}

fn match_query(field: &SearchField, text: &str) -> Query {
    let mut options = Map::new();
    if let Some(boost) = field.boost {
        options.insert("boost".into(), json!(boost));
    }
    Query::Match {
        field: field.document_path.clone(),
        query: text.to_string(),
        options,
    }
}

fn search_clauses(view: &ViewConfig, value: &str) -> Vec<Query> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }
    if let Some((name, text)) = value.split_once(':') {
        if let Some(field) = view.search_fields.iter().find(|f| f.name == name.trim()) {
            let text = text.trim();
            return if text.is_empty() {
                Vec::new()
            } else {
                vec![match_query(field, text)]
            };
        }
    }

    let mut clauses = Vec::new();
    if !view.search_fields.is_empty() {
        clauses.push(Query::MultiMatch {
            query: value.to_string(),
            fields: view.search_fields.iter().map(SearchField::boosted_path).collect(),
            options: view.multi_match_options.clone(),
        });
    }
    for nested in &view.search_nested_fields {
        clauses.push(Query::Nested {
            path: nested.path.clone(),
            query: Box::new(Query::MultiMatch {
                query: value.to_string(),
                fields: nested.fields.clone(),
                options: view.multi_match_options.clone(),
            }),
        });
    }
    clauses
}

fn simple_query_string(view: &ViewConfig, value: &str) -> Result<Option<Query>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let all: Vec<String> = view.search_fields.iter().map(SearchField::boosted_path).collect();

    let (fields, text) = match value.split_once(':') {
        Some((prefix, text)) if !prefix.contains(char::is_whitespace) => {
            let names: Vec<&str> = prefix.split(',').map(str::trim).filter(|n| !n.is_empty()).collect();
            let selected: Vec<String> = names
                .iter()
                .filter_map(|n| view.search_fields.iter().find(|f| f.name == *n))
                .map(SearchField::boosted_path)
                .collect();
            if names.is_empty() || selected.len() != names.len() {
                return Err(QueryError::InvalidParameter(format!(
                    "'{QUERY_PARAM}' may only target search fields, got '{prefix}'"
                )));
            }
            (selected, text.trim())
        }
        _ => (all, value),
    };
    if text.is_empty() || fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(Query::SimpleQueryString {
        query: text.to_string(),
        fields,
        options: view.simple_query_string_options.clone(),
    }))
}
