//! Suggesters
//!
//! Only active for the `suggest` action. `<name>__<kind>=<text>` (or `<name>=<text>`
//! when the suggester has a default kind) adds a `term`, `phrase` or `completion`
//! suggestion keyed by the parameter name, so the response can echo it back in
//! request order. Completion suggesters may be narrowed by category and geo
//! contexts through their own parameters.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::geo::parse_lat_lon;
use crate::context::{Action, SearchContext};
use crate::error::{QueryError, Result};
use crate::params::{parse_param_name, QueryParams, LOOKUP_SEPARATOR};
use crate::request::SearchRequest;
use crate::view::{FieldMap, ViewConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggesterKind {
    Term,
    Phrase,
    Completion,
}

impl SuggesterKind {
    pub const ALL: [SuggesterKind; 3] = [Self::Term, Self::Phrase, Self::Completion];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Term => "term",
            Self::Phrase => "phrase",
            Self::Completion => "completion",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SuggesterSpec {
    Path(String),
    Table(SuggesterTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuggesterTable {
    pub field: Option<String>,
    pub suggesters: Option<Vec<SuggesterKind>>,
    pub default_suggester: Option<SuggesterKind>,
    pub options: Map<String, Value>,
    pub completion_options: CompletionOptions,
}

/// Context parameters of a completion suggester: parameter name → context name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionOptions {
    pub category_filters: FieldMap<String>,
    pub geo_filters: FieldMap<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggesterConfig {
    pub name: String,
    pub field: String,
    pub kinds: Vec<SuggesterKind>,
    pub default_kind: Option<SuggesterKind>,
    pub options: Map<String, Value>,
    pub category_filters: Vec<(String, String)>,
    pub geo_filters: Vec<(String, String)>,
}

pub fn resolve_suggesters(spec: &FieldMap<SuggesterSpec>) -> Result<Vec<SuggesterConfig>> {
    spec.iter()
        .map(|(name, entry)| {
            let invalid = |msg: String| QueryError::InvalidFieldConfig(format!("suggester_fields.{name}: {msg}"));
            if name.is_empty() || name.contains(LOOKUP_SEPARATOR) {
                return Err(invalid("names must be non-empty and free of '__'".into()));
            }
            let table = match entry {
                SuggesterSpec::Path(path) => SuggesterTable {
                    field: Some(path.clone()),
                    ..Default::default()
                },
                SuggesterSpec::Table(table) => table.clone(),
            };
            let kinds = table.suggesters.clone().unwrap_or_else(|| SuggesterKind::ALL.to_vec());
            if kinds.is_empty() {
                return Err(invalid("at least one suggester kind is required".into()));
            }
            let default_kind = match table.default_suggester {
                Some(kind) if !kinds.contains(&kind) => {
                    return Err(invalid(format!(
                        "default suggester '{}' is not among the declared kinds",
                        kind.as_str()
                    )));
                }
                Some(kind) => Some(kind),
                None if kinds.len() == 1 => Some(kinds[0]),
                None => None,
            };
            let has_contexts = !table.completion_options.category_filters.is_empty()
                || !table.completion_options.geo_filters.is_empty();
            if has_contexts && !kinds.contains(&SuggesterKind::Completion) {
                return Err(invalid("completion contexts need the completion kind".into()));
            }
            Ok(SuggesterConfig {
                name: name.clone(),
                field: table.field.clone().unwrap_or_else(|| name.clone()),
                kinds,
                default_kind,
                options: table.options.clone(),
                category_filters: table.completion_options.category_filters.0.clone(),
                geo_filters: table.completion_options.geo_filters.0.clone(),
            })
        })
        .collect()
}

/// One suggestion asked for by the request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedSuggestion<'a> {
    /// The parameter key; also the key of the suggestion in the response.
    pub key: String,
    pub config: &'a SuggesterConfig,
    pub kind: SuggesterKind,
    pub text: String,
}

/// Suggestions requested through the query string, in request order.
///
/// A key given several times keeps its first position and its last value.
pub fn requested<'a>(ctx: &SearchContext, view: &'a ViewConfig) -> Result<Vec<RequestedSuggestion<'a>>> {
    let mut out: Vec<RequestedSuggestion<'a>> = Vec::new();
    for (key, value) in ctx.params.items() {
        let name = parse_param_name(key);
        let Some(config) = view.suggester(name.field) else {
            continue;
        };
        if let Some(modifier) = name.modifier {
            return Err(QueryError::InvalidParameter(format!(
                "unsupported modifier '{modifier}' in '{key}'"
            )));
        }
        let kind = match name.lookup {
            None => match config.default_kind {
                Some(kind) => kind,
                None => continue,
            },
            Some(suffix) => {
                let kind = SuggesterKind::from_name(suffix).ok_or_else(|| QueryError::UnknownLookup {
                    field: config.name.clone(),
                    lookup: suffix.to_string(),
                })?;
                if !config.kinds.contains(&kind) {
                    return Err(QueryError::DisallowedLookup {
                        field: config.name.clone(),
                        lookup: suffix.to_string(),
                    });
                }
                kind
            }
        };
        let text = value.trim();
        if text.is_empty() {
            continue;
        }
        match out.iter_mut().find(|s| s.key == *key) {
            Some(existing) => existing.text = text.to_string(),
            None => out.push(RequestedSuggestion {
                key: key.clone(),
                config,
                kind,
                text: text.to_string(),
            }),
        }
    }
    Ok(out)
}

impl RequestedSuggestion<'_> {
    /// The entry of the request's `suggest` block.
    pub fn body(&self, params: &QueryParams) -> Result<Value> {
        let config = self.config;
        match self.kind {
            SuggesterKind::Term | SuggesterKind::Phrase => {
                let mut inner = Map::new();
                inner.insert("field".into(), Value::String(config.field.clone()));
                for (k, v) in &config.options {
                    inner.insert(k.clone(), v.clone());
                }
                Ok(json!({ "text": self.text, self.kind.as_str(): inner }))
            }
            SuggesterKind::Completion => {
                let mut inner = Map::new();
                inner.insert("field".into(), Value::String(config.field.clone()));
                for key in ["size", "skip_duplicates", "fuzzy"] {
                    if let Some(value) = config.options.get(key) {
                        inner.insert(key.into(), value.clone());
                    }
                }
                let contexts = completion_contexts(config, params)?;
                if !contexts.is_empty() {
                    inner.insert("contexts".into(), Value::Object(contexts));
                }
                Ok(json!({ "prefix": self.text, "completion": inner }))
            }
        }
    }
}

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    if ctx.action != Action::Suggest {
        return Ok(request.clone());
    }
    let mut out = request.clone();
    for suggestion in requested(ctx, view)? {
        out = out.with_suggest(&suggestion.key, suggestion.body(&ctx.params)?);
    }
    Ok(out)
}

/// The request of the `suggest` action: suggestions only, no hits.
pub fn suggest_request(base: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let request = apply(&base.clone().with_size(0), ctx, view)?;
    if request.suggest().is_empty() {
        let names: Vec<&str> = view.suggesters.iter().map(|s| s.name.as_str()).collect();
        return Err(QueryError::SuggesterRequired(names.join(", ")));
    }
    Ok(request)
}

fn split_context(value: &str, max: usize) -> Vec<&str> {
    value.splitn(max, LOOKUP_SEPARATOR).map(str::trim).collect()
}

fn parse_boost(param: &str, raw: &str) -> Result<Value> {
    raw.parse::<f64>()
        .ok()
        .filter(|b| b.is_finite())
        .map(Value::from)
        .ok_or_else(|| QueryError::invalid_value(param, format!("invalid boost '{raw}'")))
}

fn completion_contexts(config: &SuggesterConfig, params: &QueryParams) -> Result<Map<String, Value>> {
    let mut contexts = Map::new();
    let mut push = |context: &str, entry: Value| {
        if let Value::Array(entries) = contexts
            .entry(context.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            entries.push(entry);
        }
    };

    for (param, context) in &config.category_filters {
        for value in params.get_all(param) {
            let parts = split_context(value, 3);
            if parts[0].is_empty() {
                continue;
            }
            let mut entry = Map::new();
            entry.insert("context".into(), Value::String(parts[0].to_string()));
            match parts.as_slice() {
                [_] => {}
                [_, "prefix"] => {
                    entry.insert("prefix".into(), Value::Bool(true));
                }
                [_, boost] => {
                    entry.insert("boost".into(), parse_boost(param, boost)?);
                }
                [_, boost, "prefix"] => {
                    entry.insert("boost".into(), parse_boost(param, boost)?);
                    entry.insert("prefix".into(), Value::Bool(true));
                }
                _ => {
                    return Err(QueryError::invalid_value(
                        param,
                        "expected 'value[__boost][__prefix]'",
                    ));
                }
            }
            push(context, Value::Object(entry));
        }
    }

    for (param, context) in &config.geo_filters {
        for value in params.get_all(param) {
            let parts = split_context(value, 4);
            if parts.len() < 2 {
                return Err(QueryError::bad_geo(param, "expected 'lat__lon[__precision[__boost]]'"));
            }
            let point = parse_lat_lon(param, parts[0], parts[1])?;
            let mut entry = Map::new();
            entry.insert("context".into(), point.to_json());
            if let Some(precision) = parts.get(2).filter(|p| !p.is_empty()) {
                let precision = match precision.parse::<u64>() {
                    Ok(level) => Value::from(level),
                    Err(_) => Value::String(precision.to_string()),
                };
                entry.insert("precision".into(), precision);
            }
            if let Some(boost) = parts.get(3).filter(|b| !b.is_empty()) {
                entry.insert("boost".into(), parse_boost(param, boost)?);
            }
            push(context, Value::Object(entry));
        }
    }
    Ok(contexts)
}
