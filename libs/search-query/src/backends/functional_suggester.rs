//! Functional suggesters
//!
//! Suggestions computed with ordinary queries instead of the cluster's suggest API:
//! `<name>__completion_prefix=<text>` runs a `prefix` query and
//! `<name>__completion_match=<text>` a `match` query on the declared field. Each
//! requested suggestion is its own search over the filtered request.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::{Action, SearchContext};
use crate::dsl::{Query, SortKey, SortOrder};
use crate::error::{QueryError, Result};
use crate::fields::option_u64;
use crate::params::{parse_param_name, LOOKUP_SEPARATOR};
use crate::request::SearchRequest;
use crate::view::{FieldMap, ViewConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalSuggesterKind {
    CompletionPrefix,
    CompletionMatch,
}

impl FunctionalSuggesterKind {
    pub const ALL: [FunctionalSuggesterKind; 2] = [Self::CompletionPrefix, Self::CompletionMatch];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompletionPrefix => "completion_prefix",
            Self::CompletionMatch => "completion_match",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FunctionalSuggesterSpec {
    Path(String),
    Table(FunctionalSuggesterTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunctionalSuggesterTable {
    pub field: Option<String>,
    pub suggesters: Option<Vec<FunctionalSuggesterKind>>,
    pub default_suggester: Option<FunctionalSuggesterKind>,
    /// `size` and `from` of the suggestion search.
    pub options: Map<String, Value>,
    /// `_source` key copied into each option's `text`.
    pub serializer_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalSuggesterConfig {
    pub name: String,
    pub field: String,
    pub kinds: Vec<FunctionalSuggesterKind>,
    pub default_kind: Option<FunctionalSuggesterKind>,
    pub size: Option<usize>,
    pub from: usize,
    pub serializer_field: String,
}

pub fn resolve_functional_suggesters(
    spec: &FieldMap<FunctionalSuggesterSpec>,
) -> Result<Vec<FunctionalSuggesterConfig>> {
    spec.iter()
        .map(|(name, entry)| {
            let invalid = |msg: String| {
                QueryError::InvalidFieldConfig(format!("functional_suggester_fields.{name}: {msg}"))
            };
            if name.is_empty() || name.contains(LOOKUP_SEPARATOR) {
                return Err(invalid("names must be non-empty and free of '__'".into()));
            }
            let table = match entry {
                FunctionalSuggesterSpec::Path(path) => FunctionalSuggesterTable {
                    field: Some(path.clone()),
                    ..Default::default()
                },
                FunctionalSuggesterSpec::Table(table) => table.clone(),
            };
            let kinds = table
                .suggesters
                .clone()
                .unwrap_or_else(|| FunctionalSuggesterKind::ALL.to_vec());
            if kinds.is_empty() {
                return Err(invalid("at least one suggester kind is required".into()));
            }
            if let Some(kind) = table.default_suggester.filter(|k| !kinds.contains(k)) {
                return Err(invalid(format!(
                    "default suggester '{}' is not among the declared kinds",
                    kind.as_str()
                )));
            }
            let default_kind = table
                .default_suggester
                .or_else(|| (kinds.len() == 1).then(|| kinds[0]));
            let field = table.field.clone().unwrap_or_else(|| name.clone());
            // `name.suggest` serializes as `name` unless configured otherwise
            let serializer_field = table.serializer_field.clone().unwrap_or_else(|| {
                field.split('.').next().unwrap_or(field.as_str()).to_string()
            });
            Ok(FunctionalSuggesterConfig {
                name: name.clone(),
                field,
                kinds,
                default_kind,
                size: option_u64(&table.options, "size").map(|s| s as usize),
                from: option_u64(&table.options, "from").unwrap_or(0) as usize,
                serializer_field,
            })
        })
        .collect()
}

/// One functional suggestion asked for by the request.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalSuggestion<'a> {
    pub key: String,
    pub config: &'a FunctionalSuggesterConfig,
    pub kind: FunctionalSuggesterKind,
    pub text: String,
}

impl FunctionalSuggestion<'_> {
    pub fn query(&self) -> Query {
        match self.kind {
            FunctionalSuggesterKind::CompletionPrefix => Query::Prefix {
                field: self.config.field.clone(),
                value: self.text.clone(),
            },
            FunctionalSuggesterKind::CompletionMatch => Query::Match {
                field: self.config.field.clone(),
                query: self.text.clone(),
                options: Map::new(),
            },
        }
    }

    /// The search answering this suggestion, built on the already filtered `base`.
    pub fn request(&self, base: &SearchRequest) -> SearchRequest {
        let mut request = base
            .clone()
            .with_must(self.query())
            .with_sort(vec![SortKey::field("_score", SortOrder::Desc)]);
        if let Some(size) = self.config.size {
            request = request.with_from(self.config.from).with_size(size);
        }
        request
    }
}

/// Functional suggestions requested through the query string, in request order.
pub fn requested<'a>(ctx: &SearchContext, view: &'a ViewConfig) -> Result<Vec<FunctionalSuggestion<'a>>> {
    let mut out: Vec<FunctionalSuggestion<'a>> = Vec::new();
    for (key, value) in ctx.params.items() {
        let name = parse_param_name(key);
        let Some(config) = view.functional_suggesters.iter().find(|s| s.name == name.field) else {
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
                let kind = FunctionalSuggesterKind::from_name(suffix).ok_or_else(|| {
                    QueryError::UnknownLookup {
                        field: config.name.clone(),
                        lookup: suffix.to_string(),
                    }
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
            None => out.push(FunctionalSuggestion {
                key: key.clone(),
                config,
                kind,
                text: text.to_string(),
            }),
        }
    }
    Ok(out)
}

/// Like [`requested`], but fails when nothing was asked for.
pub fn require_requested<'a>(
    ctx: &SearchContext,
    view: &'a ViewConfig,
) -> Result<Vec<FunctionalSuggestion<'a>>> {
    let suggestions = requested(ctx, view)?;
    if suggestions.is_empty() {
        let names: Vec<&str> = view
            .functional_suggesters
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        return Err(QueryError::SuggesterRequired(names.join(", ")));
    }
    Ok(suggestions)
}

/// As a chain member: narrows a `functional_suggest` request to its first suggestion.
pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    if ctx.action != Action::FunctionalSuggest {
        return Ok(request.clone());
    }
    Ok(match requested(ctx, view)?.first() {
        Some(suggestion) => suggestion.request(request),
        None => request.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::view;
    use crate::params::QueryParams;
    use serde_json::json;

    fn books() -> ViewConfig {
        view(json!({
            "name": "books",
            "index": "books",
            "functional_suggester_fields": {
                "title_suggest": {
                    "field": "title.raw",
                    "suggesters": ["completion_prefix"],
                    "options": {"size": 10, "from": 0}
                },
                "title_suggest_match": {
                    "field": "title.edge_ngram_completion",
                    "suggesters": ["completion_match"],
                    "default_suggester": "completion_match",
                    "serializer_field": "title"
                }
            }
        }))
    }

    fn ctx(query: &str) -> SearchContext {
        SearchContext::new(Action::FunctionalSuggest, QueryParams::from_query(query))
    }

    #[test]
    fn prefix_suggestion_request() {
        let view = books();
        let ctx = ctx("title_suggest__completion_prefix=Har");
        let suggestions = require_requested(&ctx, &view).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].config.serializer_field, "title");

        let body = suggestions[0].request(&SearchRequest::new("books")).to_body();
        assert_eq!(body["query"], json!({"bool": {"must": [{"prefix": {"title.raw": "Har"}}]}}));
        assert_eq!(body["sort"], json!([{"_score": {"order": "desc"}}]));
        assert_eq!(body["size"], json!(10));
        assert_eq!(body["from"], json!(0));
    }

    #[test]
    fn default_kind_and_order() {
        let view = books();
        let ctx = ctx("title_suggest_match=lord&title_suggest=Ha");
        let suggestions = requested(&ctx, &view).unwrap();
        let keys: Vec<&str> = suggestions.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["title_suggest_match", "title_suggest"]);
        assert_eq!(suggestions[0].kind, FunctionalSuggesterKind::CompletionMatch);
        assert_eq!(
            suggestions[0].query().to_json(),
            json!({"match": {"title.edge_ngram_completion": {"query": "lord"}}})
        );
    }

    #[test]
    fn nothing_requested_is_an_error() {
        let view = books();
        assert!(matches!(
            require_requested(&ctx("title=x"), &view),
            Err(QueryError::SuggesterRequired(_))
        ));
        assert!(matches!(
            require_requested(&ctx("title_suggest__completion_match=x"), &view),
            Err(QueryError::DisallowedLookup { .. })
        ));
    }
}
