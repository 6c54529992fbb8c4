//! Faceted search
//!
//! Facets are aggregations returned next to the hits. `facet=<name>` enables a
//! facet; `facet=<name>:<v1>|<v2>` also selects values. Selections go to the
//! post-filter, attributed to their facet, so each facet's counts ignore its own
//! selection (see [`SearchRequest::to_body`]).

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::{QueryError, Result};
use crate::params::split_values;
use crate::request::{FacetAggregation, SearchRequest};
use crate::view::{FieldMap, ViewConfig};

pub const FACET_PARAM: &str = "facet";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    #[default]
    Terms,
    Histogram,
    DateHistogram,
    Range,
    Filter,
    Filters,
    GeoBounds,
    GeoCentroid,
    Nested,
}

impl FacetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Terms => "terms",
            Self::Histogram => "histogram",
            Self::DateHistogram => "date_histogram",
            Self::Range => "range",
            Self::Filter => "filter",
            Self::Filters => "filters",
            Self::GeoBounds => "geo_bounds",
            Self::GeoCentroid => "geo_centroid",
            Self::Nested => "nested",
        }
    }

    /// Whether the aggregation answers with buckets rather than a single value.
    pub fn has_buckets(self) -> bool {
        !matches!(self, Self::GeoBounds | Self::GeoCentroid | Self::Filter)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FacetSpec {
    Path(String),
    Table(FacetTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacetTable {
    pub field: Option<String>,
    pub kind: FacetKind,
    pub enabled: bool,
    pub global: bool,
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacetDefinition {
    pub name: String,
    pub field: String,
    pub kind: FacetKind,
    pub options: Map<String, Value>,
    pub enabled_by_default: bool,
    pub global: bool,
}

impl FacetDefinition {
    /// The aggregation body, before wrapping.
    pub fn aggregation(&self) -> Value {
        match self.kind {
            FacetKind::Filter => json!({ "filter": self.options }),
            FacetKind::Filters => json!({ "filters": self.options }),
            FacetKind::Nested => {
                let path = self.options.get("path").cloned().unwrap_or(Value::Null);
                let mut terms = Map::new();
                terms.insert("field".into(), Value::String(self.field.clone()));
                for (k, v) in self.options.iter().filter(|(k, _)| k.as_str() != "path") {
                    terms.insert(k.clone(), v.clone());
                }
                json!({
                    "nested": { "path": path },
                    "aggs": { self.name.clone(): { "terms": terms } }
                })
            }
            kind => {
                let mut body = Map::new();
                body.insert("field".into(), Value::String(self.field.clone()));
                for (k, v) in &self.options {
                    body.insert(k.clone(), v.clone());
                }
                json!({ kind.as_str(): body })
            }
        }
    }
}

pub fn resolve_facets(spec: &FieldMap<FacetSpec>) -> Result<Vec<FacetDefinition>> {
    spec.iter()
        .map(|(name, entry)| {
            let table = match entry {
                FacetSpec::Path(path) => FacetTable {
                    field: Some(path.clone()),
                    ..Default::default()
                },
                FacetSpec::Table(table) => table.clone(),
            };
            let facet = FacetDefinition {
                name: name.clone(),
                field: table.field.clone().unwrap_or_else(|| name.clone()),
                kind: table.kind,
                options: table.options.clone(),
                enabled_by_default: table.enabled,
                global: table.global,
            };
            validate(&facet)?;
            Ok(facet)
        })
        .collect()
}

fn validate(facet: &FacetDefinition) -> Result<()> {
    let required: &[&str] = match facet.kind {
        FacetKind::Histogram => &["interval"],
        FacetKind::Range => &["ranges"],
        FacetKind::Nested => &["path"],
        _ => &[],
    };
    let invalid = |msg: String| {
        QueryError::InvalidFieldConfig(format!("faceted_search_fields.{}: {msg}", facet.name))
    };
    if facet.name.is_empty() || facet.name.contains(':') {
        return Err(invalid("facet names must be non-empty and free of ':'".into()));
    }
    for key in required {
        if !facet.options.contains_key(*key) {
            return Err(invalid(format!("{} facets need option '{key}'", facet.kind.as_str())));
        }
    }
    if facet.kind == FacetKind::DateHistogram
        && !["calendar_interval", "fixed_interval", "interval"]
            .iter()
            .any(|k| facet.options.contains_key(*k))
    {
        return Err(invalid("date_histogram facets need an interval option".into()));
    }
    if matches!(facet.kind, FacetKind::Filter | FacetKind::Filters) && facet.options.is_empty() {
        return Err(invalid(format!("{} facets need options", facet.kind.as_str())));
    }
    Ok(())
}

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let mut requested: Vec<(&str, Vec<String>)> = Vec::new();
    for value in ctx.params.get_all(FACET_PARAM) {
        let (name, selection) = match value.split_once(':') {
            Some((name, values)) => (name.trim(), split_values(values)),
            None => (value.trim(), Vec::new()),
        };
        if view.facet(name).is_none() {
            tracing::debug!(facet = %name, view = %view.name, "ignoring unknown facet");
            continue;
        }
        match requested.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.extend(selection),
            None => requested.push((name, selection)),
        }
    }

    let mut out = request.clone();
    for facet in &view.facets {
        let selection = requested.iter().find(|(n, _)| *n == facet.name);
        if !facet.enabled_by_default && selection.is_none() {
            continue;
        }
        out = out.with_facet(FacetAggregation {
            name: facet.name.clone(),
            aggregation: facet.aggregation(),
            global: facet.global,
        });

        let Some((_, values)) = selection.filter(|(_, v)| !v.is_empty()) else {
            continue;
        };
        if facet.kind != FacetKind::Terms {
            return Err(QueryError::InvalidParameter(format!(
                "facet '{}' does not support value selection",
                facet.name
            )));
        }
        let mut typed: Vec<Value> = Vec::new();
        for value in values {
            let value = Value::String(value.clone());
            if !typed.contains(&value) {
                typed.push(value);
            }
        }
        out = out.with_post_filter(Some(&facet.name), Query::term_or_terms(&facet.field, typed));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::{ctx, view};

    fn books() -> ViewConfig {
        view(json!({
            "name": "books",
            "index": "books",
            "faceted_search_fields": {
                "tag": {"field": "tags.raw", "options": {"size": 20}},
                "state": {"field": "state.raw", "enabled": true},
                "pages": {"field": "pages", "kind": "histogram", "options": {"interval": 100}},
                "published": {"field": "published", "kind": "date_histogram", "global": true,
                              "options": {"calendar_interval": "year"}}
            }
        }))
    }

    fn body(query: &str) -> Value {
        apply(&SearchRequest::new("books"), &ctx(query), &books())
            .unwrap()
            .to_body()
    }

    #[test]
    fn only_enabled_or_requested_facets() {
        let body = body("");
        let aggs = body["aggs"].as_object().unwrap();
        assert_eq!(aggs.keys().collect::<Vec<_>>(), vec!["_filter_state"]);
        assert_eq!(
            aggs["_filter_state"],
            json!({"filter": {"match_all": {}}, "aggs": {"state": {"terms": {"field": "state.raw"}}}})
        );
    }

    #[test]
    fn selection_goes_to_post_filter_and_other_wrappers() {
        let body = body("facet=tag:python|rust&facet=state:published");
        assert_eq!(
            body["post_filter"],
            json!({"bool": {"filter": [
                {"terms": {"tags.raw": ["python", "rust"]}},
                {"term": {"state.raw": "published"}}
            ]}})
        );
        assert_eq!(
            body["aggs"]["_filter_tag"]["filter"],
            json!({"term": {"state.raw": "published"}})
        );
        assert_eq!(
            body["aggs"]["_filter_state"]["filter"],
            json!({"terms": {"tags.raw": ["python", "rust"]}})
        );
        assert_eq!(
            body["aggs"]["_filter_tag"]["aggs"]["tag"],
            json!({"terms": {"field": "tags.raw", "size": 20}})
        );
        assert!(body["query"].get("bool").is_none());
    }

    #[test]
    fn repeated_selection_for_one_facet_is_ored() {
        let body = body("facet=tag:python&facet=tag:rust");
        assert_eq!(body["post_filter"], json!({"terms": {"tags.raw": ["python", "rust"]}}));
    }

    #[test]
    fn global_and_histogram_kinds() {
        let body = body("facet=published&facet=pages");
        assert_eq!(
            body["aggs"]["_filter_published"],
            json!({"global": {}, "aggs": {"published": {
                "date_histogram": {"field": "published", "calendar_interval": "year"}
            }}})
        );
        assert_eq!(
            body["aggs"]["_filter_pages"]["aggs"]["pages"],
            json!({"histogram": {"field": "pages", "interval": 100}})
        );
    }

    #[test]
    fn unknown_facets_are_ignored_and_bucketless_selection_rejected() {
        assert!(body("facet=secret:x")["post_filter"].is_null());
        let err = apply(&SearchRequest::new("books"), &ctx("facet=pages:100"), &books()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidParameter(_)));
    }

    #[test]
    fn kind_specific_options_are_required() {
        let spec: FieldMap<FacetSpec> =
            serde_json::from_value(json!({"pages": {"kind": "histogram"}})).unwrap();
        assert!(resolve_facets(&spec).is_err());

        let spec: FieldMap<FacetSpec> = serde_json::from_value(json!({
            "authors": {"field": "authors.name.raw", "kind": "nested", "options": {"path": "authors"}}
        }))
        .unwrap();
        let facets = resolve_facets(&spec).unwrap();
        assert_eq!(
            facets[0].aggregation(),
            json!({"nested": {"path": "authors"}, "aggs": {"authors": {"terms": {"field": "authors.name.raw"}}}})
        );
    }
}
