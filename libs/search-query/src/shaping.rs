//! Response shaping
//!
//! Renders a page of raw hits plus the cluster's aggregations into the response
//! envelope:
//!
//! ```text
//! { count?, next, previous, results: [...], facets? }
//! ```
//!
//! Suggestions are answered by the suggest endpoints and shaped on their own.

use serde_json::{json, Map, Value};

use crate::backends::faceting::FacetKind;
use crate::backends::functional_suggester::FunctionalSuggestion;
use crate::pagination::Page;
use crate::request::{SearchRequest, FACET_WRAPPER_PREFIX};
use crate::response::Hit;
use crate::serializer::HitSerializer;
use crate::view::ViewConfig;

const META_KEY: &str = "_meta";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Value>,
    pub facets: Option<Map<String, Value>>,
}

impl Envelope {
    /// Shape a page's hits; `_meta.sort` is kept when `include_sort` is set.
    pub fn from_page(page: Page, serializer: &dyn HitSerializer, include_sort: bool) -> Self {
        Self {
            count: page.count,
            next: page.next,
            previous: page.previous,
            results: page
                .hits
                .iter()
                .map(|hit| shape_hit(hit, serializer, include_sort))
                .collect(),
            facets: None,
        }
    }

    pub fn with_facets(mut self, facets: Option<Map<String, Value>>) -> Self {
        self.facets = facets.filter(|f| !f.is_empty());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(count) = self.count {
            body.insert("count".into(), json!(count));
        }
        body.insert("next".into(), json!(self.next));
        body.insert("previous".into(), json!(self.previous));
        body.insert("results".into(), Value::Array(self.results.clone()));
        if let Some(facets) = &self.facets {
            body.insert("facets".into(), Value::Object(facets.clone()));
        }
        Value::Object(body)
    }
}

/// Serializer output plus the `_meta` block.
pub fn shape_hit(hit: &Hit, serializer: &dyn HitSerializer, include_sort: bool) -> Value {
    let mut out = serializer.serialize(hit);
    let mut meta = Map::new();
    meta.insert("score".into(), json!(hit.score));
    if let Some(highlight) = hit.highlight.as_ref().filter(|h| !h.is_empty()) {
        meta.insert("highlight".into(), Value::Object(highlight.clone()));
    }
    meta.insert("index".into(), json!(hit.index));
    meta.insert("id".into(), json!(hit.id));
    if include_sort {
        if let Some(sort) = &hit.sort {
            meta.insert("sort".into(), Value::Array(sort.clone()));
        }
    }
    out.insert(META_KEY.into(), Value::Object(meta));
    Value::Object(out)
}

/// Unwrap the facets the request asked for from their `_filter_<name>` wrappers.
///
/// Returns `None` when the request carried no facets.
pub fn shape_facets(
    request: &SearchRequest,
    view: &ViewConfig,
    aggregations: Option<&Map<String, Value>>,
) -> Option<Map<String, Value>> {
    if request.facets().is_empty() {
        return None;
    }
    let aggregations = aggregations?;
    let mut facets = Map::new();
    for facet in request.facets() {
        let Some(raw) = aggregations
            .get(&format!("{FACET_WRAPPER_PREFIX}{}", facet.name))
            .and_then(|wrapper| wrapper.get(&facet.name))
        else {
            tracing::debug!(facet = %facet.name, "facet missing from aggregations");
            continue;
        };
        let kind = view
            .facet(&facet.name)
            .map(|definition| definition.kind)
            .unwrap_or_default();
        let raw = match kind {
            FacetKind::Nested => raw.get(&facet.name).unwrap_or(raw),
            _ => raw,
        };
        facets.insert(facet.name.clone(), shape_facet(kind, raw));
    }
    Some(facets)
}

fn shape_facet(kind: FacetKind, raw: &Value) -> Value {
    let buckets = match raw.get("buckets") {
        Some(buckets) if kind.has_buckets() => buckets.clone(),
        _ => return raw.clone(),
    };
    let mut out = Map::new();
    out.insert("buckets".into(), buckets);
    for key in ["doc_count_error_upper_bound", "sum_other_doc_count"] {
        if let Some(value) = raw.get(key) {
            out.insert(key.into(), value.clone());
        }
    }
    Value::Object(out)
}

/// Suggestions in the order the request declared them.
pub fn shape_suggestions(request: &SearchRequest, suggest: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, _) in request.suggest() {
        let value = suggest
            .and_then(|s| s.get(key))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        out.insert(key.clone(), value);
    }
    out
}

/// One functional suggestion rendered like a native suggester entry.
pub fn shape_functional_suggestion(suggestion: &FunctionalSuggestion<'_>, hits: &[Hit]) -> Value {
    let options: Vec<Value> = hits
        .iter()
        .map(|hit| {
            let text = hit
                .source
                .get(&suggestion.config.serializer_field)
                .cloned()
                .unwrap_or(Value::Null);
            json!({
                "text": text,
                "_index": hit.index,
                "_id": hit.id,
                "_score": hit.score,
                "_source": hit.source,
            })
        })
        .collect();
    json!([{
        "text": suggestion.text,
        "offset": 0,
        "length": suggestion.text.chars().count(),
        "options": options,
    }])
}
