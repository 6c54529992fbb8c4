//! Search request builder
//!
//! Backends never mutate a request they are given; they clone it and return the
//! extended copy. Query clauses accumulate, while sort, source filter and
//! highlight are single slots where the last writer wins.

use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::dsl::{BoolQuery, GeoPoint, Highlight, Query, SortKey, SourceFilter};

/// A clause of the post-filter, optionally attributed to the facet it selects.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFilterClause {
    pub facet: Option<String>,
    pub query: Query,
}

/// A facet's aggregation before it is wrapped in its filter/global bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetAggregation {
    pub name: String,
    pub aggregation: Value,
    pub global: bool,
}

/// Prefix of the wrapper aggregation each facet is nested in.
pub const FACET_WRAPPER_PREFIX: &str = "_filter_";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    index: String,
    must: Vec<Query>,
    filter: Vec<Query>,
    post_filter: Vec<PostFilterClause>,
    facets: Vec<FacetAggregation>,
    sort: Option<Vec<SortKey>>,
    source: Option<SourceFilter>,
    highlight: Option<Highlight>,
    suggest: Vec<(String, Value)>,
    from: Option<usize>,
    size: Option<usize>,
    search_after: Option<Vec<Value>>,
    timeout: Option<Duration>,
    geo_pivots: Vec<(String, GeoPoint)>,
}

impl SearchRequest {
    pub fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
            ..Default::default()
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Add a scoring clause.
    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    /// Add a non-scoring clause.
    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn with_post_filter(mut self, facet: Option<&str>, query: Query) -> Self {
        self.post_filter.push(PostFilterClause {
            facet: facet.map(str::to_string),
            query,
        });
        self
    }

    /// Register a facet aggregation. Re-registering a name replaces it.
    pub fn with_facet(mut self, facet: FacetAggregation) -> Self {
        self.facets.retain(|f| f.name != facet.name);
        self.facets.push(facet);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_source(mut self, source: SourceFilter) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = Some(highlight);
        self
    }

    pub fn with_suggest(mut self, name: &str, suggestion: Value) -> Self {
        self.suggest.retain(|(n, _)| n != name);
        self.suggest.push((name.to_string(), suggestion));
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_search_after(mut self, values: Vec<Value>) -> Self {
        self.search_after = Some(values);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remember the pivot of a `geo_distance` filter so distance sorting can reuse it.
    pub fn with_geo_pivot(mut self, field: &str, point: GeoPoint) -> Self {
        self.geo_pivots.retain(|(f, _)| f != field);
        self.geo_pivots.push((field.to_string(), point));
        self
    }

    pub fn must(&self) -> &[Query] {
        &self.must
    }

    pub fn filter(&self) -> &[Query] {
        &self.filter
    }

    pub fn post_filter(&self) -> &[PostFilterClause] {
        &self.post_filter
    }

    pub fn facets(&self) -> &[FacetAggregation] {
        &self.facets
    }

    pub fn sort(&self) -> Option<&[SortKey]> {
        self.sort.as_deref()
    }

    pub fn source(&self) -> Option<&SourceFilter> {
        self.source.as_ref()
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    pub fn suggest(&self) -> &[(String, Value)] {
        &self.suggest
    }

    pub fn offset(&self) -> Option<usize> {
        self.from
    }

    pub fn size(&self) -> Option<usize> {
        self.size
    }

    pub fn search_after(&self) -> Option<&[Value]> {
        self.search_after.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn geo_pivot(&self, field: &str) -> Option<GeoPoint> {
        self.geo_pivots
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, p)| *p)
    }

    /// Whether any clause contributes relevance scoring.
    pub fn has_scoring_query(&self) -> bool {
        !self.must.is_empty()
    }

    /// Fill distance sorts that have no pivot from recorded `geo_distance` filters.
    ///
    /// Keys that still have no pivot are dropped.
    pub fn resolve_geo_sort(mut self) -> Self {
        let Some(sort) = self.sort.take() else {
            return self;
        };
        let resolved = sort
            .into_iter()
            .filter_map(|key| match key {
                SortKey::GeoDistance {
                    field,
                    pivot: None,
                    order,
                    unit,
                    distance_type,
                } => self.geo_pivot(&field).map(|pivot| SortKey::GeoDistance {
                    field,
                    pivot: Some(pivot),
                    order,
                    unit,
                    distance_type,
                }),
                other => Some(other),
            })
            .collect();
        self.sort = Some(resolved);
        self
    }

    /// The post-filter as a single clause, if any selection was made.
    pub fn post_filter_query(&self) -> Option<Query> {
        if self.post_filter.is_empty() {
            return None;
        }
        Some(Query::and(self.post_filter_groups(None)))
    }

    /// Post-filter clauses with the selections of one facet ORed together, in
    /// first-seen order. Unattributed clauses stay separate. `skip` leaves out
    /// one facet's own selections.
    fn post_filter_groups(&self, skip: Option<&str>) -> Vec<Query> {
        let mut groups: Vec<(Option<&str>, Vec<Query>)> = Vec::new();
        for clause in &self.post_filter {
            let facet = clause.facet.as_deref();
            if facet.is_some() && facet == skip {
                continue;
            }
            match facet.and_then(|name| groups.iter_mut().find(|(f, _)| *f == Some(name))) {
                Some((_, queries)) => queries.push(clause.query.clone()),
                None => groups.push((facet, vec![clause.query.clone()])),
            }
        }
        groups
            .into_iter()
            .map(|(_, queries)| Query::or(queries))
            .collect()
    }

    fn query_json(&self) -> Value {
        if self.must.is_empty() && self.filter.is_empty() {
            return Query::MatchAll.to_json();
        }
        BoolQuery {
            must: self.must.clone(),
            filter: self.filter.clone(),
            ..Default::default()
        }
        .to_json()
    }

    fn aggregations_json(&self) -> Map<String, Value> {
        let mut aggs = Map::new();
        for facet in &self.facets {
            let mut inner = Map::new();
            inner.insert(facet.name.clone(), facet.aggregation.clone());
            let wrapper = if facet.global {
                json!({ "global": {}, "aggs": inner })
            } else {
                let others = self.post_filter_groups(Some(&facet.name));
                json!({ "filter": Query::and(others).to_json(), "aggs": inner })
            };
            aggs.insert(format!("{FACET_WRAPPER_PREFIX}{}", facet.name), wrapper);
        }
        aggs
    }

    /// Render the request body sent to the cluster's `_search` endpoint.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.query_json());
        if let Some(post_filter) = self.post_filter_query() {
            body.insert("post_filter".into(), post_filter.to_json());
        }
        let aggs = self.aggregations_json();
        if !aggs.is_empty() {
            body.insert("aggs".into(), Value::Object(aggs));
        }
        if let Some(sort) = &self.sort {
            if !sort.is_empty() {
                body.insert(
                    "sort".into(),
                    Value::Array(sort.iter().map(SortKey::to_json).collect()),
                );
            }
        }
        if let Some(source) = &self.source {
            if !source.is_empty() {
                body.insert("_source".into(), source.to_json());
            }
        }
        if let Some(highlight) = &self.highlight {
            if !highlight.fields.is_empty() {
                body.insert("highlight".into(), highlight.to_json());
            }
        }
        if !self.suggest.is_empty() {
            let suggest: Map<String, Value> = self.suggest.iter().cloned().collect();
            body.insert("suggest".into(), Value::Object(suggest));
        }
        if let Some(from) = self.from {
            body.insert("from".into(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".into(), json!(size));
        }
        if let Some(search_after) = &self.search_after {
            body.insert("search_after".into(), Value::Array(search_after.clone()));
        }
        if let Some(timeout) = self.timeout {
            body.insert("timeout".into(), json!(format!("{}ms", timeout.as_millis())));
        }
        body.insert("track_total_hits".into(), Value::Bool(true));
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::SortOrder;

    fn term(field: &str, value: &str) -> Query {
        Query::Term {
            field: field.into(),
            value: json!(value),
        }
    }

    #[test]
    fn empty_request_matches_all() {
        let body = SearchRequest::new("books").to_body();
        assert_eq!(body["query"], json!({"match_all": {}}));
        assert_eq!(body["track_total_hits"], json!(true));
        assert!(body.get("sort").is_none());
        assert!(body.get("post_filter").is_none());
    }

    #[test]
    fn builders_do_not_touch_the_original() {
        let base = SearchRequest::new("books").with_filter(term("state", "a"));
        let extended = base.clone().with_filter(term("category", "b"));
        assert_eq!(base.filter().len(), 1);
        assert_eq!(extended.filter().len(), 2);
    }

    #[test]
    fn facet_wrapper_excludes_its_own_selection() {
        let request = SearchRequest::new("books")
            .with_facet(FacetAggregation {
                name: "tag".into(),
                aggregation: json!({"terms": {"field": "tags"}}),
                global: false,
            })
            .with_facet(FacetAggregation {
                name: "state".into(),
                aggregation: json!({"terms": {"field": "state"}}),
                global: false,
            })
            .with_post_filter(Some("tag"), term("tags", "python"))
            .with_post_filter(Some("state"), term("state", "published"));

        let body = request.to_body();
        assert_eq!(
            body["aggs"]["_filter_tag"]["filter"],
            json!({"term": {"state": "published"}})
        );
        assert_eq!(
            body["aggs"]["_filter_state"]["filter"],
            json!({"term": {"tags": "python"}})
        );
        assert_eq!(
            body["aggs"]["_filter_tag"]["aggs"]["tag"],
            json!({"terms": {"field": "tags"}})
        );
        assert_eq!(
            body["post_filter"],
            json!({"bool": {"filter": [
                {"term": {"tags": "python"}},
                {"term": {"state": "published"}}
            ]}})
        );
    }

    #[test]
    fn global_facet_uses_global_bucket() {
        let body = SearchRequest::new("books")
            .with_facet(FacetAggregation {
                name: "tag".into(),
                aggregation: json!({"terms": {"field": "tags"}}),
                global: true,
            })
            .to_body();
        assert_eq!(body["aggs"]["_filter_tag"]["global"], json!({}));
    }

    #[test]
    fn geo_sort_resolution_uses_recorded_pivot() {
        let point = GeoPoint {
            lat: 40.7,
            lon: -74.0,
        };
        let geo_key = |field: &str| SortKey::GeoDistance {
            field: field.into(),
            pivot: None,
            order: SortOrder::Asc,
            unit: "m".into(),
            distance_type: "arc".into(),
        };
        let request = SearchRequest::new("publishers")
            .with_geo_pivot("location", point)
            .with_sort(vec![geo_key("location"), geo_key("office")])
            .resolve_geo_sort();
        let sort = request.sort().unwrap();
        assert_eq!(sort.len(), 1);
        assert!(matches!(&sort[0], SortKey::GeoDistance { pivot: Some(p), .. } if *p == point));
    }

    #[test]
    fn last_sort_writer_wins() {
        let request = SearchRequest::new("books")
            .with_sort(vec![SortKey::field("title", SortOrder::Asc)])
            .with_sort(vec![SortKey::field("published", SortOrder::Desc)]);
        assert_eq!(
            request.to_body()["sort"],
            json!([{"published": {"order": "desc"}}])
        );
    }

    #[test]
    fn timeout_is_rendered_in_milliseconds() {
        let body = SearchRequest::new("books")
            .with_timeout(Duration::from_secs(2))
            .to_body();
        assert_eq!(body["timeout"], json!("2000ms"));
    }
}
