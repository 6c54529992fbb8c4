//! Query DSL fragments
//!
//! A small typed model of the cluster's query DSL. Every fragment renders to the
//! JSON the cluster expects with `to_json`.

use serde_json::{json, Map, Value};

/// A query or filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        bounds: RangeBounds,
    },
    Exists {
        field: String,
    },
    Prefix {
        field: String,
        value: String,
    },
    Wildcard {
        field: String,
        value: String,
    },
    Regexp {
        field: String,
        value: String,
    },
    Ids {
        values: Vec<String>,
    },
    Match {
        field: String,
        query: String,
        options: Map<String, Value>,
    },
    MultiMatch {
        query: String,
        fields: Vec<String>,
        options: Map<String, Value>,
    },
    QueryString {
        query: String,
        fields: Vec<String>,
    },
    SimpleQueryString {
        query: String,
        fields: Vec<String>,
        options: Map<String, Value>,
    },
    GeoDistance {
        field: String,
        distance: String,
        point: GeoPoint,
        distance_type: Option<String>,
    },
    GeoPolygon {
        field: String,
        points: Vec<GeoPoint>,
        options: Map<String, Value>,
    },
    GeoBoundingBox {
        field: String,
        top_left: GeoPoint,
        bottom_right: GeoPoint,
        options: Map<String, Value>,
    },
    Nested {
        path: String,
        query: Box<Query>,
    },
    MoreLikeThis {
        fields: Vec<String>,
        like: Vec<Value>,
        options: Map<String, Value>,
    },
    Bool(BoolQuery),
}

/// Compound `bool` query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

/// Bounds of a `range` query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
    pub boost: Option<f64>,
    pub format: Option<String>,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn to_json(self) -> Value {
        json!({ "lat": self.lat, "lon": self.lon })
    }
}

impl Query {
    /// AND together. A single clause is returned as is.
    pub fn and(mut queries: Vec<Query>) -> Query {
        match queries.len() {
            0 => Query::MatchAll,
            1 => queries.remove(0),
            _ => Query::Bool(BoolQuery {
                filter: queries,
                ..Default::default()
            }),
        }
    }

    /// OR together. A single clause is returned as is.
    pub fn or(mut queries: Vec<Query>) -> Query {
        match queries.len() {
            0 => Query::MatchAll,
            1 => queries.remove(0),
            _ => Query::Bool(BoolQuery {
                should: queries,
                minimum_should_match: Some(1),
                ..Default::default()
            }),
        }
    }

    pub fn not(query: Query) -> Query {
        Query::Bool(BoolQuery {
            must_not: vec![query],
            ..Default::default()
        })
    }

    /// `term` for a single value, `terms` otherwise.
    pub fn term_or_terms(field: &str, mut values: Vec<Value>) -> Query {
        if values.len() == 1 {
            Query::Term {
                field: field.to_string(),
                value: values.remove(0),
            }
        } else {
            Query::Terms {
                field: field.to_string(),
                values,
            }
        }
    }

    /// Fields referenced by this clause, including nested sub-clauses.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Query::MatchAll | Query::Ids { .. } => {}
            Query::Term { field, .. }
            | Query::Terms { field, .. }
            | Query::Range { field, .. }
            | Query::Exists { field }
            | Query::Prefix { field, .. }
            | Query::Wildcard { field, .. }
            | Query::Regexp { field, .. }
            | Query::Match { field, .. }
            | Query::GeoDistance { field, .. }
            | Query::GeoPolygon { field, .. }
            | Query::GeoBoundingBox { field, .. } => out.push(field),
            Query::MultiMatch { fields, .. }
            | Query::QueryString { fields, .. }
            | Query::SimpleQueryString { fields, .. }
            | Query::MoreLikeThis { fields, .. } => {
                out.extend(fields.iter().map(String::as_str))
            }
            Query::Nested { query, .. } => query.collect_fields(out),
            Query::Bool(b) => {
                for q in b
                    .must
                    .iter()
                    .chain(&b.filter)
                    .chain(&b.should)
                    .chain(&b.must_not)
                {
                    q.collect_fields(out);
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Term { field, value } => json!({ "term": { field: value } }),
            Query::Terms { field, values } => json!({ "terms": { field: values } }),
            Query::Range { field, bounds } => json!({ "range": { field: bounds.to_json() } }),
            Query::Exists { field } => json!({ "exists": { "field": field } }),
            Query::Prefix { field, value } => json!({ "prefix": { field: value } }),
            Query::Wildcard { field, value } => json!({ "wildcard": { field: value } }),
            Query::Regexp { field, value } => json!({ "regexp": { field: value } }),
            Query::Ids { values } => json!({ "ids": { "values": values } }),
            Query::Match {
                field,
                query,
                options,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), Value::String(query.clone()));
                merge(&mut body, options);
                json!({ "match": { field: body } })
            }
            Query::MultiMatch {
                query,
                fields,
                options,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), Value::String(query.clone()));
                body.insert("fields".into(), json!(fields));
                merge(&mut body, options);
                json!({ "multi_match": body })
            }
            Query::QueryString { query, fields } => json!({
                "query_string": { "query": query, "fields": fields }
            }),
            Query::SimpleQueryString {
                query,
                fields,
                options,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), Value::String(query.clone()));
                body.insert("fields".into(), json!(fields));
                merge(&mut body, options);
                json!({ "simple_query_string": body })
            }
            Query::GeoDistance {
                field,
                distance,
                point,
                distance_type,
            } => {
                let mut body = Map::new();
                body.insert("distance".into(), Value::String(distance.clone()));
                body.insert(field.clone(), point.to_json());
                if let Some(distance_type) = distance_type {
                    body.insert("distance_type".into(), Value::String(distance_type.clone()));
                }
                json!({ "geo_distance": body })
            }
            Query::GeoPolygon {
                field,
                points,
                options,
            } => {
                let points: Vec<Value> = points.iter().map(|p| p.to_json()).collect();
                let mut body = Map::new();
                body.insert(field.clone(), json!({ "points": points }));
                merge(&mut body, options);
                json!({ "geo_polygon": body })
            }
            Query::GeoBoundingBox {
                field,
                top_left,
                bottom_right,
                options,
            } => {
                let mut body = Map::new();
                body.insert(
                    field.clone(),
                    json!({
                        "top_left": top_left.to_json(),
                        "bottom_right": bottom_right.to_json(),
                    }),
                );
                merge(&mut body, options);
                json!({ "geo_bounding_box": body })
            }
            Query::Nested { path, query } => json!({
                "nested": { "path": path, "query": query.to_json() }
            }),
            Query::MoreLikeThis {
                fields,
                like,
                options,
            } => {
                let mut body = Map::new();
                if !fields.is_empty() {
                    body.insert("fields".into(), json!(fields));
                }
                body.insert("like".into(), Value::Array(like.clone()));
                merge(&mut body, options);
                json!({ "more_like_this": body })
            }
            Query::Bool(b) => b.to_json(),
        }
    }
}

impl BoolQuery {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("filter", &self.filter),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Query::to_json).collect()),
                );
            }
        }
        if let Some(msm) = self.minimum_should_match {
            body.insert("minimum_should_match".into(), json!(msm));
        }
        json!({ "bool": body })
    }
}

impl RangeBounds {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, bound) in [
            ("gt", &self.gt),
            ("gte", &self.gte),
            ("lt", &self.lt),
            ("lte", &self.lte),
        ] {
            if let Some(bound) = bound {
                body.insert(key.to_string(), bound.clone());
            }
        }
        if let Some(boost) = self.boost {
            body.insert("boost".into(), json!(boost));
        }
        if let Some(format) = &self.format {
            body.insert("format".into(), Value::String(format.clone()));
        }
        Value::Object(body)
    }
}

fn merge(body: &mut Map<String, Value>, options: &Map<String, Value>) {
    for (k, v) in options {
        body.insert(k.clone(), v.clone());
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// One entry of the sort list.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Field {
        field: String,
        order: SortOrder,
        nested_path: Option<String>,
    },
    /// Distance sort. A `None` pivot is filled from a `geo_distance` filter on the
    /// same field once the chain has run; unresolved keys are dropped.
    GeoDistance {
        field: String,
        pivot: Option<GeoPoint>,
        order: SortOrder,
        unit: String,
        distance_type: String,
    },
}

impl SortKey {
    pub fn field(field: impl Into<String>, order: SortOrder) -> Self {
        Self::Field {
            field: field.into(),
            order,
            nested_path: None,
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            Self::Field { field, .. } | Self::GeoDistance { field, .. } => field,
        }
    }

    pub fn order(&self) -> SortOrder {
        match self {
            Self::Field { order, .. } | Self::GeoDistance { order, .. } => *order,
        }
    }

    pub fn reversed(&self) -> Self {
        let mut key = self.clone();
        match &mut key {
            Self::Field { order, .. } | Self::GeoDistance { order, .. } => {
                *order = order.reverse()
            }
        }
        key
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Field {
                field,
                order,
                nested_path,
            } => {
                let mut body = Map::new();
                body.insert("order".into(), json!(order.as_str()));
                if let Some(path) = nested_path {
                    body.insert("nested".into(), json!({ "path": path }));
                }
                json!({ field: body })
            }
            Self::GeoDistance {
                field,
                pivot,
                order,
                unit,
                distance_type,
            } => {
                let mut body = Map::new();
                if let Some(pivot) = pivot {
                    body.insert(field.clone(), pivot.to_json());
                }
                body.insert("order".into(), json!(order.as_str()));
                body.insert("unit".into(), json!(unit));
                body.insert("distance_type".into(), json!(distance_type));
                json!({ "_geo_distance": body })
            }
        }
    }
}

/// `_source` includes and excludes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl SourceFilter {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// A filter that also returns `path`, plus the source paths it returns only
    /// for that reason. `None` when `path` already comes back.
    pub fn revealing(&self, path: &str) -> Option<(SourceFilter, Vec<String>)> {
        let mut widened = self.clone();
        let mut extra = Vec::new();
        if !self.includes.is_empty() && !self.includes.iter().any(|p| covers(p, path)) {
            widened.includes.push(path.to_string());
            extra.push(path.to_string());
        }
        let (hiding, kept): (Vec<String>, Vec<String>) =
            self.excludes.iter().cloned().partition(|p| covers(p, path));
        widened.excludes = kept;
        extra.extend(hiding);
        (!extra.is_empty()).then_some((widened, extra))
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if !self.includes.is_empty() {
            body.insert("includes".into(), json!(self.includes));
        }
        if !self.excludes.is_empty() {
            body.insert("excludes".into(), json!(self.excludes));
        }
        Value::Object(body)
    }
}

/// Whether the source pattern `pattern` names `path` or one of its parents.
fn covers(pattern: &str, path: &str) -> bool {
    path == pattern
        || path
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Highlight block: per-field options keyed by document path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlight {
    pub fields: Vec<(String, Map<String, Value>)>,
}

impl Highlight {
    pub fn to_json(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|(path, options)| (path.clone(), Value::Object(options.clone())))
            .collect();
        json!({ "fields": fields })
    }
}
