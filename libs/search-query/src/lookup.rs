//! Lookup-operator registry
//!
//! A lookup is the `__<name>` suffix of a filter parameter (`price__gte=10`). The
//! set is closed: every lookup is a [`Lookup`] variant registered in [`REGISTRY`]
//! together with the function that turns parameter values into a query clause.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::backends::geo;
use crate::dsl::{Query, RangeBounds};
use crate::error::{QueryError, Result};
use crate::fields::FieldConfig;
use crate::params::{parse_bool, split_positional, split_values};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Term,
    Terms,
    Range,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
    Missing,
    Prefix,
    Wildcard,
    Regexp,
    Contains,
    In,
    EndsWith,
    StartsWith,
    IsNull,
    Exclude,
    GeoDistance,
    GeoPolygon,
    GeoBoundingBox,
    Query,
    Ids,
}

/// Builds the clause for one occurrence of a lookup parameter.
type Builder = fn(&FieldConfig, &str, &str) -> Result<Option<Query>>;

/// Registered lookups: query-string name, variant, clause builder.
pub const REGISTRY: &[(&str, Lookup, Builder)] = &[
    ("term", Lookup::Term, build_term),
    ("terms", Lookup::Terms, build_terms),
    ("range", Lookup::Range, build_range),
    ("gt", Lookup::Gt, build_gt),
    ("gte", Lookup::Gte, build_gte),
    ("lt", Lookup::Lt, build_lt),
    ("lte", Lookup::Lte, build_lte),
    ("exists", Lookup::Exists, build_exists),
    ("missing", Lookup::Missing, build_missing),
    ("prefix", Lookup::Prefix, build_prefix),
    ("wildcard", Lookup::Wildcard, build_wildcard),
    ("regexp", Lookup::Regexp, build_regexp),
    ("contains", Lookup::Contains, build_contains),
    ("in", Lookup::In, build_terms),
    ("endswith", Lookup::EndsWith, build_endswith),
    ("startswith", Lookup::StartsWith, build_prefix),
    ("isnull", Lookup::IsNull, build_missing),
    ("exclude", Lookup::Exclude, build_exclude),
    ("geo_distance", Lookup::GeoDistance, geo::build_geo_distance),
    ("geo_polygon", Lookup::GeoPolygon, geo::build_geo_polygon),
    (
        "geo_bounding_box",
        Lookup::GeoBoundingBox,
        geo::build_geo_bounding_box,
    ),
    ("query", Lookup::Query, build_query_string),
    ("ids", Lookup::Ids, build_ids),
];

/// Lookups a plain declared field allows when none are configured.
pub const DEFAULT_LOOKUPS: &[Lookup] = &[Lookup::Term, Lookup::Terms, Lookup::Exists, Lookup::In];

/// Lookups a geo field allows when none are configured.
pub const GEO_LOOKUPS: &[Lookup] = &[
    Lookup::GeoDistance,
    Lookup::GeoPolygon,
    Lookup::GeoBoundingBox,
];

impl Lookup {
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, lookup, _)| *lookup)
    }

    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, lookup, _)| *lookup == self)
            .map(|(n, _, _)| *n)
            .unwrap_or("term")
    }

    fn builder(self) -> Builder {
        REGISTRY
            .iter()
            .find(|(_, lookup, _)| *lookup == self)
            .map(|(_, _, builder)| *builder)
            .unwrap_or(build_term)
    }

    pub fn is_geo(self) -> bool {
        GEO_LOOKUPS.contains(&self)
    }

    /// Lookups whose values from repeated parameters merge into one `terms` clause.
    fn merges_into_terms(self) -> bool {
        matches!(self, Self::Term | Self::Terms | Self::In)
    }

    /// Turn every value given for this lookup on `field` into a single clause.
    ///
    /// Repeated occurrences are ORed; term-like lookups collapse into one `terms`
    /// clause and `exclude` into one negated `terms` clause.
    pub fn build(self, field: &FieldConfig, param: &str, values: &[&str]) -> Result<Option<Query>> {
        if self.merges_into_terms() || self == Self::Exclude {
            let mut typed = Vec::new();
            for value in values {
                let parts = if self == Self::Term {
                    vec![value.trim().to_string()]
                } else {
                    split_values(value)
                };
                for part in parts.iter().filter(|p| !p.is_empty()) {
                    let v = field.kind.coerce(param, part)?;
                    if !typed.contains(&v) {
                        typed.push(v);
                    }
                }
            }
            if typed.is_empty() {
                return Ok(None);
            }
            let query = Query::term_or_terms(&field.document_path, typed);
            return Ok(Some(if self == Self::Exclude {
                Query::not(query)
            } else {
                query
            }));
        }

        let build = self.builder();
        let mut clauses = Vec::with_capacity(values.len());
        for value in values {
            if let Some(query) = build(field, param, value)? {
                clauses.push(query);
            }
        }
        Ok(match clauses.len() {
            0 => None,
            _ => Some(Query::or(clauses)),
        })
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lookup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown lookup '{s}'"))
    }
}

fn build_term(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Query::Term {
        field: field.document_path.clone(),
        value: field.kind.coerce(param, value)?,
    }))
}

fn build_terms(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let values = split_values(value)
        .iter()
        .map(|v| field.kind.coerce(param, v))
        .collect::<Result<Vec<_>>>()?;
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(Query::term_or_terms(&field.document_path, values)))
}

fn build_exclude(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    Ok(build_terms(field, param, value)?.map(Query::not))
}

fn parse_boost(param: &str, raw: Option<&&str>) -> Result<Option<f64>> {
    match raw.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| QueryError::invalid_value(param, format!("invalid boost '{raw}'"))),
    }
}

fn build_range(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let parts = split_positional(value);
    if parts.len() > 3 {
        return Err(QueryError::invalid_value(
            param,
            "expected 'lower|upper[|boost]'",
        ));
    }
    let bound = |raw: Option<&&str>| -> Result<Option<Value>> {
        match raw.filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(raw) => field.kind.coerce(param, raw).map(Some),
        }
    };
    let bounds = RangeBounds {
        gte: bound(parts.first())?,
        lte: bound(parts.get(1))?,
        boost: parse_boost(param, parts.get(2))?,
        format: field.format.clone(),
        ..Default::default()
    };
    if bounds.is_empty() {
        return Err(QueryError::invalid_value(param, "range needs at least one bound"));
    }
    Ok(Some(Query::Range {
        field: field.document_path.clone(),
        bounds,
    }))
}

fn build_comparison(
    field: &FieldConfig,
    param: &str,
    value: &str,
    set: fn(&mut RangeBounds, Value),
) -> Result<Option<Query>> {
    let parts = split_positional(value);
    let Some(raw) = parts.first().filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if parts.len() > 2 {
        return Err(QueryError::invalid_value(param, "expected 'value[|boost]'"));
    }
    let mut bounds = RangeBounds {
        boost: parse_boost(param, parts.get(1))?,
        format: field.format.clone(),
        ..Default::default()
    };
    set(&mut bounds, field.kind.coerce(param, raw)?);
    Ok(Some(Query::Range {
        field: field.document_path.clone(),
        bounds,
    }))
}

fn build_gt(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    build_comparison(field, param, value, |b, v| b.gt = Some(v))
}

fn build_gte(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    build_comparison(field, param, value, |b, v| b.gte = Some(v))
}

fn build_lt(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    build_comparison(field, param, value, |b, v| b.lt = Some(v))
}

fn build_lte(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    build_comparison(field, param, value, |b, v| b.lte = Some(v))
}

fn require_bool(param: &str, value: &str) -> Result<bool> {
    parse_bool(value).ok_or_else(|| {
        QueryError::invalid_value(param, format!("expected a boolean, got '{}'", value.trim()))
    })
}

fn build_exists(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let exists = Query::Exists {
        field: field.document_path.clone(),
    };
    Ok(Some(if require_bool(param, value)? {
        exists
    } else {
        Query::not(exists)
    }))
}

fn build_missing(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let exists = Query::Exists {
        field: field.document_path.clone(),
    };
    Ok(Some(if require_bool(param, value)? {
        Query::not(exists)
    } else {
        exists
    }))
}

fn text_value(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn build_prefix(field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    Ok(text_value(value).map(|value| Query::Prefix {
        field: field.document_path.clone(),
        value,
    }))
}

fn build_wildcard(field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    Ok(text_value(value).map(|value| Query::Wildcard {
        field: field.document_path.clone(),
        value,
    }))
}

fn build_contains(field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    Ok(text_value(value).map(|value| Query::Wildcard {
        field: field.document_path.clone(),
        value: format!("*{value}*"),
    }))
}

fn build_endswith(field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    Ok(text_value(value).map(|value| Query::Wildcard {
        field: field.document_path.clone(),
        value: format!("*{value}"),
    }))
}

fn build_regexp(field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    Ok(text_value(value).map(|value| Query::Regexp {
        field: field.document_path.clone(),
        value,
    }))
}

fn build_query_string(field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    Ok(text_value(value).map(|query| Query::QueryString {
        query,
        fields: vec![field.document_path.clone()],
    }))
}

fn build_ids(_field: &FieldConfig, _param: &str, value: &str) -> Result<Option<Query>> {
    let values = split_values(value);
    Ok((!values.is_empty()).then_some(Query::Ids { values }))
}

/// Extra options given as trailing `key:value` parts (`_name:x|validation_method:y`).
pub(crate) fn parse_options(
    param: &str,
    parts: &[&str],
    allowed: &[&str],
) -> Result<Map<String, Value>> {
    let mut options = Map::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once(':') else {
            return Err(QueryError::invalid_value(
                param,
                format!("expected 'option:value', got '{part}'"),
            ));
        };
        if !allowed.contains(&key) {
            return Err(QueryError::invalid_value(
                param,
                format!("unsupported option '{key}'"),
            ));
        }
        options.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(options)
}
