//! Ordering
//!
//! `ordering=title,-published` sorts by allow-listed fields; a leading `-` sorts
//! descending. Unknown entries are dropped so old URLs keep working when a view's
//! schema changes. Without a usable ordering the view's default applies, then
//! `_score` for searches and `_doc` otherwise.

use serde::Deserialize;

use super::geo::{parse_lat_lon, validate_distance_type};
use super::search::is_search_requested;
use crate::context::SearchContext;
use crate::dsl::{SortKey, SortOrder};
use crate::error::{QueryError, Result};
use crate::fields::FieldKind;
use crate::params::split_positional;
use crate::request::SearchRequest;
use crate::view::{FieldMap, ViewConfig};

pub const ORDERING_PARAM: &str = "ordering";

const DEFAULT_UNIT: &str = "m";
const DEFAULT_DISTANCE_TYPE: &str = "arc";
/// Sort keys the cluster understands without a declared field.
const BUILTIN_KEYS: &[&str] = &["_score", "_doc", "_id"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OrderingSpec {
    Path(String),
    Table(OrderingTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderingTable {
    pub field: Option<String>,
    /// Enclosing nested object.
    pub path: Option<String>,
    pub kind: Option<FieldKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderingField {
    pub name: String,
    pub document_path: String,
    pub nested_path: Option<String>,
    /// Sort by distance instead of by value.
    pub geo: bool,
}

pub fn resolve_ordering_fields(spec: &FieldMap<OrderingSpec>) -> Result<Vec<OrderingField>> {
    spec.iter()
        .map(|(name, entry)| {
            if name.is_empty() || name.starts_with('-') || name.contains('|') {
                return Err(QueryError::InvalidFieldConfig(format!(
                    "ordering_fields: invalid name '{name}'"
                )));
            }
            Ok(match entry {
                OrderingSpec::Path(path) => OrderingField {
                    name: name.clone(),
                    document_path: path.clone(),
                    nested_path: None,
                    geo: false,
                },
                OrderingSpec::Table(table) => OrderingField {
                    name: name.clone(),
                    document_path: table.field.clone().unwrap_or_else(|| name.clone()),
                    nested_path: table.path.clone(),
                    geo: table.kind.map(FieldKind::is_geo).unwrap_or(false),
                },
            })
        })
        .collect()
}

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let requested = ctx.params.list(ORDERING_PARAM);
    let mut sort = sort_keys(view, &requested, false)?;
    if sort.is_empty() {
        sort = sort_keys(view, &view.default_ordering, true)?;
    }
    if sort.is_empty() {
        sort.push(if is_search_requested(ctx) || ctx.object_id.is_some() {
            SortKey::field("_score", SortOrder::Desc)
        } else {
            SortKey::field("_doc", SortOrder::Asc)
        });
    }
    Ok(request.clone().with_sort(sort))
}

fn sort_keys(view: &ViewConfig, entries: &[String], allow_builtin: bool) -> Result<Vec<SortKey>> {
    let mut keys: Vec<SortKey> = Vec::new();
    for entry in entries {
        let Some(key) = sort_key(view, entry, allow_builtin)? else {
            tracing::debug!(entry = %entry, view = %view.name, "dropping unknown ordering");
            continue;
        };
        if !keys.iter().any(|k| k.field_name() == key.field_name()) {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn sort_key(view: &ViewConfig, entry: &str, allow_builtin: bool) -> Result<Option<SortKey>> {
    let (order, entry) = match entry.strip_prefix('-') {
        Some(rest) => (SortOrder::Desc, rest),
        None => (SortOrder::Asc, entry),
    };
    let parts = split_positional(entry);
    let name = parts[0];

    if allow_builtin && BUILTIN_KEYS.contains(&name) {
        return Ok(Some(SortKey::field(name, order)));
    }
    let Some(field) = view.ordering_fields.iter().find(|f| f.name == name) else {
        return Ok(None);
    };
    if !field.geo {
        return Ok(Some(SortKey::Field {
            field: field.document_path.clone(),
            order,
            nested_path: field.nested_path.clone(),
        }));
    }

    let param = ORDERING_PARAM;
    let pivot = match parts.len() {
        1 => None,
        2 => {
            return Err(QueryError::bad_geo(param, format!("expected '{name}|lat|lon', got '{entry}'")));
        }
        _ => Some(parse_lat_lon(param, parts[1], parts[2])?),
    };
    let unit = parts
        .get(3)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| DEFAULT_UNIT.to_string());
    let distance_type = match parts.get(4).filter(|s| !s.is_empty()) {
        Some(raw) => validate_distance_type(param, raw)?,
        None => DEFAULT_DISTANCE_TYPE.to_string(),
    };
    Ok(Some(SortKey::GeoDistance {
        field: field.document_path.clone(),
        pivot,
        order,
        unit,
        distance_type,
    }))
}
