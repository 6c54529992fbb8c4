//! Field configuration records
//!
//! Declared fields are normalized into [`FieldConfig`] once, when a view is
//! resolved. Request handling only ever reads them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueryError, Result};
use crate::lookup::{Lookup, DEFAULT_LOOKUPS, GEO_LOOKUPS};
use crate::params::{parse_bool, RESERVED_KEYS};

/// Mapping type of a declared field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Keyword,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    GeoPoint,
    GeoShape,
    Nested,
    Ip,
}

impl FieldKind {
    pub fn is_geo(self) -> bool {
        matches!(self, Self::GeoPoint | Self::GeoShape)
    }

    /// Convert a raw query-string value into the JSON value sent to the cluster.
    pub fn coerce(self, param: &str, raw: &str) -> Result<Value> {
        let raw = raw.trim();
        match self {
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| QueryError::invalid_value(param, format!("'{raw}' is not an integer"))),
            Self::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from)
                .ok_or_else(|| QueryError::invalid_value(param, format!("'{raw}' is not a number"))),
            Self::Boolean => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| QueryError::invalid_value(param, format!("'{raw}' is not a boolean"))),
            _ => Ok(Value::String(raw.to_string())),
        }
    }
}

/// Normalized configuration of one declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConfig {
    /// Name used in query-string parameters.
    pub name: String,
    /// Dotted path into the indexed document.
    pub document_path: String,
    pub kind: FieldKind,
    pub allowed_lookups: Vec<Lookup>,
    pub default_lookup: Lookup,
    /// Path of the enclosing nested object, for nested fields.
    pub nested_path: Option<String>,
    /// Date-parse format forwarded on range queries.
    pub format: Option<String>,
}

impl FieldConfig {
    /// A field with the default lookups for its kind.
    pub fn new(name: &str, document_path: &str, kind: FieldKind) -> Self {
        let (allowed_lookups, default_lookup) = if kind.is_geo() {
            (GEO_LOOKUPS.to_vec(), Lookup::GeoDistance)
        } else {
            (DEFAULT_LOOKUPS.to_vec(), Lookup::Term)
        };
        Self {
            name: name.to_string(),
            document_path: document_path.to_string(),
            kind,
            allowed_lookups,
            default_lookup,
            nested_path: None,
            format: None,
        }
    }

    /// Lookup to apply for a parameter suffix, falling back to the default lookup.
    pub fn resolve_lookup(&self, suffix: Option<&str>) -> Result<Lookup> {
        let Some(suffix) = suffix else {
            return Ok(self.default_lookup);
        };
        let lookup = Lookup::from_name(suffix).ok_or_else(|| QueryError::UnknownLookup {
            field: self.name.clone(),
            lookup: suffix.to_string(),
        })?;
        if !self.allowed_lookups.contains(&lookup) {
            return Err(QueryError::DisallowedLookup {
                field: self.name.clone(),
                lookup: suffix.to_string(),
            });
        }
        Ok(lookup)
    }
}

/// Declarative form of a field: either a bare document path or a table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Path(String),
    Table(FieldTable),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldTable {
    pub field: Option<String>,
    pub kind: Option<FieldKind>,
    pub lookups: Option<Vec<String>>,
    pub default_lookup: Option<String>,
    pub path: Option<String>,
    pub format: Option<String>,
}

/// Where a field mapping is declared; drives the defaults and checks applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Filter,
    Nested,
    Geo,
}

impl FieldRole {
    fn mapping(self) -> &'static str {
        match self {
            Self::Filter => "filter_fields",
            Self::Nested => "nested_filter_fields",
            Self::Geo => "geo_spatial_filter_fields",
        }
    }
}

/// Normalize one declared field.
pub fn resolve_field(name: &str, spec: &FieldSpec, role: FieldRole) -> Result<FieldConfig> {
    let invalid = |msg: String| QueryError::InvalidFieldConfig(format!("{}.{name}: {msg}", role.mapping()));

    if name.is_empty() || name.contains(crate::params::LOOKUP_SEPARATOR) {
        return Err(invalid("field names must be non-empty and free of '__'".into()));
    }
    if RESERVED_KEYS.contains(&name) {
        return Err(invalid(format!("'{name}' is a reserved parameter")));
    }

    let table = match spec {
        FieldSpec::Path(path) => FieldTable {
            field: Some(path.clone()),
            ..Default::default()
        },
        FieldSpec::Table(table) => table.clone(),
    };

    let document_path = table.field.clone().unwrap_or_else(|| name.to_string());
    let kind = match (table.kind, role) {
        (Some(kind), _) => kind,
        (None, FieldRole::Geo) => FieldKind::GeoPoint,
        (None, FieldRole::Nested) => FieldKind::Nested,
        (None, FieldRole::Filter) => FieldKind::Keyword,
    };

    match role {
        FieldRole::Geo if !kind.is_geo() => {
            return Err(invalid(format!("geo fields must be geo_point or geo_shape, got {kind:?}")));
        }
        FieldRole::Nested if kind.is_geo() => {
            return Err(invalid("nested filter fields cannot be geo fields".into()));
        }
        FieldRole::Filter if kind == FieldKind::Nested => {
            return Err(invalid("nested fields belong in nested_filter_fields".into()));
        }
        _ => {}
    }

    let mut config = FieldConfig::new(name, &document_path, kind);
    config.format = table.format.clone();

    if role == FieldRole::Nested {
        let path = table
            .path
            .clone()
            .ok_or_else(|| invalid("nested fields require a 'path'".into()))?;
        config.nested_path = Some(path);
    } else if table.path.is_some() {
        return Err(invalid("'path' is only valid on nested fields".into()));
    }

    if let Some(names) = &table.lookups {
        let mut lookups = Vec::with_capacity(names.len());
        for lookup_name in names {
            let lookup = Lookup::from_name(lookup_name)
                .ok_or_else(|| invalid(format!("unknown lookup '{lookup_name}'")))?;
            if lookup.is_geo() && !kind.is_geo() {
                return Err(invalid(format!("geo lookup '{lookup_name}' on a non-geo field")));
            }
            if !lookups.contains(&lookup) {
                lookups.push(lookup);
            }
        }
        if lookups.is_empty() {
            return Err(invalid("'lookups' must not be empty".into()));
        }
        config.default_lookup = lookups[0];
        config.allowed_lookups = lookups;
    }

    if let Some(default_name) = &table.default_lookup {
        let lookup = Lookup::from_name(default_name)
            .ok_or_else(|| invalid(format!("unknown default lookup '{default_name}'")))?;
        if !config.allowed_lookups.contains(&lookup) {
            return Err(invalid(format!(
                "default lookup '{default_name}' is not among the allowed lookups"
            )));
        }
        config.default_lookup = lookup;
    }

    Ok(config)
}

/// Normalize every field of one mapping, in declaration order.
pub fn resolve_fields(fields: &[(String, FieldSpec)], role: FieldRole) -> Result<Vec<FieldConfig>> {
    fields
        .iter()
        .map(|(name, spec)| resolve_field(name, spec, role))
        .collect()
}

/// A full-text search field with an optional boost (`title^2`).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchField {
    pub name: String,
    pub document_path: String,
    pub boost: Option<f64>,
}

impl SearchField {
    /// Field reference as used in `multi_match` field lists.
    pub fn boosted_path(&self) -> String {
        match self.boost {
            Some(boost) => format!("{}^{}", self.document_path, boost),
            None => self.document_path.clone(),
        }
    }
}

/// Parse `name[^boost]`.
pub fn parse_search_field(raw: &str) -> Result<SearchField> {
    let (name, boost) = match raw.split_once('^') {
        Some((name, boost)) => {
            let boost = boost.trim().parse::<f64>().map_err(|_| {
                QueryError::InvalidFieldConfig(format!("search_fields: invalid boost in '{raw}'"))
            })?;
            (name.trim(), Some(boost))
        }
        None => (raw.trim(), None),
    };
    if name.is_empty() {
        return Err(QueryError::InvalidFieldConfig(
            "search_fields: empty field name".into(),
        ));
    }
    Ok(SearchField {
        name: name.to_string(),
        document_path: name.to_string(),
        boost,
    })
}

/// Read an optional option value out of an options table.
pub(crate) fn option_u64(options: &Map<String, Value>, key: &str) -> Option<u64> {
    options.get(key).and_then(Value::as_u64)
}
