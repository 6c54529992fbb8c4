//! Per-view configuration
//!
//! [`ViewDefinition`] is the declarative bag read from configuration files.
//! [`ViewDefinition::resolve`] validates it and produces the immutable
//! [`ViewConfig`] every request of the view reads from.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use crate::backends::faceting::{resolve_facets, FacetDefinition, FacetSpec};
use crate::backends::functional_suggester::{
    resolve_functional_suggesters, FunctionalSuggesterConfig, FunctionalSuggesterSpec,
};
use crate::backends::highlight::{resolve_highlight_fields, HighlightField, HighlightSpec};
use crate::backends::more_like_this::MltOptions;
use crate::backends::ordering::{resolve_ordering_fields, OrderingField, OrderingSpec};
use crate::backends::search::{resolve_search_fields, NestedSearch, SearchFieldsSpec};
use crate::backends::suggester::{resolve_suggesters, SuggesterConfig, SuggesterSpec};
use crate::backends::{BackendKind, DEFAULT_CHAIN};
use crate::dsl::SourceFilter;
use crate::error::{QueryError, Result};
use crate::fields::{resolve_fields, FieldConfig, FieldRole, FieldSpec, SearchField};
use crate::pagination::PaginationMode;
use crate::serializer::SerializerDefinition;

/// An ordered string-keyed map, kept in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<T>(pub Vec<(String, T)>);

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> FieldMap<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, T)> {
        self.0.iter()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for FieldMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for FieldMapVisitor<T> {
            type Value = FieldMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of field declarations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    if entries.iter().any(|(k, _): &(String, T)| *k == key) {
                        return Err(serde::de::Error::custom(format!("duplicate field '{key}'")));
                    }
                    entries.push((key, value));
                }
                Ok(FieldMap(entries))
            }
        }

        deserializer.deserialize_map(FieldMapVisitor(PhantomData))
    }
}

/// `_source` includes/excludes declared on the view.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSpec {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// Declarative view configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewDefinition {
    /// Route prefix (`/books/`).
    pub name: String,
    pub index: String,
    pub document_class: Option<String>,
    pub serializer_class: SerializerDefinition,
    pub pagination_class: PaginationMode,
    pub page_size: Option<usize>,
    pub max_page_size: Option<usize>,
    /// Terminal sort key appended for cursor pagination.
    pub cursor_tiebreaker: Option<String>,
    pub filter_backends: Option<Vec<BackendKind>>,
    pub search_fields: SearchFieldsSpec,
    pub search_nested_fields: FieldMap<Vec<String>>,
    pub filter_fields: FieldMap<FieldSpec>,
    pub ordering_fields: FieldMap<OrderingSpec>,
    pub ordering: Vec<String>,
    pub faceted_search_fields: FieldMap<FacetSpec>,
    pub post_filter_fields: FieldMap<FieldSpec>,
    pub suggester_fields: FieldMap<SuggesterSpec>,
    pub functional_suggester_fields: FieldMap<FunctionalSuggesterSpec>,
    pub geo_spatial_filter_fields: FieldMap<FieldSpec>,
    pub nested_filter_fields: FieldMap<FieldSpec>,
    pub highlight_fields: FieldMap<HighlightSpec>,
    pub lookup_field: Option<String>,
    pub source: SourceSpec,
    pub multi_match_options: Map<String, Value>,
    pub simple_query_string_options: Map<String, Value>,
    pub mlt_options: MltOptions,
    pub timeout_seconds: Option<u64>,
}

/// Resolved, immutable view configuration.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub name: String,
    pub index: String,
    pub document_type: Option<String>,
    pub serializer: SerializerDefinition,
    pub pagination: PaginationMode,
    pub page_size: Option<usize>,
    pub max_page_size: Option<usize>,
    pub cursor_tiebreaker: String,
    pub backends: Vec<BackendKind>,
    pub search_fields: Vec<SearchField>,
    pub search_nested_fields: Vec<NestedSearch>,
    pub filter_fields: Vec<FieldConfig>,
    pub ordering_fields: Vec<OrderingField>,
    pub default_ordering: Vec<String>,
    pub facets: Vec<FacetDefinition>,
    pub post_filter_fields: Vec<FieldConfig>,
    pub suggesters: Vec<SuggesterConfig>,
    pub functional_suggesters: Vec<FunctionalSuggesterConfig>,
    pub geo_fields: Vec<FieldConfig>,
    pub nested_fields: Vec<FieldConfig>,
    pub highlight_fields: Vec<HighlightField>,
    pub lookup_field: String,
    pub source: SourceFilter,
    pub multi_match_options: Map<String, Value>,
    pub simple_query_string_options: Map<String, Value>,
    pub mlt: MltOptions,
    pub timeout: Option<Duration>,
}

impl ViewDefinition {
    /// Validate the declaration and build the view's immutable configuration.
    pub fn resolve(&self) -> Result<ViewConfig> {
        let invalid = |msg: String| QueryError::InvalidFieldConfig(format!("view '{}': {msg}", self.name));

        if self.name.trim().is_empty() {
            return Err(QueryError::InvalidFieldConfig("view name must not be empty".into()));
        }
        if self.index.trim().is_empty() {
            return Err(invalid("index must not be empty".into()));
        }

        let backends = self
            .filter_backends
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAIN.to_vec());
        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(*backend) {
                return Err(invalid(format!("backend '{}' listed twice", backend.name())));
            }
        }

        let filter_fields = resolve_fields(&self.filter_fields.0, FieldRole::Filter)?;
        let post_filter_fields = resolve_fields(&self.post_filter_fields.0, FieldRole::Filter)?;
        let geo_fields = resolve_fields(&self.geo_spatial_filter_fields.0, FieldRole::Geo)?;
        let nested_fields = resolve_fields(&self.nested_filter_fields.0, FieldRole::Nested)?;

        let mut names: Vec<(&str, &str)> = Vec::new();
        for (mapping, fields) in [
            ("filter_fields", &filter_fields),
            ("post_filter_fields", &post_filter_fields),
            ("geo_spatial_filter_fields", &geo_fields),
            ("nested_filter_fields", &nested_fields),
        ] {
            for field in fields {
                if let Some((other, _)) = names.iter().find(|(_, n)| *n == field.name) {
                    return Err(invalid(format!(
                        "'{}' is declared in both {other} and {mapping}",
                        field.name
                    )));
                }
                names.push((mapping, field.name.as_str()));
            }
        }

        let (search_fields, search_nested_fields) =
            resolve_search_fields(&self.search_fields, &self.search_nested_fields)?;
        let facets = resolve_facets(&self.faceted_search_fields)?;
        let suggesters = resolve_suggesters(&self.suggester_fields)?;
        let functional_suggesters = resolve_functional_suggesters(&self.functional_suggester_fields)?;

        let lookup_field = self
            .lookup_field
            .clone()
            .unwrap_or_else(|| "id".to_string());
        let cursor_tiebreaker = self
            .cursor_tiebreaker
            .clone()
            .unwrap_or_else(|| "_id".to_string());
        if cursor_tiebreaker.trim().is_empty() {
            return Err(invalid("cursor_tiebreaker must not be empty".into()));
        }
        if let (Some(size), Some(max)) = (self.page_size, self.max_page_size) {
            if size == 0 || size > max {
                return Err(invalid(format!("page_size {size} must be within 1..={max}")));
            }
        }

        Ok(ViewConfig {
            name: self.name.clone(),
            index: self.index.clone(),
            document_type: self.document_class.clone(),
            serializer: self.serializer_class.clone(),
            pagination: self.pagination_class,
            page_size: self.page_size,
            max_page_size: self.max_page_size,
            cursor_tiebreaker,
            backends,
            search_fields,
            search_nested_fields,
            filter_fields,
            ordering_fields: resolve_ordering_fields(&self.ordering_fields)?,
            default_ordering: self.ordering.clone(),
            facets,
            post_filter_fields,
            suggesters,
            functional_suggesters,
            geo_fields,
            nested_fields,
            highlight_fields: resolve_highlight_fields(&self.highlight_fields)?,
            lookup_field,
            source: SourceFilter {
                includes: self.source.includes.clone(),
                excludes: self.source.excludes.clone(),
            },
            multi_match_options: self.multi_match_options.clone(),
            simple_query_string_options: self.simple_query_string_options.clone(),
            mlt: self.mlt_options.clone(),
            timeout: self.timeout_seconds.map(Duration::from_secs),
        })
    }
}

impl ViewConfig {
    pub fn facet(&self, name: &str) -> Option<&FacetDefinition> {
        self.facets.iter().find(|f| f.name == name)
    }

    pub fn suggester(&self, name: &str) -> Option<&SuggesterConfig> {
        self.suggesters.iter().find(|s| s.name == name)
    }

    pub fn uses_backend(&self, backend: BackendKind) -> bool {
        self.backends.contains(&backend)
    }
}
