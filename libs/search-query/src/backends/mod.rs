//! Filter backends
//!
//! Each backend is a pure function from (request, context, view) to a new request.
//! A view's chain is an ordered list of [`BackendKind`] values folded over the base
//! request by [`apply_chain`].

pub mod faceting;
pub mod filtering;
pub mod functional_suggester;
pub mod geo;
pub mod highlight;
pub mod ids;
pub mod more_like_this;
pub mod nested;
pub mod ordering;
pub mod post_filter;
pub mod search;
pub mod source;
pub mod suggester;

use serde::Deserialize;

use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::{QueryError, Result};
use crate::fields::FieldConfig;
use crate::lookup::Lookup;
use crate::params::{parse_param_name, QueryParams};
use crate::request::SearchRequest;
use crate::view::ViewConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Source,
    #[serde(alias = "compound_search")]
    Search,
    Filtering,
    Ids,
    Ordering,
    Nested,
    #[serde(alias = "geo")]
    GeoSpatial,
    #[serde(alias = "faceting")]
    FacetedSearch,
    PostFilter,
    Suggester,
    FunctionalSuggester,
    Highlight,
    MoreLikeThis,
}

/// Chain used when a view does not declare `filter_backends`.
pub const DEFAULT_CHAIN: &[BackendKind] = &[
    BackendKind::Source,
    BackendKind::Search,
    BackendKind::Filtering,
    BackendKind::Ids,
    BackendKind::Ordering,
    BackendKind::Nested,
    BackendKind::GeoSpatial,
    BackendKind::FacetedSearch,
    BackendKind::PostFilter,
    BackendKind::Suggester,
    BackendKind::Highlight,
    BackendKind::MoreLikeThis,
];

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Search => "search",
            Self::Filtering => "filtering",
            Self::Ids => "ids",
            Self::Ordering => "ordering",
            Self::Nested => "nested",
            Self::GeoSpatial => "geo_spatial",
            Self::FacetedSearch => "faceted_search",
            Self::PostFilter => "post_filter",
            Self::Suggester => "suggester",
            Self::FunctionalSuggester => "functional_suggester",
            Self::Highlight => "highlight",
            Self::MoreLikeThis => "more_like_this",
        }
    }

    pub fn apply(
        self,
        request: &SearchRequest,
        ctx: &SearchContext,
        view: &ViewConfig,
    ) -> Result<SearchRequest> {
        match self {
            Self::Source => source::apply(request, ctx, view),
            Self::Search => search::apply(request, ctx, view),
            Self::Filtering => filtering::apply(request, ctx, view),
            Self::Ids => ids::apply(request, ctx, view),
            Self::Ordering => ordering::apply(request, ctx, view),
            Self::Nested => nested::apply(request, ctx, view),
            Self::GeoSpatial => geo::apply(request, ctx, view),
            Self::FacetedSearch => faceting::apply(request, ctx, view),
            Self::PostFilter => post_filter::apply(request, ctx, view),
            Self::Suggester => suggester::apply(request, ctx, view),
            Self::FunctionalSuggester => functional_suggester::apply(request, ctx, view),
            Self::Highlight => highlight::apply(request, ctx, view),
            Self::MoreLikeThis => more_like_this::apply(request, ctx, view),
        }
    }
}

/// Run `chain` over `base`, in order.
pub fn apply_chain(
    chain: &[BackendKind],
    base: &SearchRequest,
    ctx: &SearchContext,
    view: &ViewConfig,
) -> Result<SearchRequest> {
    chain.iter().try_fold(base.clone(), |request, backend| {
        let next = backend.apply(&request, ctx, view)?;
        tracing::trace!(backend = backend.name(), "applied filter backend");
        Ok(next)
    })
}

/// Clauses produced by request parameters addressing `fields`.
///
/// Parameters are grouped per (field, lookup) in order of first appearance; each
/// group yields one clause. Parameters naming other fields are ignored, so only
/// declared fields can ever reach the query.
pub(crate) fn field_clauses<'a>(
    fields: &'a [FieldConfig],
    params: &QueryParams,
) -> Result<Vec<(&'a FieldConfig, Query)>> {
    let mut groups: Vec<(&FieldConfig, Lookup, String, Vec<&str>)> = Vec::new();
    for (key, value) in params.items() {
        let name = parse_param_name(key);
        let Some(field) = fields.iter().find(|f| f.name == name.field) else {
            continue;
        };
        if let Some(modifier) = name.modifier {
            return Err(QueryError::InvalidParameter(format!(
                "unsupported modifier '{modifier}' in '{key}'"
            )));
        }
        let lookup = field.resolve_lookup(name.lookup)?;
        match groups
            .iter_mut()
            .find(|(f, l, _, _)| f.name == field.name && *l == lookup)
        {
            Some((_, _, _, values)) => values.push(value),
            None => groups.push((field, lookup, key.clone(), vec![value.as_str()])),
        }
    }

    let mut clauses = Vec::with_capacity(groups.len());
    for (field, lookup, key, values) in groups {
        if let Some(query) = lookup.build(field, &key, &values)? {
            clauses.push((field, query));
        }
    }
    Ok(clauses)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::{Action, SearchContext};
    use crate::params::QueryParams;
    use crate::view::{ViewConfig, ViewDefinition};

    pub fn view(value: serde_json::Value) -> ViewConfig {
        let definition: ViewDefinition = serde_json::from_value(value).unwrap();
        definition.resolve().unwrap()
    }

    pub fn ctx(query: &str) -> SearchContext {
        SearchContext::new(Action::List, QueryParams::from_query(query))
    }
}
