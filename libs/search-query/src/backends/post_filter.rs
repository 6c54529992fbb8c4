//! Post-filtering
//!
//! Parameters on `post_filter_fields` narrow the hits after aggregations run.
//! A selection on a field that a facet aggregates is attributed to that facet, so
//! the facet keeps its unfiltered counts.

use super::field_clauses;
use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::Result;
use crate::fields::FieldConfig;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

/// Lookups on one field form a single selection (`pages__gte&pages__lte` is one
/// range), so they are ANDed before the request ORs selections per facet.
pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let mut per_field: Vec<(&FieldConfig, Vec<Query>)> = Vec::new();
    for (field, clause) in field_clauses(&view.post_filter_fields, &ctx.params)? {
        match per_field.iter_mut().find(|(f, _)| f.name == field.name) {
            Some((_, clauses)) => clauses.push(clause),
            None => per_field.push((field, vec![clause])),
        }
    }

    let mut out = request.clone();
    for (field, clauses) in per_field {
        let facet = view
            .facets
            .iter()
            .find(|f| f.field == field.document_path)
            .map(|f| f.name.as_str());
        out = out.with_post_filter(facet, Query::and(clauses));
    }
    Ok(out)
}
