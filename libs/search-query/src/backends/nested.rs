//! Nested filtering
//!
//! Same lookups as plain filtering, with each clause wrapped in a `nested` query on
//! the field's declared path.

use super::field_clauses;
use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::Result;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let mut out = request.clone();
    for (field, clause) in field_clauses(&view.nested_fields, &ctx.params)? {
        let path = field
            .nested_path
            .clone()
            .unwrap_or_else(|| field.document_path.clone());
        out = out.with_filter(Query::Nested {
            path,
            query: Box::new(clause),
        });
    }
    Ok(out)
}
