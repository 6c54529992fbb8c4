//! Per-field filtering
//!
//! `field[__lookup]=value` parameters on declared `filter_fields` become
//! non-scoring clauses. Distinct fields AND together; repeated parameters for one
//! field and lookup OR together.

use super::field_clauses;
use crate::context::SearchContext;
use crate::error::Result;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let mut out = request.clone();
    for (_, clause) in field_clauses(&view.filter_fields, &ctx.params)? {
        out = out.with_filter(clause);
    }
    Ok(out)
}
