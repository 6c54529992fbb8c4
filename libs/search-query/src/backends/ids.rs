//! `ids=<id>|<id>` restricts hits to the given document ids.

use crate::context::SearchContext;
use crate::dsl::Query;
use crate::error::Result;
use crate::params::split_values;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

pub fn apply(request: &SearchRequest, ctx: &SearchContext, _view: &ViewConfig) -> Result<SearchRequest> {
    let mut values: Vec<String> = Vec::new();
    for raw in ctx.params.get_all("ids") {
        for id in split_values(raw) {
            if !values.contains(&id) {
                values.push(id);
            }
        }
    }
    if values.is_empty() {
        return Ok(request.clone());
    }
    Ok(request.clone().with_filter(Query::Ids { values }))
}
