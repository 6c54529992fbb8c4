//! `_source` limiting
//!
//! `source=a,b` narrows the returned `_source` to the requested paths that the
//! view's static includes allow, minus its static excludes. When nothing usable
//! remains the view's static filter applies unchanged.

use crate::context::SearchContext;
use crate::dsl::SourceFilter;
use crate::error::Result;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

pub const SOURCE_PARAM: &str = "source";

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let static_filter = &view.source;
    let requested: Vec<String> = ctx
        .params
        .list(SOURCE_PARAM)
        .into_iter()
        .filter(|path| static_filter.includes.is_empty() || static_filter.includes.contains(path))
        .filter(|path| !static_filter.excludes.contains(path))
        .fold(Vec::new(), |mut acc, path| {
            if !acc.contains(&path) {
                acc.push(path);
            }
            acc
        });

    let filter = if requested.is_empty() {
        static_filter.clone()
    } else {
        SourceFilter {
            includes: requested,
            excludes: static_filter.excludes.clone(),
        }
    };
    if filter.is_empty() {
        return Ok(request.clone());
    }
    Ok(request.clone().with_source(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::{ctx, view};
    use serde_json::{json, Value};

    fn source(view: &ViewConfig, query: &str) -> Value {
        apply(&SearchRequest::new("books"), &ctx(query), view)
            .unwrap()
            .to_body()
            .get("_source")
            .cloned()
            .unwrap_or(Value::Null)
    }

    #[test]
    fn unrestricted_view() {
        let view = view(json!({"name": "books", "index": "books"}));
        assert_eq!(source(&view, ""), Value::Null);
        assert_eq!(source(&view, "source=title,isbn"), json!({"includes": ["title", "isbn"]}));
    }

    #[test]
    fn request_intersects_with_static_includes() {
        let view = view(json!({
            "name": "books",
            "index": "books",
            "source": {"includes": ["title", "summary", "isbn"], "excludes": ["internal"]}
        }));
        assert_eq!(
            source(&view, "source=title,secret&source=internal"),
            json!({"includes": ["title"], "excludes": ["internal"]})
        );
        assert_eq!(
            source(&view, "source=secret"),
            json!({"includes": ["title", "summary", "isbn"], "excludes": ["internal"]})
        );
    }
}
