use serde_json::{json, Value};
use sieve::config::{Config, ViewEntry};

pub const CURSOR_SECRET: &str = "test-cursor-secret";
pub const API_KEY: &str = "test-api-key";

fn view(value: Value) -> ViewEntry {
    serde_json::from_value(value).expect("valid view fixture")
}

/// Book catalogue with filters, facets, suggesters and more-like-this.
pub fn books_view() -> ViewEntry {
    view(json!({
        "name": "books",
        "index": "books",
        "search_fields": ["title^2", "summary"],
        "filter_fields": {
            "state": "state.raw",
            "category": "category.raw",
            "title": {"field": "title.raw", "lookups": ["term", "prefix", "contains"]},
            "pages": {"kind": "integer", "lookups": ["range", "gte", "lte", "term"]}
        },
        "ordering_fields": {
            "published": "publication_date",
            "title": "title.raw"
        },
        "faceted_search_fields": {
            "tag": {"field": "tags.raw"}
        },
        "suggester_fields": {
            "title_suggest": {
                "field": "title.suggest",
                "suggesters": ["completion"],
                "completion_options": {
                    "category_filters": {"title_suggest_context_category": "category"}
                }
            }
        },
        "functional_suggester_fields": {
            "title_fsuggest": {
                "field": "title.raw",
                "suggesters": ["completion_prefix"],
                "serializer_field": "title",
                "options": {"size": 5}
            }
        },
        "mlt_options": {"fields": ["title", "summary"]}
    }))
}

/// Publishers behind an api key, with geo filters and limit/offset paging.
pub fn publishers_view() -> ViewEntry {
    view(json!({
        "name": "publishers",
        "index": "publishers",
        "pagination_class": "limit_offset",
        "permission": "api_key",
        "object_permission": {"field": "visibility", "equals": "public"},
        "filter_fields": {"country": "country.raw"},
        "geo_spatial_filter_fields": {"location": "location"},
        "ordering_fields": {
            "name": "name.raw",
            "location": {"field": "location", "kind": "geo_point"}
        }
    }))
}

/// The book index again, paged with signed cursors.
pub fn book_feed_view() -> ViewEntry {
    view(json!({
        "name": "book_feed",
        "index": "books",
        "pagination_class": "cursor",
        "page_size": 2,
        "ordering_fields": {"published": "publication_date"},
        "ordering": ["-published"]
    }))
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.pagination.cursor_secret = Some(CURSOR_SECRET.to_string());
    config.auth.api_keys = vec![API_KEY.to_string()];
    config.views = vec![books_view(), publishers_view(), book_feed_view()];
    config
}

/// A `_search` response with `total` matches and the given hits.
pub fn search_response(total: u64, hits: Vec<Value>) -> Value {
    json!({
        "took": 3,
        "timed_out": false,
        "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
        "hits": {
            "total": {"value": total, "relation": "eq"},
            "max_score": 1.0,
            "hits": hits
        }
    })
}

pub fn hit(index: &str, id: &str, source: Value) -> Value {
    json!({
        "_index": index,
        "_id": id,
        "_score": 1.0,
        "_source": source
    })
}

pub fn book(id: &str, title: &str) -> Value {
    hit(
        "books",
        id,
        json!({"title": title, "state": "published", "tags": ["python"]}),
    )
}

/// A book hit carrying the sort values cursor paging needs.
pub fn sorted_book(id: &str, published: i64) -> Value {
    let mut value = book(id, &format!("Book {id}"));
    value["sort"] = json!([published, id]);
    value
}

pub fn books(ids: std::ops::RangeInclusive<u32>) -> Vec<Value> {
    ids.map(|id| book(&id.to_string(), &format!("Book {id}")))
        .collect()
}
