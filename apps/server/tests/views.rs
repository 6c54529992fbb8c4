mod support;

use axum::http::StatusCode;
use serde_json::json;
use support::*;

#[tokio::test]
async fn list_filters_orders_and_links_pages() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(23, books(11..=20)));

    let (status, body) = app
        .get_json("/books/?state=published&ordering=-published&page=2&page_size=10")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(23));
    assert_eq!(
        body["next"],
        json!("http://api.test/books/?state=published&ordering=-published&page=3&page_size=10")
    );
    assert_eq!(
        body["previous"],
        json!("http://api.test/books/?state=published&ordering=-published&page=1&page_size=10")
    );
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 10);
    assert_eq!(results[0]["title"], json!("Book 11"));
    assert_eq!(
        results[0]["_meta"],
        json!({"score": 1.0, "index": "books", "id": "11"})
    );

    let requests = app.cluster.requests();
    assert_eq!(requests.len(), 1);
    let (index, sent) = &requests[0];
    assert_eq!(index, "books");
    assert_eq!(
        sent["query"]["bool"]["filter"],
        json!([{"term": {"state.raw": "published"}}])
    );
    assert_eq!(sent["sort"], json!([{"publication_date": {"order": "desc"}}]));
    assert_eq!(sent["from"], json!(10));
    assert_eq!(sent["size"], json!(10));
    assert_eq!(sent["track_total_hits"], json!(true));
    assert_eq!(sent["timeout"], json!("30000ms"));
    Ok(())
}

#[tokio::test]
async fn repeated_values_are_ored_and_fields_anded() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, _) = app
        .get_json("/books/?state=published&state=draft&category=fiction&pages__gte=100")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.cluster.last_body()["query"]["bool"]["filter"],
        json!([
            {"terms": {"state.raw": ["published", "draft"]}},
            {"term": {"category.raw": "fiction"}},
            {"range": {"pages": {"gte": 100}}}
        ])
    );
    Ok(())
}

#[tokio::test]
async fn unknown_params_and_orderings_are_ignored() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app.get_json("/books/?colour=red&ordering=shelf").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(0));
    assert_eq!(body["next"], json!(null));
    assert_eq!(body["results"], json!([]));

    let sent = app.cluster.last_body();
    assert_eq!(sent["query"], json!({"match_all": {}}));
    assert_eq!(sent["sort"], json!([{"_doc": {"order": "asc"}}]));
    Ok(())
}

#[tokio::test]
async fn search_ranks_by_score() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, _) = app.get_json("/books/?search=potter").await?;
    assert_eq!(status, StatusCode::OK);
    let sent = app.cluster.last_body();
    assert!(!sent["query"]["bool"]["must"].as_array().unwrap().is_empty());
    assert_eq!(sent["sort"], json!([{"_score": {"order": "desc"}}]));
    Ok(())
}

#[tokio::test]
async fn facet_selection_narrows_hits_but_not_counts() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let mut response = search_response(2, books(1..=2));
    response["aggregations"] = json!({
        "_filter_tag": {
            "doc_count": 5,
            "tag": {
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": 0,
                "buckets": [
                    {"key": "python", "doc_count": 2},
                    {"key": "rust", "doc_count": 3}
                ]
            }
        }
    });
    app.cluster.reply(response);

    let (status, body) = app.get_json("/books/?facet=tag:python").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["facets"],
        json!({"tag": {
            "buckets": [
                {"key": "python", "doc_count": 2},
                {"key": "rust", "doc_count": 3}
            ],
            "doc_count_error_upper_bound": 0,
            "sum_other_doc_count": 0
        }})
    );

    let sent = app.cluster.last_body();
    assert_eq!(sent["post_filter"], json!({"term": {"tags.raw": "python"}}));
    assert_eq!(
        sent["aggs"]["_filter_tag"],
        json!({"filter": {"match_all": {}}, "aggs": {"tag": {"terms": {"field": "tags.raw"}}}})
    );
    Ok(())
}

#[tokio::test]
async fn count_sends_a_sizeless_search() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(7, Vec::new()));

    let (status, body) = app.get_json("/books/count/?state=published").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"count": 7}));
    let sent = app.cluster.last_body();
    assert_eq!(sent["size"], json!(0));
    assert_eq!(
        sent["query"]["bool"]["filter"],
        json!([{"term": {"state.raw": "published"}}])
    );
    Ok(())
}

#[tokio::test]
async fn retrieve_returns_the_single_match() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster
        .reply(search_response(1, vec![book("42", "The Hobbit")]));

    let (status, body) = app.get_json("/books/42/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], json!("The Hobbit"));
    assert_eq!(body["_meta"]["id"], json!("42"));

    let sent = app.cluster.last_body();
    assert_eq!(
        sent["query"]["bool"]["filter"],
        json!([{"ids": {"values": ["42"]}}])
    );
    assert_eq!(sent["size"], json!(2));
    Ok(())
}

#[tokio::test]
async fn retrieve_without_trailing_slash() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster
        .reply(search_response(1, vec![book("42", "The Hobbit")]));

    let (status, body) = app.get_json("/books/42").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_meta"]["id"], json!("42"));
    Ok(())
}

#[tokio::test]
async fn retrieve_missing_or_ambiguous_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(0, Vec::new()));
    app.cluster.reply(search_response(2, books(1..=2)));

    let (status, body) = app.get_json("/books/404/").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Not found."}));

    let (status, _) = app.get_json("/books/1/").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn object_rule_hides_documents() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let headers = [("x-api-key", API_KEY)];
    app.cluster.reply(search_response(
        1,
        vec![hit("publishers", "7", json!({"name": "Acme", "visibility": "private"}))],
    ));
    app.cluster.reply(search_response(
        1,
        vec![hit("publishers", "8", json!({"name": "Orbit", "visibility": "public"}))],
    ));

    let (status, _) = app.get_json_with_headers("/publishers/7/", &headers).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get_json_with_headers("/publishers/8/", &headers).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Orbit"));
    Ok(())
}

#[tokio::test]
async fn object_rule_reads_fields_outside_the_source_filter() -> anyhow::Result<()> {
    let app = TestApp::new_with_config(|config| {
        config.views[1].definition.source.includes = vec!["name".into()];
    })?;
    app.cluster.reply(search_response(
        1,
        vec![hit("publishers", "8", json!({"name": "Orbit", "visibility": "public"}))],
    ));

    let (status, body) = app
        .get_json_with_headers("/publishers/8/", &[("x-api-key", API_KEY)])
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Orbit"));
    assert!(body.get("visibility").is_none(), "{body}");
    assert_eq!(
        app.cluster.last_body()["_source"],
        json!({"includes": ["name", "visibility"]})
    );
    Ok(())
}

#[tokio::test]
async fn more_like_this_seeds_from_the_document() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster
        .reply(search_response(1, vec![book("42", "The Hobbit")]));
    app.cluster.reply(search_response(2, books(1..=2)));

    let (status, body) = app.get_json("/books/42/more_like_this/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let requests = app.cluster.requests();
    assert_eq!(requests.len(), 2);
    let sent = &requests[1].1;
    assert_eq!(
        sent["query"]["bool"]["must"],
        json!([{"more_like_this": {
            "fields": ["title", "summary"],
            "like": [{"_index": "books", "_id": "42"}],
            "min_term_freq": 2,
            "max_query_terms": 25,
            "min_doc_freq": 5,
            "include": false
        }}])
    );
    assert_eq!(sent["sort"], json!([{"_score": {"order": "desc"}}]));
    Ok(())
}

#[tokio::test]
async fn more_like_this_for_a_missing_document() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, _) = app.get_json("/books/nope/more_like_this/").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.cluster.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn geo_distance_filter_and_ordering() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, _) = app
        .get_json_with_headers(
            "/publishers/?location__geo_distance=100km%7C40.7%7C-74.0&ordering=location",
            &[("x-api-key", API_KEY)],
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let sent = app.cluster.last_body();
    assert_eq!(
        sent["query"]["bool"]["filter"],
        json!([{"geo_distance": {"distance": "100km", "location": {"lat": 40.7, "lon": -74.0}}}])
    );
    assert_eq!(
        sent["sort"][0]["_geo_distance"]["location"],
        json!({"lat": 40.7, "lon": -74.0})
    );
    Ok(())
}
