mod support;

use axum::http::StatusCode;
use serde_json::json;
use support::*;

#[tokio::test]
async fn page_beyond_the_last_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(23, Vec::new()));

    let (status, body) = app.get_json("/books/?page=5").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
    Ok(())
}

#[tokio::test]
async fn invalid_page_numbers_never_reach_the_cluster() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    for query in ["page=0", "page=-1", "page=two"] {
        let (status, _) = app.get_json(&format!("/books/?{query}")).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{query}");
    }
    assert!(app.cluster.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn last_page_counts_the_total_first() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(23, Vec::new()));
    app.cluster.reply(search_response(23, books(21..=23)));

    let (status, body) = app.get_json("/books/?page=last&page_size=10").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next"], json!(null));
    assert_eq!(
        body["previous"],
        json!("http://api.test/books/?page=2&page_size=10")
    );

    let requests = app.cluster.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].1["size"], json!(0));
    assert_eq!(requests[1].1["from"], json!(20));
    assert_eq!(requests[1].1["size"], json!(10));
    Ok(())
}

#[tokio::test]
async fn page_size_is_clamped() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, _) = app.get_json("/books/?page_size=5000").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.cluster.last_body()["size"], json!(100));
    Ok(())
}

#[tokio::test]
async fn limit_offset_links() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(
        12,
        (6..=10)
            .map(|id| hit("publishers", &id.to_string(), json!({"name": format!("P{id}")})))
            .collect(),
    ));

    let (status, body) = app
        .get_json_with_headers("/publishers/?limit=5&offset=5", &[("x-api-key", API_KEY)])
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(12));
    assert_eq!(
        body["next"],
        json!("http://api.test/publishers/?limit=5&offset=10")
    );
    assert_eq!(
        body["previous"],
        json!("http://api.test/publishers/?limit=5&offset=0")
    );

    let sent = app.cluster.last_body();
    assert_eq!(sent["from"], json!(5));
    assert_eq!(sent["size"], json!(5));
    Ok(())
}

#[tokio::test]
async fn malformed_offset_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .get_json_with_headers("/publishers/?limit=5&offset=abc", &[("x-api-key", API_KEY)])
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
    assert!(app.cluster.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn result_window_is_enforced() -> anyhow::Result<()> {
    let app = TestApp::new_with_config(|config| config.cluster.max_result_window = 50)?;

    let (status, _) = app.get_json("/books/?page=3&page_size=20").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.cluster.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn cursor_is_rejected_under_another_ordering() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(
        10,
        vec![sorted_book("a", 30), sorted_book("b", 20), sorted_book("c", 10)],
    ));

    let (_, first) = app.get_json("/book_feed/").await?;
    let next = first["next"].as_str().unwrap().to_string();

    let reordered = format!("{}&ordering=published", relative(&next)?);
    let (status, body) = app.get_json(&reordered).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], json!("Invalid cursor"));
    assert_eq!(app.cluster.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn cursor_pages_forward_and_back() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    // page size 2 plus one lookahead hit
    app.cluster.reply(search_response(
        10,
        vec![sorted_book("a", 30), sorted_book("b", 20), sorted_book("c", 10)],
    ));

    let (status, first) = app.get_json("/book_feed/").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(first.get("count").is_none());
    assert_eq!(first["previous"], json!(null));
    let ids: Vec<_> = first["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["_meta"]["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("a"), json!("b")]);
    assert_eq!(first["results"][1]["_meta"]["sort"], json!([20, "b"]));

    let sent = app.cluster.last_body();
    assert_eq!(sent["size"], json!(3));
    assert_eq!(
        sent["sort"],
        json!([{"publication_date": {"order": "desc"}}, {"_id": {"order": "asc"}}])
    );
    assert!(sent.get("from").is_none());

    let next = first["next"].as_str().unwrap().to_string();
    app.cluster.reply(search_response(
        10,
        vec![sorted_book("c", 10), sorted_book("d", 5)],
    ));
    let (status, second) = app.get_json(relative(&next)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["next"], json!(null));
    assert!(second["previous"].is_string());
    assert_eq!(app.cluster.last_body()["search_after"], json!([20, "b"]));

    // Walking back reverses the sort and restores the request order
    let previous = second["previous"].as_str().unwrap().to_string();
    app.cluster.reply(search_response(
        10,
        vec![sorted_book("b", 20), sorted_book("a", 30)],
    ));
    let (status, back) = app.get_json(relative(&previous)?).await?;
    assert_eq!(status, StatusCode::OK);
    let sent = app.cluster.last_body();
    assert_eq!(sent["search_after"], json!([10, "c"]));
    assert_eq!(
        sent["sort"],
        json!([{"publication_date": {"order": "asc"}}, {"_id": {"order": "desc"}}])
    );
    assert_eq!(back["results"][0]["_meta"]["id"], json!("a"));
    assert_eq!(back["previous"], json!(null));
    assert!(back["next"].is_string());
    Ok(())
}

#[tokio::test]
async fn tampered_cursor_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.cluster.reply(search_response(
        10,
        vec![sorted_book("a", 30), sorted_book("b", 20), sorted_book("c", 10)],
    ));

    let (_, first) = app.get_json("/book_feed/").await?;
    let next = first["next"].as_str().unwrap();
    let tampered = format!("{}x", relative(next)?);

    let (status, body) = app.get_json(&tampered).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
    assert_eq!(app.cluster.requests().len(), 1);
    Ok(())
}
