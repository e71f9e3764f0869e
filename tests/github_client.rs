//! Integration tests for the GitHub client using wiremock

use serde_json::json;
use theme_indexer::index::GitHubClient;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a search response with `count` sequentially named repositories
fn search_page(start: usize, count: usize) -> serde_json::Value {
    let items: Vec<serde_json::Value> = (start..start + count)
        .map(|i| json!({"full_name": format!("owner/theme-{i:03}"), "updated_at": "2026-08-01T00:00:00Z"}))
        .collect();
    json!({"total_count": 240, "items": items})
}

#[tokio::test]
async fn test_search_pagination_stops_on_a_short_page() {
    let mock_server = MockServer::start().await;

    // Two full pages, then a short final one
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "topic:neovim-colorscheme archived:false fork:false"))
        .and(query_param("sort", "updated"))
        .and(query_param("order", "desc"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, 100)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(100, 100)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(200, 40)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let mut ids = Vec::new();
    let mut page = 1;
    loop {
        let (hits, has_more) = client
            .search_topic("neovim-colorscheme", page, 100)
            .await
            .expect("Failed to fetch search page");
        ids.extend(hits.into_iter().map(|hit| hit.full_name));
        if !has_more {
            break;
        }
        page += 1;
    }

    assert_eq!(ids.len(), 240);
    assert_eq!(ids[0], "owner/theme-000");
    assert_eq!(ids[239], "owner/theme-239");
}

#[tokio::test]
async fn test_auth_and_version_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/rose.nvim"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-github-api-version", "2022-11-28"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"full_name": "acme/rose.nvim"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client =
        GitHubClient::new(Some("test-token"), 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let payload = client
        .fetch_repository("acme/rose.nvim")
        .await
        .expect("Failed to fetch repository")
        .expect("Expected a payload");
    assert_eq!(
        payload.get("full_name").and_then(serde_json::Value::as_str),
        Some("acme/rose.nvim")
    );
}

#[tokio::test]
async fn test_missing_resources_are_not_errors() {
    let mock_server = MockServer::start().await;

    // Everything 404s
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let repo = client.fetch_repository("ghost/missing").await.expect("Fetch must not error");
    assert!(repo.is_none());

    let tree = client.fetch_tree("ghost/missing", "HEAD").await.expect("Fetch must not error");
    assert!(tree.is_empty());
}

#[tokio::test]
async fn test_empty_body_counts_as_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/hollow.nvim"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let payload = client.fetch_repository("acme/hollow.nvim").await.expect("Fetch must not error");
    assert!(payload.is_none());
}

#[tokio::test]
async fn test_server_errors_exhaust_the_retry_budget() {
    let mock_server = MockServer::start().await;

    // Two attempts, two 500s, then a hard failure
    Mock::given(method("GET"))
        .and(path("/repos/acme/flaky.nvim"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 2, Some(&mock_server.uri())).expect("Failed to create client");

    let err = client
        .fetch_repository("acme/flaky.nvim")
        .await
        .expect_err("Exhausted retries must fail");
    let message = err.to_string();
    assert!(message.contains("failed after 2 attempts"), "unexpected error: {message}");
    assert!(message.contains("500"), "unexpected error: {message}");
}

#[tokio::test]
async fn test_rate_limit_pause_does_not_consume_an_attempt() {
    let mock_server = MockServer::start().await;

    // First response reports an exhausted quota with an already-passed
    // reset, so the client pauses briefly and tries again
    Mock::given(method("GET"))
        .and(path("/repos/acme/rose.nvim"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/rose.nvim"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"full_name": "acme/rose.nvim"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    // A single-attempt budget still succeeds because the pause is not a retry
    let mut client = GitHubClient::new(None, 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let payload = client.fetch_repository("acme/rose.nvim").await.expect("Failed to fetch repository");
    assert!(payload.is_some());
}

#[tokio::test]
async fn test_quota_errors_without_a_reset_consume_the_retry_budget() {
    let mock_server = MockServer::start().await;

    // Zero quota but no reset header, so every response costs an attempt
    Mock::given(method("GET"))
        .and(path("/repos/acme/rose.nvim"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 2, Some(&mock_server.uri())).expect("Failed to create client");

    let err = client
        .fetch_repository("acme/rose.nvim")
        .await
        .expect_err("Exhausted retries must fail");
    let message = err.to_string();
    assert!(message.contains("failed after 2 attempts"), "unexpected error: {message}");
    assert!(message.contains("403"), "unexpected error: {message}");
}

#[tokio::test]
async fn test_tree_requests_the_recursive_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/rose.nvim/git/trees/main"))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "tree": [
                {"path": "colors/rose.lua", "type": "blob", "sha": "def"},
                {"path": "colors", "type": "tree", "sha": "ghi"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let tree = client.fetch_tree("acme/rose.nvim", "main").await.expect("Failed to fetch tree");
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].path, "colors/rose.lua");
    assert_eq!(tree[0].kind, "blob");
    assert_eq!(tree[1].kind, "tree");
}

#[tokio::test]
async fn test_malformed_tree_payloads_read_as_empty() {
    let mock_server = MockServer::start().await;

    // Valid JSON, but a null where the listing should be
    Mock::given(method("GET"))
        .and(path("/repos/acme/odd.nvim/git/trees/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sha": "abc123", "tree": null})))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Valid JSON, but not an object at all
    Mock::given(method("GET"))
        .and(path("/repos/acme/list.nvim/git/trees/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "a", "tree"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = GitHubClient::new(None, 0, 1, Some(&mock_server.uri())).expect("Failed to create client");

    let tree = client.fetch_tree("acme/odd.nvim", "main").await.expect("Fetch must not error");
    assert!(tree.is_empty());

    let tree = client.fetch_tree("acme/list.nvim", "main").await.expect("Fetch must not error");
    assert!(tree.is_empty());
}
