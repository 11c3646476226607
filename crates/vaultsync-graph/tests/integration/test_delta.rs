//! Integration tests for delta listings
//!
//! - Full listing of a root folder
//! - Pagination across multiple pages
//! - Incremental listing from a saved cursor
//! - Latest cursor
//! - Missing deltaLink and 429 handling

use vaultsync_core::domain::DeltaCursor;
use vaultsync_graph::{delta, graph_error, GraphError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_full_listing_returns_items_and_cursor() {
    let (server, client) = common::setup_graph_mock().await;

    let items = serde_json::json!([
        common::folder_item("f-1", "notes", "/drive/root:/Apps/VaultSync/Vault"),
        common::file_item(
            "i-1",
            "today.md",
            "/drive/root:/Apps/VaultSync/Vault/notes",
            "2026-01-15T10:00:00Z"
        ),
    ]);
    common::mount_delta_single_page(&server, "Vault", items, "tok-1").await;

    let listing = delta::full_listing(&client, "Vault")
        .await
        .expect("full listing failed");

    assert_eq!(listing.items.len(), 2);
    assert!(listing.items[0].is_folder);
    assert_eq!(listing.items[1].name, "today.md");
    assert_eq!(listing.items[1].size, 12);
    assert_eq!(listing.cursor.as_str(), common::delta_link(&server, "tok-1"));
}

#[tokio::test]
async fn test_full_listing_follows_next_links() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/special/approot:/Vault:/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                common::file_item("a", "a.md", "/drive/root:/Apps/X/Vault", "2026-01-01T00:00:00Z")
            ],
            "@odata.nextLink": format!("{}/page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                common::file_item("b", "b.md", "/drive/root:/Apps/X/Vault", "2026-01-01T00:00:00Z")
            ],
            "@odata.deltaLink": common::delta_link(&server, "after-2-pages")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listing = delta::full_listing(&client, "Vault").await.unwrap();
    let names: Vec<&str> = listing.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a.md", "b.md"]);
    assert!(listing.cursor.as_str().ends_with("token=after-2-pages"));
}

#[tokio::test]
async fn test_incremental_listing_starts_from_cursor() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/special/approot/delta"))
        .and(query_param("token", "previous"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{ "id": "gone", "name": "old.md", "deleted": {} }],
            "@odata.deltaLink": common::delta_link(&server, "next")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = DeltaCursor::new(common::delta_link(&server, "previous")).unwrap();
    let listing = delta::incremental_listing(&client, &cursor).await.unwrap();

    assert_eq!(listing.items.len(), 1);
    assert!(listing.items[0].is_deleted);
    assert!(listing.cursor.as_str().ends_with("token=next"));
}

#[tokio::test]
async fn test_missing_delta_link_is_an_error() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/special/approot:/Vault:/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": []
        })))
        .mount(&server)
        .await;

    let err = delta::full_listing(&client, "Vault").await.unwrap_err();
    assert!(matches!(graph_error(&err), Some(GraphError::MissingDeltaLink)));
}

#[tokio::test]
async fn test_latest_cursor() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/special/approot/delta"))
        .and(query_param("token", "latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [],
            "@odata.deltaLink": common::delta_link(&server, "now")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = delta::latest_cursor(&client).await.unwrap();
    assert!(cursor.as_str().ends_with("token=now"));
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/special/approot/delta"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/special/approot/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [],
            "@odata.deltaLink": common::delta_link(&server, "after-retry")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = delta::latest_cursor(&client).await.unwrap();
    assert!(cursor.as_str().ends_with("token=after-retry"));
}

#[tokio::test]
async fn test_retry_limit_exhausted() {
    let (server, client) = common::setup_graph_mock().await;
    let client = client.with_max_retries(1);

    Mock::given(method("GET"))
        .and(path("/special/approot/delta"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let err = delta::latest_cursor(&client).await.unwrap_err();
    assert!(matches!(
        graph_error(&err),
        Some(GraphError::TooManyRequests { .. })
    ));
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/special/approot:/Vault:/delta"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = delta::full_listing(&client, "Vault").await.unwrap_err();
    assert!(matches!(graph_error(&err), Some(GraphError::ServerError(_))));
}
