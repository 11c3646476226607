//! Integration tests for path-addressed item operations

use vaultsync_core::ports::{IRemoteDrive, RemoteItem};
use vaultsync_graph::items;
use vaultsync_graph::provider::GraphRemoteDrive;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_delete_by_path_succeeds() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/special/approot:/Vault/old.md"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    items::delete_by_path(&client, "Vault/old.md").await.unwrap();
}

#[tokio::test]
async fn test_delete_missing_item_is_ok() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/special/approot:/Vault/gone.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    items::delete_by_path(&client, "Vault/gone.md").await.unwrap();
}

#[tokio::test]
async fn test_delete_forbidden_is_error() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/special/approot:/Vault/locked.md"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert!(items::delete_by_path(&client, "Vault/locked.md").await.is_err());
}

#[tokio::test]
async fn test_exists_via_provider() {
    let (server, client) = common::setup_graph_mock().await;
    let drive = GraphRemoteDrive::new(client);

    Mock::given(method("GET"))
        .and(path("/special/approot:/Vault"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::folder_item(
            "root-1",
            "Vault",
            "/drive/root:/Apps/VaultSync",
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/special/approot:/Missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(drive.exists("Vault").await.unwrap());
    assert!(!drive.exists("Missing").await.unwrap());
}

#[tokio::test]
async fn test_create_root_folder_replaces() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/special/approot/children"))
        .and(body_json(serde_json::json!({
            "name": "Vault",
            "folder": {},
            "@microsoft.graph.conflictBehavior": "replace"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    items::create_root_folder(&client, "Vault").await.unwrap();
}

#[tokio::test]
async fn test_create_folder_existing_is_ok() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/special/approot:/Vault/notes:/children"))
        .and(body_json(serde_json::json!({
            "name": "empty",
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail"
        })))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    items::create_folder(&client, "Vault/notes/empty").await.unwrap();
}

#[tokio::test]
async fn test_download_uses_preauthenticated_url() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/dl/abc"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"content".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let item = RemoteItem {
        id: "i-1".into(),
        name: "a.md".into(),
        parent_path: Some("/drive/root:/Apps/VaultSync/Vault".into()),
        created_at: None,
        modified_at: None,
        size: 7,
        is_folder: false,
        is_deleted: false,
        download_url: Some(format!("{}/dl/abc", server.uri())),
    };

    let bytes = items::download(&client, &item).await.unwrap();
    assert_eq!(bytes, b"content");

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_download_fetches_link_when_missing() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/items/i-2"))
        .and(query_param("select", "id,@microsoft.graph.downloadUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "i-2",
            "@microsoft.graph.downloadUrl": format!("{}/dl/fresh", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dl/fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xyz".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let item = RemoteItem {
        id: "i-2".into(),
        name: "b.md".into(),
        parent_path: None,
        created_at: None,
        modified_at: None,
        size: 3,
        is_folder: false,
        is_deleted: false,
        download_url: None,
    };

    assert_eq!(items::download(&client, &item).await.unwrap(), b"xyz");
}
