//! Shared test helpers for Graph API integration tests
//!
//! Each helper mounts the necessary mock endpoints on a wiremock server;
//! [`setup_graph_mock`] returns a client pointed at that server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vaultsync_core::ports::{AuthStatus, IAuthProvider};
use vaultsync_graph::client::GraphClient;

/// Auth provider returning a fixed token and counting requests for it
#[derive(Default)]
pub struct StaticAuth {
    pub calls: AtomicUsize,
}

#[async_trait]
impl IAuthProvider for StaticAuth {
    async fn acquire_token(&self) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("test-access-token".to_string())
    }

    async fn status(&self) -> AuthStatus {
        AuthStatus::Authenticated
    }
}

/// Starts a mock server and returns a (MockServer, GraphClient) tuple.
pub async fn setup_graph_mock() -> (MockServer, GraphClient) {
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url(Arc::new(StaticAuth::default()), server.uri());
    (server, client)
}

/// A file item as the delta endpoint reports it
pub fn file_item(id: &str, name: &str, parent: &str, modified: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "size": 12,
        "createdDateTime": "2026-01-01T00:00:00Z",
        "lastModifiedDateTime": modified,
        "parentReference": { "path": parent },
        "file": {}
    })
}

/// A folder item as the delta endpoint reports it
pub fn folder_item(id: &str, name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "createdDateTime": "2026-01-01T00:00:00Z",
        "lastModifiedDateTime": "2026-01-01T00:00:00Z",
        "parentReference": { "path": parent },
        "folder": { "childCount": 0 }
    })
}

/// Mounts `{approot}:/{root}:/delta` returning a single page with a deltaLink.
pub async fn mount_delta_single_page(
    server: &MockServer,
    root: &str,
    items: serde_json::Value,
    delta_token: &str,
) {
    Mock::given(method("GET"))
        .and(path(format!("/special/approot:/{root}:/delta")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": items,
            "@odata.deltaLink": delta_link(server, delta_token)
        })))
        .mount(server)
        .await;
}

/// The delta link the mock server hands out for `token`
pub fn delta_link(server: &MockServer, token: &str) -> String {
    format!("{}/special/approot/delta?token={}", server.uri(), token)
}
