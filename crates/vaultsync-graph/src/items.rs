//! Path-addressed item operations
//!
//! - [`get_item_by_path`] - metadata lookup, `None` when absent
//! - [`delete_by_path`] - delete, treating "already gone" as success
//! - [`create_root_folder`] / [`create_folder`] - folder creation
//! - [`download`] - content fetch through the pre-authenticated URL

use anyhow::{Context, Result};
use reqwest::{header, Method};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use vaultsync_core::domain::index::{entry_name, parent_of};
use vaultsync_core::ports::RemoteItem;

use crate::client::{ensure_success, GraphClient};
use crate::delta::GraphDriveItem;
use crate::GraphError;

/// Minimal response of a `select=id,@microsoft.graph.downloadUrl` query
#[derive(Debug, Deserialize)]
struct DownloadLinkResponse {
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

/// Looks up the item at `path` under the application folder
///
/// # Returns
/// `Ok(None)` on 404
pub async fn get_item_by_path(client: &GraphClient, path: &str) -> Result<Option<RemoteItem>> {
    let url = client.item_url(path, None)?;
    let response = client.execute_with_retry(Method::GET, &url, |rb| rb).await?;

    match ensure_success(response).await {
        Ok(response) => {
            let item: GraphDriveItem = response
                .json()
                .await
                .map_err(|e| GraphError::InvalidResponse(e.to_string()))
                .context("Failed to parse item response")?;
            Ok(Some(item.into()))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to get item {path}"))),
    }
}

/// Deletes the file or folder at `path`
///
/// A 404 means the item is already gone and counts as success.
pub async fn delete_by_path(client: &GraphClient, path: &str) -> Result<()> {
    let url = client.item_url(path, None)?;
    let response = client.execute_with_retry(Method::DELETE, &url, |rb| rb).await?;

    match ensure_success(response).await {
        Ok(_) => {
            debug!(path, "Deleted remote item");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(path, "Remote item already absent");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to delete {path}"))),
    }
}

/// Creates (or replaces) a top-level folder in the application folder
pub async fn create_root_folder(client: &GraphClient, name: &str) -> Result<()> {
    let url = client.app_root_url("/children");
    let body = json!({
        "name": name,
        "folder": {},
        "@microsoft.graph.conflictBehavior": "replace",
    });

    let response = client
        .execute_with_retry(Method::POST, &url, |rb| rb.json(&body))
        .await?;
    ensure_success(response)
        .await
        .with_context(|| format!("Failed to create root folder {name}"))?;

    debug!(name, "Created root folder");
    Ok(())
}

/// Creates the folder at `path` if it does not exist yet
///
/// The parent must exist. A 409 (name already taken) counts as success.
pub async fn create_folder(client: &GraphClient, path: &str) -> Result<()> {
    let url = match parent_of(path.trim_matches('/')) {
        Some(parent) => client.item_url(parent, Some("children"))?,
        None => client.app_root_url("/children"),
    };
    let body = json!({
        "name": entry_name(path.trim_matches('/')),
        "folder": {},
        "@microsoft.graph.conflictBehavior": "fail",
    });

    let response = client
        .execute_with_retry(Method::POST, &url, |rb| rb.json(&body))
        .await?;

    match ensure_success(response).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_conflict() => {
            debug!(path, "Remote folder already exists");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to create folder {path}"))),
    }
}

/// Downloads the content of a feed item
///
/// Uses the item's `@microsoft.graph.downloadUrl` when the feed provided
/// one; otherwise asks for a fresh link by item id. The link itself is
/// fetched without an Authorization header.
pub async fn download(client: &GraphClient, item: &RemoteItem) -> Result<Vec<u8>> {
    let link = match &item.download_url {
        Some(url) => url.clone(),
        None => download_link_by_id(client, &item.id).await?,
    };

    let response = client
        .execute_unauthenticated(Method::GET, &link, |rb| {
            rb.header(header::CACHE_CONTROL, "no-cache")
        })
        .await?;
    let bytes = ensure_success(response)
        .await
        .with_context(|| format!("Download of {} failed", item.name))?
        .bytes()
        .await
        .map_err(GraphError::from)
        .context("Failed to read download body")?;

    debug!(name = %item.name, bytes = bytes.len(), "Downloaded item");
    Ok(bytes.to_vec())
}

async fn download_link_by_id(client: &GraphClient, id: &str) -> Result<String> {
    let url = format!(
        "{}/items/{}?select=id,@microsoft.graph.downloadUrl",
        client.base_url(),
        id
    );
    let response = client.execute_with_retry(Method::GET, &url, |rb| rb).await?;
    let link: DownloadLinkResponse = ensure_success(response)
        .await
        .with_context(|| format!("Failed to get download link for item {id}"))?
        .json()
        .await
        .map_err(|e| GraphError::InvalidResponse(e.to_string()))
        .context("Failed to parse download link response")?;

    link.download_url
        .ok_or_else(|| GraphError::InvalidResponse(format!("item {id} has no download URL")).into())
}
