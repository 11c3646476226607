//! Microsoft Graph Delta API for change tracking
//!
//! ## Delta Query Flow
//!
//! 1. **Full listing**: [`full_listing`] queries `{approot}:/{root}:/delta`
//!    with no token and returns every item under the root folder
//! 2. **Follow pages**: each page's `@odata.nextLink` is fetched until a page
//!    carries `@odata.deltaLink`
//! 3. **Save cursor**: the delta link (a complete URL) becomes the
//!    [`DeltaCursor`] for the next run
//! 4. **Incremental listing**: [`incremental_listing`] starts from the saved
//!    delta link and returns only the changes since then
//!
//! A listing that runs out of pages without a delta link fails with
//! [`GraphError::MissingDeltaLink`]; the caller keeps its previous cursor.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use vaultsync_core::domain::DeltaCursor;
use vaultsync_core::ports::{RemoteItem, RemoteListing};

use crate::client::{ensure_success, GraphClient};
use crate::GraphError;

// ============================================================================
// Microsoft Graph API response types (JSON deserialization)
// ============================================================================

/// One page of a delta response
///
/// See: <https://learn.microsoft.com/en-us/graph/api/driveitem-delta>
#[derive(Debug, Deserialize)]
struct GraphDeltaResponse {
    #[serde(default)]
    value: Vec<GraphDriveItem>,

    /// Present when more pages follow
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,

    /// Present only on the last page
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

/// A drive item as returned by delta and item endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphDriveItem {
    id: String,

    #[serde(default)]
    name: String,

    size: Option<u64>,

    created_date_time: Option<DateTime<Utc>>,

    last_modified_date_time: Option<DateTime<Utc>>,

    parent_reference: Option<GraphParentReference>,

    /// Present if the item is a folder
    folder: Option<serde_json::Value>,

    /// Present if the item has been deleted
    deleted: Option<serde_json::Value>,

    /// Short-lived pre-authenticated content URL (files only)
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphParentReference {
    /// Format: `/drive/root:/Apps/<app>/<root>/sub`
    path: Option<String>,
}

impl From<GraphDriveItem> for RemoteItem {
    fn from(item: GraphDriveItem) -> Self {
        RemoteItem {
            id: item.id,
            name: item.name,
            parent_path: item.parent_reference.and_then(|p| p.path),
            created_at: item.created_date_time,
            modified_at: item.last_modified_date_time,
            size: item.size.unwrap_or(0),
            is_folder: item.folder.is_some(),
            is_deleted: item.deleted.is_some(),
            download_url: item.download_url,
        }
    }
}

// ============================================================================
// Delta query functions
// ============================================================================

/// Lists every item under the root folder `root`, starting with no cursor
pub async fn full_listing(client: &GraphClient, root: &str) -> Result<RemoteListing> {
    let url = client.item_url(root, Some("delta"))?;
    debug!(root, "Starting full delta listing");
    collect_pages(client, url).await
}

/// Lists the changes since `cursor`
pub async fn incremental_listing(
    client: &GraphClient,
    cursor: &DeltaCursor,
) -> Result<RemoteListing> {
    debug!("Starting incremental delta listing");
    collect_pages(client, cursor.as_str().to_string()).await
}

/// Fetches a cursor for "now" without listing anything
///
/// Uses `{approot}/delta?token=latest`.
pub async fn latest_cursor(client: &GraphClient) -> Result<DeltaCursor> {
    let url = client.app_root_url("/delta?token=latest");
    let page = get_delta_page(client, &url).await?;
    let link = page.delta_link.ok_or(GraphError::MissingDeltaLink)?;
    DeltaCursor::new(link).context("Latest delta link was empty")
}

/// Follows `@odata.nextLink` from `url` until a page carries a delta link
async fn collect_pages(client: &GraphClient, mut url: String) -> Result<RemoteListing> {
    let mut items = Vec::new();
    let mut page_count: u32 = 0;

    loop {
        page_count += 1;
        let page = get_delta_page(client, &url).await?;

        debug!(
            page = page_count,
            items = page.value.len(),
            has_next = page.next_link.is_some(),
            "Received delta page"
        );
        items.extend(page.value.into_iter().map(RemoteItem::from));

        if let Some(link) = page.delta_link {
            debug!(
                total_items = items.len(),
                total_pages = page_count,
                "Delta listing complete"
            );
            let cursor = DeltaCursor::new(link).context("Delta link was empty")?;
            return Ok(RemoteListing { items, cursor });
        }

        match page.next_link {
            Some(next) => url = next,
            None => {
                warn!(pages = page_count, "Delta listing ended without a deltaLink");
                return Err(GraphError::MissingDeltaLink.into());
            }
        }
    }
}

async fn get_delta_page(client: &GraphClient, url: &str) -> Result<GraphDeltaResponse> {
    let response = client.execute_with_retry(Method::GET, url, |rb| rb).await?;
    let page = ensure_success(response)
        .await
        .context("Delta request returned error status")?
        .json::<GraphDeltaResponse>()
        .await
        .map_err(|e| GraphError::InvalidResponse(e.to_string()))
        .context("Failed to parse delta response JSON")?;
    Ok(page)
}
