//! Upload operations for Microsoft Graph API (OneDrive)
//!
//! Provides functions for uploading files to the application folder:
//! - [`upload_small`] - Single-request upload for files up to 4 MiB
//! - [`upload_large`] - Upload session with sequential fixed-size chunks
//! - [`create_upload_session`] - Creates an upload session
//! - [`upload_chunk`] - Uploads a single chunk within a session
//!
//! ## Microsoft Graph API References
//!
//! - [Upload small files](https://learn.microsoft.com/en-us/graph/api/driveitem-put-content)
//! - [Upload large files](https://learn.microsoft.com/en-us/graph/api/driveitem-createuploadsession)

use anyhow::{Context, Result};
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{ensure_success, GraphClient};
use crate::GraphError;

/// Upload session chunks must be a multiple of 320 KiB
pub const CHUNK_UNIT: u64 = 327_680;

/// Default chunk size: 150 units (49,152,000 bytes)
pub const CHUNK_SIZE: u64 = CHUNK_UNIT * 150;

/// Largest file sent with a single request (inclusive)
pub const SMALL_UPLOAD_LIMIT: u64 = 4 * 1024 * 1024;

/// Response from creating an upload session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSessionResponse {
    /// The URL to use for uploading chunks
    upload_url: String,
}

/// Number of chunks needed for `size` bytes: `ceil(size / chunk_size)`
///
/// ```
/// use vaultsync_graph::upload::{compute_chunks, CHUNK_SIZE};
///
/// assert_eq!(compute_chunks(100 * 1024 * 1024, CHUNK_SIZE), 3);
/// assert_eq!(compute_chunks(0, CHUNK_SIZE), 0);
/// ```
pub fn compute_chunks(size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size)
}

/// Byte range `[start, end)` of chunk `index`
fn chunk_bounds(index: u64, chunk_size: u64, size: u64) -> (u64, u64) {
    let start = index * chunk_size;
    let end = (start + chunk_size).min(size);
    (start, end)
}

/// Uploads a file in a single PUT request
///
/// `PUT {approot}:/{path}:/content` with the raw bytes as the body.
pub async fn upload_small(client: &GraphClient, path: &str, data: Vec<u8>) -> Result<()> {
    let url = client.item_url(path, Some("content"))?;
    debug!(path, bytes = data.len(), "Uploading small file");

    let response = client
        .execute_with_retry(Method::PUT, &url, |rb| {
            rb.header(header::CONTENT_TYPE, "application/octet-stream")
                .body(data.clone())
        })
        .await?;
    ensure_success(response)
        .await
        .with_context(|| format!("Small upload of {path} failed"))?;

    debug!(path, "Small upload completed");
    Ok(())
}

/// Creates an upload session that replaces any existing item
///
/// `POST {approot}:/{path}:/createUploadSession`
///
/// # Returns
/// The session's upload URL
pub async fn create_upload_session(client: &GraphClient, path: &str) -> Result<String> {
    let url = client.item_url(path, Some("createUploadSession"))?;
    let body = serde_json::json!({
        "item": { "@microsoft.graph.conflictBehavior": "replace" }
    });

    let response = client
        .execute_with_retry(Method::POST, &url, |rb| rb.json(&body))
        .await?;
    let session: UploadSessionResponse = ensure_success(response)
        .await
        .context("Create upload session returned error status")?
        .json()
        .await
        .map_err(|e| GraphError::InvalidResponse(e.to_string()))
        .context("Failed to parse upload session response")?;

    debug!(path, "Upload session created");
    Ok(session.upload_url)
}

/// Uploads one chunk to an upload session
///
/// The session URL is pre-authenticated, so no Authorization header is
/// sent. The request carries `Content-Length` and
/// `Content-Range: bytes {offset}-{offset+len-1}/{total}`.
///
/// # Returns
/// - `Some(Value)` with the completed item on the final chunk (200/201)
/// - `None` for intermediate chunks (202 Accepted)
pub async fn upload_chunk(
    client: &GraphClient,
    upload_url: &str,
    data: &[u8],
    offset: u64,
    total: u64,
) -> Result<Option<serde_json::Value>> {
    let chunk_len = data.len() as u64;
    let content_range = format!("bytes {}-{}/{}", offset, offset + chunk_len - 1, total);
    debug!(range = %content_range, "Uploading chunk");

    let response = client
        .execute_unauthenticated(Method::PUT, upload_url, |rb| {
            rb.header(header::CONTENT_LENGTH, chunk_len.to_string())
                .header(header::CONTENT_RANGE, &content_range)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(data.to_vec())
        })
        .await?;
    let response = ensure_success(response)
        .await
        .with_context(|| format!("Chunk upload failed ({content_range})"))?;

    let status = response.status();
    if status == StatusCode::OK || status == StatusCode::CREATED {
        let item = response
            .json()
            .await
            .map_err(|e| GraphError::InvalidResponse(e.to_string()))
            .context("Failed to parse final chunk response")?;
        Ok(Some(item))
    } else {
        Ok(None)
    }
}

/// Uploads a file through an upload session in sequential chunks
///
/// `progress`, when given, is called with `(chunk_number, total_chunks)`
/// as each chunk starts, `chunk_number` counting from 1.
pub async fn upload_large(
    client: &GraphClient,
    path: &str,
    data: &[u8],
    chunk_size: u64,
    progress: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
) -> Result<()> {
    let size = data.len() as u64;
    let total_chunks = compute_chunks(size, chunk_size);
    info!(path, bytes = size, chunks = total_chunks, "Starting chunked upload");

    let upload_url = create_upload_session(client, path).await?;

    for index in 0..total_chunks {
        let (start, end) = chunk_bounds(index, chunk_size, size);
        if let Some(report) = progress {
            report(index + 1, total_chunks);
        }
        upload_chunk(
            client,
            &upload_url,
            &data[start as usize..end as usize],
            start,
            size,
        )
        .await
        .with_context(|| format!("Chunk {}/{} of {path}", index + 1, total_chunks))?;
    }

    info!(path, "Chunked upload completed");
    Ok(())
}
