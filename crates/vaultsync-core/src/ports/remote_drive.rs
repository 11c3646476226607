//! Remote drive port (driven/secondary port)
//!
//! Abstracts the remote object store the vault is mirrored to. The contract
//! has two halves:
//!
//! - **Change tracking**: full and incremental listings of the remote feed,
//!   each ending with a fresh [`DeltaCursor`]
//! - **Transfers**: per-item upload, download and delete by root-prefixed
//!   path (`<root>/<relative path>`)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result`; the orchestrator classifies failures into its
//!   own taxonomy at the phase boundary.
//! - The upload sizing decision (single-shot vs. chunked) belongs to the
//!   transfer executor, so both primitives are exposed here.
//! - Listing items keep the raw parent path reported by the remote. Turning
//!   it into a vault-relative path is the executor's job because it depends
//!   on the configured root folder name.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DeltaCursor;

/// Progress callback for chunked uploads: `(chunk_number, total_chunks)`
/// with `chunk_number` starting at 1
pub type ChunkProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// One item of the remote change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Remote item identifier
    pub id: String,
    /// Item name (last path segment)
    pub name: String,
    /// Full parent path as reported by the remote
    /// (e.g. `/drive/root:/Apps/VaultSync/Vault/notes`)
    pub parent_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Size in bytes
    pub size: u64,
    pub is_folder: bool,
    /// The feed reports this item as removed
    pub is_deleted: bool,
    /// Pre-authenticated content URL, when the remote provides one
    pub download_url: Option<String>,
}

/// Accumulated result of a paginated listing
#[derive(Debug, Clone)]
pub struct RemoteListing {
    /// Items across all pages, in feed order
    pub items: Vec<RemoteItem>,
    /// Cursor marking the end of this listing
    pub cursor: DeltaCursor,
}

/// Remote storage operations used by the sync engine
#[async_trait::async_trait]
pub trait IRemoteDrive: Send + Sync {
    /// Full listing of the subtree rooted at `root`, with no prior cursor
    ///
    /// Follows pagination until the page carrying the delta cursor.
    async fn full_listing(&self, root: &str) -> Result<RemoteListing>;

    /// Changes since `cursor`, following pagination
    async fn incremental_listing(&self, cursor: &DeltaCursor) -> Result<RemoteListing>;

    /// A cursor for "now", without accumulating any items
    async fn latest_cursor(&self) -> Result<DeltaCursor>;

    /// Whether an item exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Delete the file or folder at `path`; a missing item is not an error
    async fn delete_by_path(&self, path: &str) -> Result<()>;

    /// Create (or replace) the top-level root folder `name`
    async fn create_root_folder(&self, name: &str) -> Result<()>;

    /// Create the folder at `path` if absent
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Single-request upload of `data` to `path`
    async fn upload_small(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Chunked upload of `data` to `path` through an upload session
    ///
    /// Chunks are sent sequentially; `progress` is called as each one starts.
    async fn upload_large(
        &self,
        path: &str,
        data: Vec<u8>,
        chunk_size: u64,
        progress: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
    ) -> Result<()>;

    /// Fetch the content of a feed item
    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>>;
}
