//! Local vault filesystem port (driven/secondary port)
//!
//! All paths are vault-relative (`notes/today.md`); the empty string names
//! the vault root in [`ILocalVault::list`]. Implementations resolve them
//! against their configured root.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::EntryKind;

/// Direct children of a folder, as vault-relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultListing {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// Metadata of an existing local entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStat {
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
}

/// Timestamps to apply after a write
///
/// `None` leaves the value chosen by the filesystem. Creation time is
/// applied only where the platform allows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Local filesystem operations used by the sync engine
#[async_trait::async_trait]
pub trait ILocalVault: Send + Sync {
    /// List the direct children of `path` (`""` for the root)
    async fn list(&self, path: &str) -> Result<VaultListing>;

    /// Stat `path`; `Ok(None)` if it does not exist
    async fn stat(&self, path: &str) -> Result<Option<VaultStat>>;

    /// Whether anything exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Create a folder and any missing parents
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Write `data` to `path` (creating parents), then apply `times`
    async fn write_binary(&self, path: &str, data: &[u8], times: FileTimes) -> Result<()>;

    /// Read the full content of `path`
    async fn read_binary(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove the file or folder (recursively) at `path`
    async fn remove(&self, path: &str) -> Result<()>;
}
