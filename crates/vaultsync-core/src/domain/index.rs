//! Index entries and snapshots
//!
//! An [`IndexSnapshot`] maps a vault-relative path to the metadata of the
//! entry stored there. Two snapshots exist at runtime: the local one,
//! rebuilt on demand from the filesystem, and the last-synced remote one,
//! persisted by the state store.
//!
//! ## Paths
//!
//! Paths are relative to the synced root on both sides, use `/` as the
//! separator and never start or end with one (`notes/today.md`).
//!
//! ## Timestamps
//!
//! Timestamps are kept at millisecond precision. Local filesystems report
//! nanoseconds while the remote reports milliseconds at best; truncating on
//! both sides keeps the modification-time comparison in the diff engine
//! stable across a download followed by a re-index.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Path → entry mapping for one side of the synchronization
pub type IndexSnapshot = BTreeMap<String, IndexEntry>;

/// Whether an index entry is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Folder => write!(f, "folder"),
        }
    }
}

/// Metadata of a single file or folder, keyed by its relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Last path segment
    pub name: String,
    /// Vault-relative path, unique within a snapshot
    pub path: String,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Size in bytes (0 for folders)
    pub size: u64,
}

impl IndexEntry {
    /// Create an entry, deriving `name` from the last segment of `path`
    ///
    /// Timestamps are truncated to millisecond precision.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if `path` is not a valid
    /// vault-relative path (see [`normalize_relative`])
    pub fn new(
        path: &str,
        kind: EntryKind,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        size: u64,
    ) -> Result<Self, DomainError> {
        let path = normalize_relative(path)?;
        let name = entry_name(&path).to_string();
        Ok(Self {
            name,
            path,
            kind,
            created_at: truncate_to_millis(created_at),
            modified_at: truncate_to_millis(modified_at),
            size: if kind == EntryKind::Folder { 0 } else { size },
        })
    }

    /// Returns true if this entry is a folder
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// Modification-time equality, the "already in sync" tie-break
    #[must_use]
    pub fn same_mtime(&self, other: &IndexEntry) -> bool {
        self.modified_at == other.modified_at
    }
}

/// Normalize a vault-relative path
///
/// Converts `\` separators to `/`, strips leading and trailing separators,
/// collapses empty and `.` segments.
///
/// # Errors
/// Returns `DomainError::InvalidPath` if the result is empty or contains a
/// `..` segment
pub fn normalize_relative(path: &str) -> Result<String, DomainError> {
    let unified = path.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(DomainError::InvalidPath(format!(
                    "Parent segments are not allowed: {path}"
                )))
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(DomainError::InvalidPath(format!(
            "Path has no segments: '{path}'"
        )));
    }

    Ok(segments.join("/"))
}

/// Last segment of a relative path
#[must_use]
pub fn entry_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a relative path, or `None` for top-level entries
#[must_use]
pub fn parent_of(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Drop sub-millisecond precision from a timestamp
#[must_use]
pub fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(dt.timestamp_millis())
        .single()
        .unwrap_or(dt)
}
