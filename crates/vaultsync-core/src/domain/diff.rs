//! Pending-work set computed from two snapshots
//!
//! A [`DiffSet`] holds the local entries that must be uploaded and the
//! paths that must be deleted remotely. A path never appears in both: every
//! mutator below moves a path from one side to the other rather than
//! inserting it twice.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::index::IndexEntry;

/// Uploads and remote deletions still owed to the remote side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSet {
    to_upload: BTreeMap<String, IndexEntry>,
    to_delete: BTreeSet<String>,
}

impl DiffSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an upload, dropping any pending deletion of the path
    pub fn upsert_upload(&mut self, entry: IndexEntry) {
        self.to_delete.remove(&entry.path);
        self.to_upload.insert(entry.path.clone(), entry);
    }

    /// Schedule a remote deletion, dropping any pending upload of the path
    pub fn mark_delete(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.to_upload.remove(&path);
        self.to_delete.insert(path);
    }

    /// Remove a pending upload. Returns true if one existed.
    pub fn remove_upload(&mut self, path: &str) -> bool {
        self.to_upload.remove(path).is_some()
    }

    /// Remove a pending deletion. Returns true if one existed.
    pub fn remove_delete(&mut self, path: &str) -> bool {
        self.to_delete.remove(path)
    }

    /// Remove the path from both sides
    pub fn forget(&mut self, path: &str) {
        self.to_upload.remove(path);
        self.to_delete.remove(path);
    }

    /// Drop all pending work
    pub fn clear(&mut self) {
        self.to_upload.clear();
        self.to_delete.clear();
    }

    #[must_use]
    pub fn to_upload(&self) -> &BTreeMap<String, IndexEntry> {
        &self.to_upload
    }

    #[must_use]
    pub fn to_delete(&self) -> &BTreeSet<String> {
        &self.to_delete
    }

    /// Pending upload for `path`, if any
    #[must_use]
    pub fn upload_entry(&self, path: &str) -> Option<&IndexEntry> {
        self.to_upload.get(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }

    /// `(uploads, deletions)` counts
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.to_upload.len(), self.to_delete.len())
    }
}
