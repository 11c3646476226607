//! Local index builder
//!
//! Walks the vault from its root and records every file and folder that
//! the ignore rules let through. Ignored folders are pruned: their subtree
//! is never listed.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, instrument};

use vaultsync_core::domain::{IgnoreRuleSet, IndexEntry, IndexSnapshot};
use vaultsync_core::ports::ILocalVault;

/// Builds [`IndexSnapshot`]s of the local vault
#[derive(Clone)]
pub struct LocalIndexBuilder {
    vault: Arc<dyn ILocalVault>,
}

impl LocalIndexBuilder {
    pub fn new(vault: Arc<dyn ILocalVault>) -> Self {
        Self { vault }
    }

    /// Snapshot of every non-ignored entry under the vault root
    ///
    /// Entries that vanish between listing and stat are skipped.
    pub async fn build(&self, rules: &IgnoreRuleSet) -> Result<IndexSnapshot> {
        self.build_under("", rules).await
    }

    /// Snapshot of the non-ignored entries below `folder` (excluding it)
    #[instrument(skip(self, rules))]
    pub async fn build_under(&self, folder: &str, rules: &IgnoreRuleSet) -> Result<IndexSnapshot> {
        let mut snapshot = IndexSnapshot::new();
        let mut pending = vec![folder.to_string()];

        while let Some(folder) = pending.pop() {
            let listing = self.vault.list(&folder).await?;

            for path in listing.folders {
                if rules.is_ignored(&path) {
                    debug!(path = %path, "Pruning ignored folder");
                    continue;
                }
                if self.record(&mut snapshot, &path).await? {
                    pending.push(path);
                }
            }

            for path in listing.files {
                if rules.is_ignored(&path) {
                    continue;
                }
                self.record(&mut snapshot, &path).await?;
            }
        }

        debug!(entries = snapshot.len(), "Local index built");
        Ok(snapshot)
    }

    async fn record(&self, snapshot: &mut IndexSnapshot, path: &str) -> Result<bool> {
        let Some(stat) = self.vault.stat(path).await? else {
            return Ok(false);
        };
        let entry = IndexEntry::new(path, stat.kind, stat.created_at, stat.modified_at, stat.size)?;
        snapshot.insert(entry.path.clone(), entry);
        Ok(true)
    }
}
