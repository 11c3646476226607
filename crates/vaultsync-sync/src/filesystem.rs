//! Local vault adapter (secondary/driven adapter)
//!
//! Implements [`ILocalVault`] on top of `tokio::fs`, resolving
//! vault-relative paths against a root directory.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: content goes to a sibling temp file that is renamed
//!   over the target, so a crash never leaves a half-written note.
//! - **Modification time**: after a write the file's mtime is set to the
//!   remote value (via `filetime`), so re-indexing right after a download
//!   reports the same timestamp the remote snapshot holds.
//! - **Creation time**: not settable on Linux; it is left to the
//!   filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::{debug, instrument, warn};

use vaultsync_core::domain::EntryKind;
use vaultsync_core::ports::{FileTimes, ILocalVault, VaultListing, VaultStat};

/// Suffix of in-flight writes; matched by the default ignore pattern
const TEMP_SUFFIX: &str = ".vaultsync-tmp";

/// Adapter bridging the [`ILocalVault`] port to a directory on disk
#[derive(Debug, Clone)]
pub struct LocalVaultAdapter {
    root: PathBuf,
}

impl LocalVaultAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The vault root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a vault-relative path (`""` is the root)
    pub fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            resolved.push(segment);
        }
        resolved
    }
}

fn to_utc(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[async_trait::async_trait]
impl ILocalVault for LocalVaultAdapter {
    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> Result<VaultListing> {
        let dir = self.resolve(path);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?;

        let mut listing = VaultListing::default();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "Skipping entry with non UTF-8 name");
                continue;
            };
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(m) => m,
                // Dangling symlink or removed while listing
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if metadata.is_dir() {
                listing.folders.push(child_path(path, &name));
            } else if metadata.is_file() {
                listing.files.push(child_path(path, &name));
            }
        }

        debug!(
            files = listing.files.len(),
            folders = listing.folders.len(),
            "listed folder"
        );
        Ok(listing)
    }

    async fn stat(&self, path: &str) -> Result<Option<VaultStat>> {
        let metadata = match tokio::fs::metadata(self.resolve(path)).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to stat {path}")),
        };

        let modified_at = to_utc(metadata.modified()).unwrap_or_else(Utc::now);
        let created_at = to_utc(metadata.created()).unwrap_or(modified_at);
        let kind = if metadata.is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::File
        };

        Ok(Some(VaultStat {
            kind,
            created_at,
            modified_at,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        }))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, path: &str) -> Result<()> {
        let target = self.resolve(path);
        tokio::fs::create_dir_all(&target)
            .await
            .with_context(|| format!("Failed to create folder {}", target.display()))?;
        debug!("folder created");
        Ok(())
    }

    #[instrument(skip(self, data, times), fields(bytes = data.len()))]
    async fn write_binary(&self, path: &str, data: &[u8], times: FileTimes) -> Result<()> {
        let target = self.resolve(path);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Same directory, so the rename stays on one filesystem.
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(TEMP_SUFFIX);
            PathBuf::from(p)
        };

        tokio::fs::write(&tmp_path, data)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &target)
            .await
            .with_context(|| format!("Failed to move {} into place", target.display()))?;

        if let Some(modified_at) = times.modified_at {
            let mtime = FileTime::from_unix_time(
                modified_at.timestamp(),
                modified_at.timestamp_subsec_nanos(),
            );
            let target = target.clone();
            tokio::task::spawn_blocking(move || filetime::set_file_times(&target, mtime, mtime))
                .await?
                .with_context(|| format!("Failed to set modification time of {path}"))?;
        }

        debug!("write complete");
        Ok(())
    }

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path))
            .await
            .with_context(|| format!("Failed to read {path}"))
    }

    #[instrument(skip(self))]
    async fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path);
        let metadata = match tokio::fs::symlink_metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("already absent");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            tokio::fs::remove_file(&target).await?;
        }
        debug!("removed");
        Ok(())
    }
}
