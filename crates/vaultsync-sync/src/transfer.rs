//! Transfer executor
//!
//! Runs upload, download and delete batches with bounded concurrency.
//!
//! ## Concurrency
//!
//! Each batch turns its items into futures and drives them through
//! `buffer_unordered(concurrency)`. Workers only perform I/O and hand their
//! outcome back; the single loop draining completions is the only place
//! that mutates the [`DiffSet`] and the working remote snapshot.
//!
//! ## Failure policy
//!
//! A failing item is logged and listed in [`BatchReport::failed`]; its
//! siblings keep running and its index entry is left untouched, so the
//! work stays pending for the next run.
//!
//! ## Ordering
//!
//! - Uploads create folders level by level (parents first), then send files.
//! - Remote feed items are applied as removals, then folders, then files.
//! - Within one chunked upload, chunks are strictly sequential.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use vaultsync_core::domain::{DiffSet, EntryKind, IgnoreRuleSet, IndexEntry, IndexSnapshot};
use vaultsync_core::ports::{FileTimes, ILocalVault, INotificationSink, IRemoteDrive, RemoteItem};

use crate::SyncError;

/// Prefix of `parentReference.path` values in the drive feed
const DRIVE_ROOT_PREFIX: &str = "/drive/root:";

/// Tunables of the transfer executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Maximum in-flight items per batch
    pub concurrency: usize,
    /// Largest payload sent in a single request (inclusive)
    pub small_upload_limit: u64,
    /// Chunk size of upload sessions
    pub chunk_size: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency: 100,
            small_upload_limit: 4 * 1024 * 1024,
            chunk_size: 150 * 327_680,
        }
    }
}

/// Outcome of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items uploaded, downloaded or mirrored as folders
    pub transferred: usize,
    /// Items deleted (remotely for pushes, locally for pulls)
    pub removed: usize,
    /// Items outside the synced subtree, ignored, or superseded by a local edit
    pub skipped: usize,
    /// Paths whose transfer failed
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.transferred += other.transferred;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed.extend(other.failed);
    }
}

/// `"<label> (n/N)"` notices as items complete
struct Progress<'a> {
    notifier: &'a dyn INotificationSink,
    label: &'static str,
    done: usize,
    total: usize,
}

impl<'a> Progress<'a> {
    fn new(notifier: &'a dyn INotificationSink, label: &'static str, total: usize) -> Self {
        Self {
            notifier,
            label,
            done: 0,
            total,
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        self.notifier
            .notify(&format!("{} ({}/{})", self.label, self.done, self.total));
    }
}

/// What a remote feed item asks of the local vault
#[derive(Debug)]
enum RemoteAction {
    Remove(String),
    EnsureFolder(IndexEntry),
    Download(IndexEntry, RemoteItem),
}

/// Derive the vault-relative path of a feed item
///
/// The item's parent path is split into segments (after the
/// `/drive/root:` prefix) and everything after the first segment equal to
/// `root_name` is kept, followed by the item name. Returns `None` for
/// items outside the synced subtree and for the root folder itself.
///
/// ```
/// use vaultsync_core::ports::RemoteItem;
/// use vaultsync_sync::transfer::resolve_relative_path;
///
/// let item = RemoteItem {
///     id: "1".into(),
///     name: "x.md".into(),
///     parent_path: Some("/drive/root:/Apps/VaultSync/Vault/notes".into()),
///     created_at: None,
///     modified_at: None,
///     size: 0,
///     is_folder: false,
///     is_deleted: false,
///     download_url: None,
/// };
/// assert_eq!(resolve_relative_path(&item, "Vault").as_deref(), Some("notes/x.md"));
/// assert_eq!(resolve_relative_path(&item, "Other"), None);
/// ```
pub fn resolve_relative_path(item: &RemoteItem, root_name: &str) -> Option<String> {
    if item.name.is_empty() {
        return None;
    }
    let parent = item.parent_path.as_deref()?;
    let parent = parent.strip_prefix(DRIVE_ROOT_PREFIX).unwrap_or(parent);

    let mut segments = parent.split('/').filter(|s| !s.is_empty());
    segments.by_ref().find(|segment| *segment == root_name)?;

    let mut parts: Vec<&str> = segments.collect();
    parts.push(&item.name);
    Some(parts.join("/"))
}

fn drop_subtree(index: &mut IndexSnapshot, path: &str) {
    let prefix = format!("{path}/");
    index.retain(|p, _| p != path && !p.starts_with(&prefix));
}

fn forget_subtree(diff: &mut DiffSet, path: &str) {
    let prefix = format!("{path}/");
    let pending: Vec<String> = diff
        .to_upload()
        .keys()
        .chain(diff.to_delete().iter())
        .filter(|p| p.as_str() == path || p.starts_with(&prefix))
        .cloned()
        .collect();
    for p in pending {
        diff.forget(&p);
    }
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Executes transfer batches against the remote drive and the local vault
#[derive(Clone)]
pub struct TransferExecutor {
    remote: Arc<dyn IRemoteDrive>,
    vault: Arc<dyn ILocalVault>,
    notifier: Arc<dyn INotificationSink>,
    root_name: String,
    options: TransferOptions,
}

impl TransferExecutor {
    pub fn new(
        remote: Arc<dyn IRemoteDrive>,
        vault: Arc<dyn ILocalVault>,
        notifier: Arc<dyn INotificationSink>,
        root_name: impl Into<String>,
        options: TransferOptions,
    ) -> Self {
        Self {
            remote,
            vault,
            notifier,
            root_name: root_name.into(),
            options,
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Remote path of a vault-relative path
    pub fn remote_path(&self, path: &str) -> String {
        format!("{}/{}", self.root_name, path)
    }

    fn width(&self) -> usize {
        self.options.concurrency.max(1)
    }

    // ------------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------------

    /// Upload `entries`, recording successes in `remote_index`
    ///
    /// Each uploaded path leaves the `diff`.
    #[instrument(skip_all, fields(items = entries.len()))]
    pub async fn upload_batch(
        &self,
        entries: Vec<IndexEntry>,
        diff: &mut DiffSet,
        remote_index: &mut IndexSnapshot,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut progress = Progress::new(self.notifier.as_ref(), "Uploaded", entries.len());

        let mut levels: BTreeMap<usize, Vec<IndexEntry>> = BTreeMap::new();
        let mut files = Vec::new();
        for entry in entries {
            if entry.is_folder() {
                levels.entry(depth(&entry.path)).or_default().push(entry);
            } else {
                files.push(entry);
            }
        }

        let groups = levels.into_values().chain(std::iter::once(files));
        for group in groups {
            let mut results = stream::iter(group)
                .map(|entry| async move {
                    let outcome = self.upload_one(&entry).await;
                    (entry, outcome)
                })
                .buffer_unordered(self.width());

            while let Some((entry, outcome)) = results.next().await {
                progress.tick();
                match outcome {
                    Ok(()) => {
                        diff.remove_upload(&entry.path);
                        remote_index.insert(entry.path.clone(), entry);
                        report.transferred += 1;
                    }
                    Err(e) => {
                        warn!(path = %entry.path, error = %e, "Upload failed");
                        report.failed.push(entry.path);
                    }
                }
            }
        }

        report
    }

    async fn upload_one(&self, entry: &IndexEntry) -> Result<(), SyncError> {
        let remote_path = self.remote_path(&entry.path);
        let failed = |e: anyhow::Error| SyncError::Upload {
            path: entry.path.clone(),
            reason: SyncError::chain(&e),
        };

        if entry.is_folder() {
            return self.remote.create_folder(&remote_path).await.map_err(failed);
        }

        let data = self.vault.read_binary(&entry.path).await.map_err(failed)?;
        if data.len() as u64 <= self.options.small_upload_limit {
            debug!(path = %entry.path, bytes = data.len(), "Single-request upload");
            return self.remote.upload_small(&remote_path, data).await.map_err(failed);
        }

        let notifier = Arc::clone(&self.notifier);
        let path = entry.path.clone();
        let report_chunk = move |chunk: u64, total: u64| {
            notifier.notify(&format!("Uploading {path} ({chunk}/{total})"));
        };
        self.remote
            .upload_large(
                &remote_path,
                data,
                self.options.chunk_size,
                Some(&report_chunk as &(dyn Fn(u64, u64) + Send + Sync)),
            )
            .await
            .map_err(failed)
    }

    // ------------------------------------------------------------------------
    // Remote deletions
    // ------------------------------------------------------------------------

    /// Delete `paths` remotely, dropping them from `remote_index` on success
    #[instrument(skip_all, fields(items = paths.len()))]
    pub async fn delete_batch(
        &self,
        paths: Vec<String>,
        diff: &mut DiffSet,
        remote_index: &mut IndexSnapshot,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut progress = Progress::new(self.notifier.as_ref(), "Deleted", paths.len());

        let mut results = stream::iter(paths)
            .map(|path| async move {
                let outcome = self.remote.delete_by_path(&self.remote_path(&path)).await;
                (path, outcome)
            })
            .buffer_unordered(self.width());

        while let Some((path, outcome)) = results.next().await {
            progress.tick();
            match outcome {
                Ok(()) => {
                    diff.remove_delete(&path);
                    drop_subtree(remote_index, &path);
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path, error = %format!("{e:#}"), "Remote delete failed");
                    report.failed.push(path);
                }
            }
        }

        report
    }

    // ------------------------------------------------------------------------
    // Remote feed application
    // ------------------------------------------------------------------------

    /// Apply remote feed items to the local vault
    ///
    /// Deleted items remove the local path; folders are created when
    /// missing; files are downloaded unless a pending local upload of the
    /// same path is at least as recent. Applied paths leave the `diff`.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn download_or_delete_batch(
        &self,
        items: Vec<RemoteItem>,
        rules: &IgnoreRuleSet,
        diff: &mut DiffSet,
        remote_index: &mut IndexSnapshot,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let (removals, folders, downloads) = self.plan(items, rules, diff, &mut report);

        let total = removals.len() + folders.len() + downloads.len();
        let mut progress = Progress::new(self.notifier.as_ref(), "Handled", total);
        info!(
            removals = removals.len(),
            folders = folders.len(),
            downloads = downloads.len(),
            skipped = report.skipped,
            "Applying remote changes"
        );

        for phase in [removals, folders, downloads] {
            let mut results = stream::iter(phase)
                .map(|action| async move {
                    let outcome = self.apply(&action).await;
                    (action, outcome)
                })
                .buffer_unordered(self.width());

            while let Some((action, outcome)) = results.next().await {
                progress.tick();
                match (action, outcome) {
                    (RemoteAction::Remove(path), Ok(())) => {
                        drop_subtree(remote_index, &path);
                        forget_subtree(diff, &path);
                        report.removed += 1;
                    }
                    (RemoteAction::Remove(path), Err(e)) => {
                        warn!(path = %path, error = %e, "Local removal failed");
                        report.failed.push(path);
                    }
                    (RemoteAction::EnsureFolder(entry), Ok(()))
                    | (RemoteAction::Download(entry, _), Ok(())) => {
                        diff.forget(&entry.path);
                        remote_index.insert(entry.path.clone(), entry);
                        report.transferred += 1;
                    }
                    (RemoteAction::EnsureFolder(entry), Err(e))
                    | (RemoteAction::Download(entry, _), Err(e)) => {
                        warn!(path = %entry.path, error = %e, "Applying remote item failed");
                        report.failed.push(entry.path);
                    }
                }
            }
        }

        report
    }

    /// Sort feed items into removals, folders and downloads
    ///
    /// When the feed reports a path more than once, the last report wins.
    fn plan(
        &self,
        items: Vec<RemoteItem>,
        rules: &IgnoreRuleSet,
        diff: &DiffSet,
        report: &mut BatchReport,
    ) -> (Vec<RemoteAction>, Vec<RemoteAction>, Vec<RemoteAction>) {
        let mut latest: HashMap<String, RemoteItem> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for item in items {
            let Some(path) = resolve_relative_path(&item, &self.root_name) else {
                debug!(name = %item.name, "Item outside the synced root");
                report.skipped += 1;
                continue;
            };
            if rules.is_ignored(&path) {
                report.skipped += 1;
                continue;
            }
            if latest.insert(path.clone(), item).is_some() {
                report.skipped += 1;
            } else {
                order.push(path);
            }
        }

        let mut removals = Vec::new();
        let mut folders = Vec::new();
        let mut downloads = Vec::new();

        for path in order {
            let Some(item) = latest.remove(&path) else {
                continue;
            };
            if item.is_deleted {
                removals.push(RemoteAction::Remove(path));
                continue;
            }

            let modified_at = item.modified_at.unwrap_or_else(Utc::now);
            let created_at = item.created_at.unwrap_or(modified_at);
            let kind = if item.is_folder {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            let entry = match IndexEntry::new(&path, kind, created_at, modified_at, item.size) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping remote item with unusable path");
                    report.skipped += 1;
                    continue;
                }
            };

            if item.is_folder {
                folders.push(RemoteAction::EnsureFolder(entry));
                continue;
            }

            if let Some(pending) = diff.upload_entry(&entry.path) {
                if entry.modified_at <= pending.modified_at {
                    debug!(path = %entry.path, "Local edit is newer, keeping it");
                    report.skipped += 1;
                    continue;
                }
            }
            downloads.push(RemoteAction::Download(entry, item));
        }

        (removals, folders, downloads)
    }

    async fn apply(&self, action: &RemoteAction) -> Result<(), SyncError> {
        match action {
            RemoteAction::Remove(path) => {
                self.vault
                    .remove(path)
                    .await
                    .map_err(|e| SyncError::Download {
                        path: path.clone(),
                        reason: SyncError::chain(&e),
                    })
            }
            RemoteAction::EnsureFolder(entry) => {
                let failed = |e: anyhow::Error| SyncError::Download {
                    path: entry.path.clone(),
                    reason: SyncError::chain(&e),
                };
                if !self.vault.exists(&entry.path).await.map_err(failed)? {
                    self.vault.create_folder(&entry.path).await.map_err(failed)?;
                }
                Ok(())
            }
            RemoteAction::Download(entry, item) => {
                let failed = |e: anyhow::Error| SyncError::Download {
                    path: entry.path.clone(),
                    reason: SyncError::chain(&e),
                };
                let data = self.remote.download(item).await.map_err(failed)?;
                let times = FileTimes {
                    created_at: Some(entry.created_at),
                    modified_at: Some(entry.modified_at),
                };
                self.vault
                    .write_binary(&entry.path, &data, times)
                    .await
                    .map_err(failed)
            }
        }
    }
}
