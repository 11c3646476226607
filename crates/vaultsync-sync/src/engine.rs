//! Sync orchestrator
//!
//! The [`SyncEngine`] sequences the index builder, the diff engine and the
//! transfer executor into the top-level operations:
//!
//! | Operation | Needs cursor | Flow |
//! |---|---|---|
//! | [`pull`](SyncEngine::pull) | yes | incremental listing → apply feed → commit cursor + snapshot |
//! | [`push`](SyncEngine::push) | yes | delete batch → upload batch → commit → latest cursor → commit |
//! | [`sync`](SyncEngine::sync) | yes | pull, then push |
//! | [`clone_to_local`](SyncEngine::clone_to_local) | no | full listing → clear local → download all → commit → rebuild diff |
//! | [`clone_to_remote`](SyncEngine::clone_to_remote) | no | recreate root → upload all → latest cursor → commit |
//!
//! ## Admission
//!
//! Every operation first asks the auth provider for its status, then moves
//! the [`SyncStateCell`] from `Idle` to `Busy` with a compare-and-swap. A
//! refused operation returns a [`SyncReport`] carrying the reason, which is
//! also sent to the notification sink; nothing else happens.
//!
//! ## Commit discipline
//!
//! Each operation works on a copy of the persisted remote snapshot and
//! commits it together with the cursor once its phase completes. A phase
//! that aborts commits nothing, so the last good cursor stays in place.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, instrument, warn};

use vaultsync_core::config::Config;
use vaultsync_core::domain::ignore::validate_patterns;
use vaultsync_core::domain::{
    DeltaCursor, DiffSet, DomainError, IgnoreRuleSet, IndexEntry, IndexSnapshot, SyncState,
    SyncStateCell, SyncStateGuard,
};
use vaultsync_core::ports::{
    AuthStatus, IAuthProvider, ILocalVault, INotificationSink, IRemoteDrive, IStateStore,
    PersistedState,
};

use crate::diff::{apply_change, diff_full, LocalChange};
use crate::index::LocalIndexBuilder;
use crate::transfer::{BatchReport, TransferExecutor, TransferOptions};
use crate::watcher::{FsEvent, FsEventKind};
use crate::SyncError;

pub const SIGN_IN_REQUIRED: &str = "Sign in required";
pub const NEED_CLONING: &str = "Need cloning first";
pub const INDEXING_IN_PROGRESS: &str = "Indexing is in progress. Try again later.";
pub const OPERATION_IN_PROGRESS: &str = "Something is in progress. Try again later.";

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of one top-level operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files written locally and folders mirrored locally
    pub downloaded: usize,
    /// Files and folders sent to the remote
    pub uploaded: usize,
    /// Paths removed on either side
    pub deleted: usize,
    /// Feed items outside the root, ignored, or superseded by local edits
    pub skipped: usize,
    /// Paths whose transfer failed; they stay pending
    pub failed: Vec<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Why the operation did not start, if it was refused
    pub refused: Option<String>,
}

impl SyncReport {
    /// A report for an operation that did not start
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            refused: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_refused(&self) -> bool {
        self.refused.is_some()
    }

    fn absorb_pull(&mut self, batch: BatchReport) {
        self.downloaded += batch.transferred;
        self.deleted += batch.removed;
        self.skipped += batch.skipped;
        self.failed.extend(batch.failed);
    }

    fn absorb_push(&mut self, batch: BatchReport) {
        self.uploaded += batch.transferred;
        self.deleted += batch.removed;
        self.skipped += batch.skipped;
        self.failed.extend(batch.failed);
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub state: SyncState,
    pub auth: AuthStatus,
    pub has_cursor: bool,
    pub remote_entries: usize,
    /// `(uploads, deletions)`; `None` until the diff has been built
    pub pending: Option<(usize, usize)>,
    /// Effective ignore patterns, configured ones first
    pub ignore_patterns: Vec<String>,
}

// ============================================================================
// Construction
// ============================================================================

/// Adapters the engine drives
#[derive(Clone)]
pub struct EnginePorts {
    pub auth: Arc<dyn IAuthProvider>,
    pub remote: Arc<dyn IRemoteDrive>,
    pub vault: Arc<dyn ILocalVault>,
    pub store: Arc<dyn IStateStore>,
    pub notifier: Arc<dyn INotificationSink>,
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Root folder name under the remote app folder
    pub root_name: String,
    /// Patterns from the configuration file; persisted ones are added
    pub base_ignore_patterns: Vec<String>,
    pub transfer: TransferOptions,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root_name: config.remote_root_name(),
            base_ignore_patterns: config.ignore.patterns.clone(),
            transfer: TransferOptions {
                concurrency: config.sync.concurrency,
                small_upload_limit: config.large_files.threshold_bytes(),
                chunk_size: config.large_files.chunk_size_bytes(),
            },
        }
    }
}

fn invalid_pattern(source: DomainError) -> SyncError {
    let pattern = match &source {
        DomainError::InvalidPattern { pattern, .. } => pattern.clone(),
        other => other.to_string(),
    };
    SyncError::InvalidPattern { pattern, source }
}

fn compile_rules(base: &[String], persisted: &[String]) -> Result<IgnoreRuleSet, SyncError> {
    let combined: Vec<&String> = base.iter().chain(persisted).collect();
    IgnoreRuleSet::compile(&combined).map_err(invalid_pattern)
}

fn local_failure(e: anyhow::Error) -> SyncError {
    SyncError::LocalVault(SyncError::chain(&e))
}

fn state_failure(e: anyhow::Error) -> SyncError {
    SyncError::State(SyncError::chain(&e))
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

enum Admission {
    Granted(SyncStateGuard, PersistedState),
    Refused(&'static str),
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Two-way synchronization orchestrator
pub struct SyncEngine {
    auth: Arc<dyn IAuthProvider>,
    remote: Arc<dyn IRemoteDrive>,
    vault: Arc<dyn ILocalVault>,
    store: Arc<dyn IStateStore>,
    notifier: Arc<dyn INotificationSink>,
    indexer: LocalIndexBuilder,
    executor: TransferExecutor,
    root_name: String,
    base_patterns: Vec<String>,
    rules: RwLock<Arc<IgnoreRuleSet>>,
    /// `None` until the first full diff
    diff: Mutex<Option<DiffSet>>,
    state: SyncStateCell,
}

impl SyncEngine {
    /// Create an engine, compiling the configured and persisted ignore
    /// patterns
    ///
    /// The diff starts unbuilt; [`rebuild_diff`](Self::rebuild_diff) builds
    /// it, and `push` builds it on demand.
    ///
    /// # Errors
    /// - `SyncError::State` if the persisted state cannot be loaded
    /// - `SyncError::InvalidPattern` if a pattern does not compile
    pub async fn open(ports: EnginePorts, options: EngineOptions) -> Result<Self, SyncError> {
        let persisted = ports.store.load().await.map_err(state_failure)?;
        let rules = compile_rules(&options.base_ignore_patterns, &persisted.ignore_patterns)?;

        let executor = TransferExecutor::new(
            Arc::clone(&ports.remote),
            Arc::clone(&ports.vault),
            Arc::clone(&ports.notifier),
            options.root_name.clone(),
            options.transfer,
        );

        info!(
            root = %options.root_name,
            ignore_rules = rules.len(),
            has_cursor = persisted.cursor.is_some(),
            "Sync engine ready"
        );

        Ok(Self {
            auth: ports.auth,
            remote: ports.remote,
            indexer: LocalIndexBuilder::new(Arc::clone(&ports.vault)),
            vault: ports.vault,
            store: ports.store,
            notifier: ports.notifier,
            executor,
            root_name: options.root_name,
            base_patterns: options.base_ignore_patterns,
            rules: RwLock::new(Arc::new(rules)),
            diff: Mutex::new(None),
            state: SyncStateCell::new(),
        })
    }

    /// Current orchestrator state
    pub fn state(&self) -> SyncState {
        self.state.current()
    }

    /// A copy of the pending work, if the diff has been built
    pub async fn pending(&self) -> Option<DiffSet> {
        self.diff.lock().await.clone()
    }

    async fn rules(&self) -> Arc<IgnoreRuleSet> {
        Arc::clone(&*self.rules.read().await)
    }

    async fn load_state(&self) -> Result<PersistedState, SyncError> {
        self.store.load().await.map_err(state_failure)
    }

    async fn commit(
        &self,
        cursor: Option<DeltaCursor>,
        remote_index: IndexSnapshot,
    ) -> Result<(), SyncError> {
        let entries = remote_index.len();
        self.store
            .commit(cursor, remote_index)
            .await
            .map_err(state_failure)?;
        debug!(entries, "Committed remote snapshot");
        Ok(())
    }

    /// Classify a failed remote phase
    async fn remote_failure(&self, e: anyhow::Error) -> SyncError {
        let reason = SyncError::chain(&e);
        if self.auth.status().await.allows_sync() {
            SyncError::RemoteUnavailable(reason)
        } else {
            SyncError::Auth(reason)
        }
    }

    fn refuse(&self, operation: &str, reason: &str) -> SyncReport {
        info!(operation, reason, "Operation refused");
        self.notifier.notify(reason);
        SyncReport::refused(reason)
    }

    fn aborted(&self, operation: &str, e: SyncError) -> SyncError {
        error!(operation, error = %e, "Operation aborted");
        e
    }

    async fn admit(&self, require_cursor: bool) -> Result<Admission, SyncError> {
        if !self.auth.status().await.allows_sync() {
            return Ok(Admission::Refused(SIGN_IN_REQUIRED));
        }

        let guard = match self.state.try_begin(SyncState::Busy) {
            Ok(guard) => guard,
            Err(SyncState::Indexing) => return Ok(Admission::Refused(INDEXING_IN_PROGRESS)),
            Err(_) => return Ok(Admission::Refused(OPERATION_IN_PROGRESS)),
        };

        let persisted = self.load_state().await?;
        if require_cursor && persisted.cursor.is_none() {
            return Ok(Admission::Refused(NEED_CLONING));
        }
        Ok(Admission::Granted(guard, persisted))
    }

    /// Build the local index and diff it against `remote_index`
    async fn compute_diff(
        &self,
        rules: &IgnoreRuleSet,
        remote_index: &IndexSnapshot,
    ) -> Result<DiffSet, SyncError> {
        let local = self.indexer.build(rules).await.map_err(local_failure)?;
        Ok(diff_full(&local, remote_index, rules))
    }

    async fn ensure_diff<'a>(
        &self,
        slot: &'a mut MutexGuard<'_, Option<DiffSet>>,
        rules: &IgnoreRuleSet,
        remote_index: &IndexSnapshot,
    ) -> Result<&'a mut DiffSet, SyncError> {
        if slot.is_none() {
            **slot = Some(self.compute_diff(rules, remote_index).await?);
        }
        Ok(slot.get_or_insert_with(DiffSet::new))
    }

    // ------------------------------------------------------------------------
    // Top-level operations
    // ------------------------------------------------------------------------

    /// Apply remote changes since the stored cursor
    #[instrument(skip(self))]
    pub async fn pull(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let (_guard, persisted) = match self.admit(true).await? {
            Admission::Granted(guard, persisted) => (guard, persisted),
            Admission::Refused(reason) => return Ok(self.refuse("pull", reason)),
        };

        let mut report = SyncReport::default();
        self.pull_phase(persisted, &mut report)
            .await
            .map_err(|e| self.aborted("pull", e))?;
        Ok(report.finish(started))
    }

    /// Send pending local changes
    #[instrument(skip(self))]
    pub async fn push(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let (_guard, persisted) = match self.admit(true).await? {
            Admission::Granted(guard, persisted) => (guard, persisted),
            Admission::Refused(reason) => return Ok(self.refuse("push", reason)),
        };

        let mut report = SyncReport::default();
        self.push_phase(persisted, &mut report)
            .await
            .map_err(|e| self.aborted("push", e))?;
        Ok(report.finish(started))
    }

    /// Pull, then push, under one admission
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let (_guard, persisted) = match self.admit(true).await? {
            Admission::Granted(guard, persisted) => (guard, persisted),
            Admission::Refused(reason) => return Ok(self.refuse("sync", reason)),
        };

        let mut report = SyncReport::default();
        let result = async {
            self.pull_phase(persisted, &mut report).await?;
            let persisted = self.load_state().await?;
            self.push_phase(persisted, &mut report).await
        }
        .await;
        result.map_err(|e| self.aborted("sync", e))?;
        Ok(report.finish(started))
    }

    /// Replace the local vault with the remote root's content
    ///
    /// Ignored local entries are kept.
    #[instrument(skip(self))]
    pub async fn clone_to_local(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let _guard = match self.admit(false).await? {
            Admission::Granted(guard, _) => guard,
            Admission::Refused(reason) => return Ok(self.refuse("clone_to_local", reason)),
        };

        self.notifier.notify("Cloning from OneDrive to local vault");
        let mut report = SyncReport::default();
        self.clone_to_local_phase(&mut report)
            .await
            .map_err(|e| self.aborted("clone_to_local", e))?;
        self.notifier.notify("Finished cloning");
        Ok(report.finish(started))
    }

    /// Replace the remote root with the local vault's content
    #[instrument(skip(self))]
    pub async fn clone_to_remote(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let _guard = match self.admit(false).await? {
            Admission::Granted(guard, _) => guard,
            Admission::Refused(reason) => return Ok(self.refuse("clone_to_remote", reason)),
        };

        self.notifier.notify("Cloning local vault to OneDrive");
        let mut report = SyncReport::default();
        self.clone_to_remote_phase(&mut report)
            .await
            .map_err(|e| self.aborted("clone_to_remote", e))?;
        self.notifier.notify("Finished cloning");
        Ok(report.finish(started))
    }

    // ------------------------------------------------------------------------
    // Phases (run while holding the Busy guard)
    // ------------------------------------------------------------------------

    async fn pull_phase(
        &self,
        persisted: PersistedState,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let Some(cursor) = persisted.cursor else {
            return Err(SyncError::Precondition(NEED_CLONING.to_string()));
        };

        let listing = match self.remote.incremental_listing(&cursor).await {
            Ok(listing) => listing,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        info!(items = listing.items.len(), "Fetched remote changes");

        let rules = self.rules().await;
        let mut remote_index = persisted.remote_index;
        let mut slot = self.diff.lock().await;
        let diff = self.ensure_diff(&mut slot, &rules, &remote_index).await?;

        let batch = self
            .executor
            .download_or_delete_batch(listing.items, &rules, diff, &mut remote_index)
            .await;
        report.absorb_pull(batch);

        self.commit(Some(listing.cursor), remote_index).await?;
        self.notifier.notify("Finished pulling");
        Ok(())
    }

    async fn push_phase(
        &self,
        persisted: PersistedState,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let rules = self.rules().await;
        let cursor = persisted.cursor;
        let mut remote_index = persisted.remote_index;
        let mut slot = self.diff.lock().await;
        let diff = self.ensure_diff(&mut slot, &rules, &remote_index).await?;

        let deletions: Vec<String> = diff
            .to_delete()
            .iter()
            .filter(|p| !rules.is_ignored(p))
            .cloned()
            .collect();
        let uploads: Vec<IndexEntry> = diff
            .to_upload()
            .values()
            .filter(|e| !rules.is_ignored(&e.path))
            .cloned()
            .collect();
        info!(
            deletions = deletions.len(),
            uploads = uploads.len(),
            "Pushing local changes"
        );

        let deleted = self
            .executor
            .delete_batch(deletions, diff, &mut remote_index)
            .await;
        let uploaded = self
            .executor
            .upload_batch(uploads, diff, &mut remote_index)
            .await;
        let changed = deleted.removed + uploaded.transferred > 0;
        report.absorb_push(deleted);
        report.absorb_push(uploaded);

        // Keep finished transfers even if the cursor fetch below fails.
        if changed {
            self.commit(cursor, remote_index.clone()).await?;
        }

        let latest = match self.remote.latest_cursor().await {
            Ok(latest) => latest,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        self.commit(Some(latest), remote_index).await?;
        self.notifier.notify("Finished pushing");
        Ok(())
    }

    async fn clone_to_local_phase(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let rules = self.rules().await;

        let listing = match self.remote.full_listing(&self.root_name).await {
            Ok(listing) => listing,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        info!(items = listing.items.len(), "Fetched full remote listing");

        report.deleted += self.clear_local(&rules).await?;

        let mut slot = self.diff.lock().await;
        let mut scratch = DiffSet::new();
        let mut remote_index = IndexSnapshot::new();
        let batch = self
            .executor
            .download_or_delete_batch(listing.items, &rules, &mut scratch, &mut remote_index)
            .await;
        report.absorb_pull(batch);

        self.commit(Some(listing.cursor), remote_index.clone()).await?;
        *slot = Some(self.compute_diff(&rules, &remote_index).await?);
        Ok(())
    }

    async fn clone_to_remote_phase(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let rules = self.rules().await;
        let root = self.root_name.as_str();

        let setup = async {
            if self.remote.exists(root).await? {
                info!(root, "Removing existing remote root");
                self.remote.delete_by_path(root).await?;
            }
            self.remote.create_root_folder(root).await
        };
        if let Err(e) = setup.await {
            return Err(self.remote_failure(e).await);
        }

        let local = self.indexer.build(&rules).await.map_err(local_failure)?;
        let mut slot = self.diff.lock().await;
        let mut remote_index = IndexSnapshot::new();
        let mut pending = diff_full(&local, &remote_index, &rules);
        let uploads: Vec<IndexEntry> = pending.to_upload().values().cloned().collect();

        let batch = self
            .executor
            .upload_batch(uploads, &mut pending, &mut remote_index)
            .await;
        report.absorb_push(batch);

        // The old cursor describes the root that was just deleted.
        self.commit(None, remote_index.clone()).await?;
        *slot = Some(pending);

        let latest = match self.remote.latest_cursor().await {
            Ok(latest) => latest,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        self.commit(Some(latest), remote_index).await
    }

    /// Remove every non-ignored local entry; returns how many went
    async fn clear_local(&self, rules: &IgnoreRuleSet) -> Result<usize, SyncError> {
        let mut removed = 0;
        let mut folders = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(folder) = pending.pop() {
            let listing = self.vault.list(&folder).await.map_err(local_failure)?;
            for file in listing.files {
                if rules.is_ignored(&file) {
                    continue;
                }
                self.vault.remove(&file).await.map_err(local_failure)?;
                removed += 1;
            }
            for sub in listing.folders {
                if rules.is_ignored(&sub) {
                    continue;
                }
                pending.push(sub.clone());
                folders.push(sub);
            }
        }

        // Deepest first; folders still holding ignored content stay.
        folders.sort_by_key(|f| std::cmp::Reverse(depth(f)));
        for folder in folders {
            let listing = self.vault.list(&folder).await.map_err(local_failure)?;
            if listing.files.is_empty() && listing.folders.is_empty() {
                self.vault.remove(&folder).await.map_err(local_failure)?;
                removed += 1;
            }
        }

        debug!(removed, "Cleared local vault");
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Diff maintenance
    // ------------------------------------------------------------------------

    /// Rebuild the pending work from a fresh local index
    ///
    /// Returns the `(uploads, deletions)` counts.
    ///
    /// # Errors
    /// `SyncError::Precondition` when another operation is running
    #[instrument(skip(self))]
    pub async fn rebuild_diff(&self) -> Result<(usize, usize), SyncError> {
        let _guard = self
            .state
            .try_begin(SyncState::Indexing)
            .map_err(|state| {
                let reason = match state {
                    SyncState::Indexing => INDEXING_IN_PROGRESS,
                    _ => OPERATION_IN_PROGRESS,
                };
                SyncError::Precondition(reason.to_string())
            })?;

        let persisted = self.load_state().await?;
        let rules = self.rules().await;
        let diff = self.compute_diff(&rules, &persisted.remote_index).await?;
        let counts = diff.counts();
        *self.diff.lock().await = Some(diff);

        info!(uploads = counts.0, deletions = counts.1, "Diff rebuilt");
        Ok(counts)
    }

    /// Fold one filesystem event into the pending work
    ///
    /// The filesystem is consulted for the event's paths, so a stale event
    /// (file already gone, or re-created) resolves to what is actually on
    /// disk. Events arriving before the first full diff are dropped; that
    /// diff will see their effect.
    #[instrument(skip(self))]
    pub async fn handle_fs_event(&self, event: FsEvent) -> Result<(), SyncError> {
        let rules = self.rules().await;
        let old_ignored = event.old_path.as_deref().map_or(true, |p| rules.is_ignored(p));
        if rules.is_ignored(&event.path) && old_ignored {
            return Ok(());
        }

        let changes = self.resolve_event(&event, &rules).await?;
        if changes.is_empty() {
            return Ok(());
        }

        let persisted = self.load_state().await?;
        let mut slot = self.diff.lock().await;
        let Some(diff) = slot.as_mut() else {
            debug!("Diff not built yet, event left to the next rebuild");
            return Ok(());
        };
        for change in changes {
            apply_change(diff, &persisted.remote_index, &rules, change);
        }
        Ok(())
    }

    async fn resolve_event(
        &self,
        event: &FsEvent,
        rules: &IgnoreRuleSet,
    ) -> Result<Vec<LocalChange>, SyncError> {
        let mut changes = Vec::new();

        let current = self.local_entry(&event.path).await?;
        let subtree = match &current {
            Some(entry) if entry.is_folder() => self
                .indexer
                .build_under(&entry.path, rules)
                .await
                .map_err(local_failure)?,
            _ => IndexSnapshot::new(),
        };

        match (event.kind, event.old_path.as_deref()) {
            (FsEventKind::Renamed, Some(from)) => changes.push(LocalChange::Renamed {
                from: from.to_string(),
                to: current,
            }),
            _ => changes.push(match current {
                Some(entry) => LocalChange::Upserted(entry),
                None => LocalChange::Removed(event.path.clone()),
            }),
        }
        changes.extend(subtree.into_values().map(LocalChange::Upserted));
        Ok(changes)
    }

    async fn local_entry(&self, path: &str) -> Result<Option<IndexEntry>, SyncError> {
        let Some(stat) = self.vault.stat(path).await.map_err(local_failure)? else {
            return Ok(None);
        };
        match IndexEntry::new(path, stat.kind, stat.created_at, stat.modified_at, stat.size) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path, error = %e, "Ignoring event for unusable path");
                Ok(None)
            }
        }
    }

    /// Validate, persist and apply new user ignore patterns
    ///
    /// The configured patterns always stay in effect. On success the diff
    /// is rebuilt, or dropped for a later rebuild if an operation is
    /// running. Returns the stored patterns.
    ///
    /// # Errors
    /// `SyncError::InvalidPattern` for the first invalid pattern; nothing
    /// is persisted in that case
    #[instrument(skip(self))]
    pub async fn update_ignore_patterns(
        &self,
        patterns: Vec<String>,
    ) -> Result<Vec<String>, SyncError> {
        if let Some((_, source)) = validate_patterns(&patterns).into_iter().next() {
            return Err(invalid_pattern(source));
        }

        let stored = self
            .store
            .update_ignore_patterns(patterns)
            .await
            .map_err(state_failure)?;
        let rules = compile_rules(&self.base_patterns, &stored)?;
        info!(rules = rules.len(), "Ignore rules updated");
        *self.rules.write().await = Arc::new(rules);

        match self.rebuild_diff().await {
            Ok(_) => {}
            Err(SyncError::Precondition(reason)) => {
                debug!(reason = %reason, "Diff rebuild deferred");
                *self.diff.lock().await = None;
            }
            Err(e) => return Err(e),
        }
        Ok(stored)
    }

    /// Snapshot of auth, cursor and pending-work state
    pub async fn status(&self) -> Result<EngineStatus, SyncError> {
        let persisted = self.load_state().await?;
        let pending = self.diff.lock().await.as_ref().map(DiffSet::counts);
        let ignore_patterns = self
            .rules()
            .await
            .patterns()
            .map(str::to_string)
            .collect();

        Ok(EngineStatus {
            state: self.state.current(),
            auth: self.auth.status().await,
            has_cursor: persisted.cursor.is_some(),
            remote_entries: persisted.remote_index.len(),
            pending,
            ignore_patterns,
        })
    }
}
