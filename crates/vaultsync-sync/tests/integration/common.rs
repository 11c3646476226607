//! Shared test doubles for the sync engine integration tests

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::Notify;

use vaultsync_core::domain::DeltaCursor;
use vaultsync_core::ports::{
    AuthStatus, FileTimes, IAuthProvider, ILocalVault, INotificationSink, IRemoteDrive,
    IStateStore, PersistedState, RemoteItem, RemoteListing, StateMutator, VaultListing, VaultStat,
};
use vaultsync_sync::transfer::TransferOptions;
use vaultsync_sync::{EngineOptions, EnginePorts, LocalVaultAdapter, SyncEngine};

pub const ROOT: &str = "Vault";

pub fn ts(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap()
}

pub fn cursor(s: &str) -> DeltaCursor {
    DeltaCursor::new(s).unwrap()
}

// ============================================================================
// MockRemote
// ============================================================================

/// In-memory remote drive recording every call
#[derive(Default)]
pub struct MockRemote {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub folders: Mutex<BTreeSet<String>>,
    /// Content served by `download`, keyed by item id
    pub contents: Mutex<HashMap<String, Vec<u8>>>,
    /// Scripted `incremental_listing` results, consumed in order
    pub feed: Mutex<VecDeque<Result<RemoteListing, String>>>,
    /// Scripted `full_listing` result
    pub full: Mutex<Option<Result<RemoteListing, String>>>,
    /// Remote paths whose uploads fail
    pub fail_uploads: Mutex<BTreeSet<String>>,
    /// Remote paths whose deletions fail
    pub fail_deletes: Mutex<BTreeSet<String>>,
    pub latest_fails: AtomicBool,
    latest_issued: AtomicUsize,
    pub calls: AtomicUsize,
    pub log: Mutex<Vec<String>>,
    /// When set, `incremental_listing` parks until `release` is notified
    pub hold_listing: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl MockRemote {
    fn record(&self, entry: String) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(entry);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn logged(&self, prefix: &str) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|l| l.starts_with(prefix))
            .collect()
    }

    pub fn push_feed(&self, items: Vec<RemoteItem>, next: &str) {
        self.feed.lock().unwrap().push_back(Ok(RemoteListing {
            items,
            cursor: cursor(next),
        }));
    }

    pub fn push_feed_error(&self, message: &str) {
        self.feed.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn set_full(&self, items: Vec<RemoteItem>, next: &str) {
        *self.full.lock().unwrap() = Some(Ok(RemoteListing {
            items,
            cursor: cursor(next),
        }));
    }

    pub fn serve(&self, id: &str, content: &[u8]) {
        self.contents
            .lock()
            .unwrap()
            .insert(id.to_string(), content.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn store_upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_uploads.lock().unwrap().contains(path) {
            return Err(anyhow!("HTTP 500 for {path}"));
        }
        self.files.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for MockRemote {
    async fn full_listing(&self, root: &str) -> Result<RemoteListing> {
        self.record(format!("full_listing {root}"));
        match self.full.lock().unwrap().take() {
            Some(Ok(listing)) => Ok(listing),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no full listing scripted")),
        }
    }

    async fn incremental_listing(&self, cursor: &DeltaCursor) -> Result<RemoteListing> {
        self.record(format!("incremental_listing {cursor}"));
        if self.hold_listing.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let next = self.feed.lock().unwrap().pop_front();
        match next {
            Some(Ok(listing)) => Ok(listing),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no feed scripted")),
        }
    }

    async fn latest_cursor(&self) -> Result<DeltaCursor> {
        self.record("latest_cursor".to_string());
        if self.latest_fails.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset"));
        }
        let n = self.latest_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(cursor(&format!("latest-{n}")))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.record(format!("exists {path}"));
        Ok(self.files.lock().unwrap().contains_key(path)
            || self.folders.lock().unwrap().contains(path))
    }

    async fn delete_by_path(&self, path: &str) -> Result<()> {
        self.record(format!("delete {path}"));
        if self.fail_deletes.lock().unwrap().contains(path) {
            return Err(anyhow!("HTTP 503 for {path}"));
        }
        let prefix = format!("{path}/");
        self.files
            .lock()
            .unwrap()
            .retain(|p, _| p != path && !p.starts_with(&prefix));
        self.folders
            .lock()
            .unwrap()
            .retain(|p| p != path && !p.starts_with(&prefix));
        Ok(())
    }

    async fn create_root_folder(&self, name: &str) -> Result<()> {
        self.record(format!("create_root_folder {name}"));
        self.folders.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        self.record(format!("create_folder {path}"));
        self.folders.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn upload_small(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.record(format!("upload_small {path}"));
        self.store_upload(path, data)
    }

    async fn upload_large(
        &self,
        path: &str,
        data: Vec<u8>,
        chunk_size: u64,
        progress: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
    ) -> Result<()> {
        self.record(format!("upload_large {path}"));
        let total = (data.len() as u64).div_ceil(chunk_size);
        for chunk in 1..=total {
            if let Some(report) = progress {
                report(chunk, total);
            }
        }
        self.store_upload(path, data)
    }

    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>> {
        self.record(format!("download {}", item.name));
        self.contents
            .lock()
            .unwrap()
            .get(&item.id)
            .cloned()
            .ok_or_else(|| anyhow!("no content for item {}", item.id))
    }
}

/// A feed item under the synced root; `parent` is vault-relative
pub fn remote_item(id: &str, parent: &str, name: &str, mtime: i64) -> RemoteItem {
    let parent_path = if parent.is_empty() {
        format!("/drive/root:/Apps/VaultSync/{ROOT}")
    } else {
        format!("/drive/root:/Apps/VaultSync/{ROOT}/{parent}")
    };
    RemoteItem {
        id: id.to_string(),
        name: name.to_string(),
        parent_path: Some(parent_path),
        created_at: Some(ts(mtime)),
        modified_at: Some(ts(mtime)),
        size: 0,
        is_folder: false,
        is_deleted: false,
        download_url: None,
    }
}

pub fn remote_folder(id: &str, parent: &str, name: &str, mtime: i64) -> RemoteItem {
    RemoteItem {
        is_folder: true,
        ..remote_item(id, parent, name, mtime)
    }
}

pub fn remote_deleted(id: &str, parent: &str, name: &str) -> RemoteItem {
    RemoteItem {
        is_deleted: true,
        created_at: None,
        modified_at: None,
        ..remote_item(id, parent, name, 0)
    }
}

// ============================================================================
// MemoryStateStore
// ============================================================================

#[derive(Default)]
pub struct MemoryStateStore {
    pub state: Mutex<PersistedState>,
    pub writes: AtomicUsize,
}

impl MemoryStateStore {
    pub fn with(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IStateStore for MemoryStateStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.snapshot())
    }

    async fn update(&self, mutator: StateMutator) -> Result<PersistedState> {
        let mut state = self.state.lock().unwrap();
        mutator(&mut *state);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(state.clone())
    }
}

// ============================================================================
// FixedAuth / RecordingSink
// ============================================================================

pub struct FixedAuth {
    pub status: Mutex<AuthStatus>,
}

impl FixedAuth {
    pub fn new(status: AuthStatus) -> Self {
        Self {
            status: Mutex::new(status),
        }
    }

    pub fn set(&self, status: AuthStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait::async_trait]
impl IAuthProvider for FixedAuth {
    async fn acquire_token(&self) -> Result<String> {
        Ok("test-access-token".to_string())
    }

    async fn status(&self) -> AuthStatus {
        *self.status.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn saw(&self, message: &str) -> bool {
        self.messages().iter().any(|m| m == message)
    }
}

impl INotificationSink for RecordingSink {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

// ============================================================================
// StubbornVault
// ============================================================================

/// Real vault on disk whose `remove` can be made to fail per path
pub struct StubbornVault {
    inner: LocalVaultAdapter,
    pub fail_removes: Mutex<BTreeSet<String>>,
}

impl StubbornVault {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalVaultAdapter::new(root),
            fail_removes: Mutex::new(BTreeSet::new()),
        }
    }
}

#[async_trait::async_trait]
impl ILocalVault for StubbornVault {
    async fn list(&self, path: &str) -> Result<VaultListing> {
        self.inner.list(path).await
    }

    async fn stat(&self, path: &str) -> Result<Option<VaultStat>> {
        self.inner.stat(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        self.inner.create_folder(path).await
    }

    async fn write_binary(&self, path: &str, data: &[u8], times: FileTimes) -> Result<()> {
        self.inner.write_binary(path, data, times).await
    }

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.read_binary(path).await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        if self.fail_removes.lock().unwrap().contains(path) {
            return Err(anyhow!("permission denied: {path}"));
        }
        self.inner.remove(path).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub dir: TempDir,
    pub remote: Arc<MockRemote>,
    pub vault: Arc<StubbornVault>,
    pub store: Arc<MemoryStateStore>,
    pub auth: Arc<FixedAuth>,
    pub sink: Arc<RecordingSink>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path(relative)).ok()
    }
}

/// Small limits so chunked uploads happen with tiny files:
/// more than 16 bytes goes through a session with 8-byte chunks
pub fn test_options() -> EngineOptions {
    EngineOptions {
        root_name: ROOT.to_string(),
        base_ignore_patterns: vec![r"\.vaultsync".to_string()],
        transfer: TransferOptions {
            concurrency: 4,
            small_upload_limit: 16,
            chunk_size: 8,
        },
    }
}

pub async fn harness_with(state: PersistedState, auth: AuthStatus) -> Harness {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MockRemote::default());
    let store = Arc::new(MemoryStateStore::with(state));
    let auth = Arc::new(FixedAuth::new(auth));
    let sink = Arc::new(RecordingSink::default());
    let vault = Arc::new(StubbornVault::new(dir.path()));

    let ports = EnginePorts {
        auth: auth.clone(),
        remote: remote.clone(),
        vault: vault.clone(),
        store: store.clone(),
        notifier: sink.clone(),
    };
    let engine = SyncEngine::open(ports, test_options()).await.unwrap();

    Harness {
        dir,
        remote,
        vault,
        store,
        auth,
        sink,
        engine,
    }
}

/// Authenticated harness with an existing cursor `c0`
pub async fn synced_harness(remote_index: vaultsync_core::domain::IndexSnapshot) -> Harness {
    let state = PersistedState {
        cursor: Some(cursor("c0")),
        remote_index,
        ignore_patterns: Vec::new(),
    };
    harness_with(state, AuthStatus::Authenticated).await
}

/// Write a local file and set its modification time
pub fn write_local(root: &Path, relative: &str, content: &[u8], mtime: i64) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    let ft = filetime::FileTime::from_unix_time(mtime / 1000, ((mtime % 1000) * 1_000_000) as u32);
    filetime::set_file_mtime(&path, ft).unwrap();
}

pub fn file_entry(path: &str, mtime: i64, size: u64) -> vaultsync_core::domain::IndexEntry {
    vaultsync_core::domain::IndexEntry::new(
        path,
        vaultsync_core::domain::EntryKind::File,
        ts(mtime),
        ts(mtime),
        size,
    )
    .unwrap()
}

pub fn index_of(
    entries: Vec<vaultsync_core::domain::IndexEntry>,
) -> vaultsync_core::domain::IndexSnapshot {
    entries.into_iter().map(|e| (e.path.clone(), e)).collect()
}
