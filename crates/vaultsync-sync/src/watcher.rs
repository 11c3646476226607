//! File watching and debounced change queue
//!
//! [`FileWatcher`] wraps the `notify` crate and turns raw OS events under
//! the vault root into vault-relative [`FsEvent`] values on a channel.
//! [`DebouncedChangeQueue`] coalesces bursts of events per path so an
//! editor's save sequence reaches the diff engine once.
//!
//! ```text
//! inotify
//!    │
//!    ▼
//! FileWatcher ──→ mpsc::channel ──→ DebouncedChangeQueue ──→ SyncEngine::handle_fs_event
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// A local change, with vault-relative paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: String,
    /// Source path of a rename
    pub old_path: Option<String>,
}

impl FsEvent {
    pub fn created(path: impl Into<String>) -> Self {
        Self::simple(FsEventKind::Created, path)
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::simple(FsEventKind::Modified, path)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::simple(FsEventKind::Deleted, path)
    }

    pub fn renamed(old_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: FsEventKind::Renamed,
            path: path.into(),
            old_path: Some(old_path.into()),
        }
    }

    fn simple(kind: FsEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path: None,
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches the vault root recursively using the OS-native mechanism
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Creates a watcher for `root` and the receiver of its events
    ///
    /// Watching starts with [`FileWatcher::start`].
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<(Self, mpsc::Receiver<FsEvent>)> {
        let root = root.into();
        let (tx, rx) = mpsc::channel::<FsEvent>(1024);
        let callback_root = root.clone();

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&callback_root, &event) {
                        if let Err(e) = tx.blocking_send(change) {
                            warn!(error = %e, "Failed to send change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher, root }, rx))
    }

    /// Starts the recursive watch on the vault root
    ///
    /// # Errors
    /// Returns an error if the root cannot be watched (missing, permissions,
    /// inotify watch limit reached)
    pub fn start(&mut self) -> Result<()> {
        info!(path = %self.root.display(), "Starting recursive watch");
        self.watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", self.root.display()))
    }

    /// Stops watching the vault root
    pub fn stop(&mut self) -> Result<()> {
        info!(path = %self.root.display(), "Stopping watch");
        self.watcher
            .unwatch(&self.root)
            .with_context(|| format!("Failed to unwatch path: {}", self.root.display()))
    }
}

/// Vault-relative `/`-separated form of `path`, `None` outside the root
fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_str()?.to_string()),
            _ => return None,
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Converts a `notify::Event` into an [`FsEvent`]
///
/// - `Create(*)` → `Created`
/// - `Modify(Name(Both))` with 2 paths → `Renamed`
/// - `Modify(Name(From))` → `Deleted`, `Modify(Name(To))` → `Created`
/// - `Remove(*)` → `Deleted`
/// - other `Modify(*)` → `Modified`
///
/// Access events and paths outside the root yield `None`.
fn map_notify_event(root: &Path, event: &notify::Event) -> Option<FsEvent> {
    let first = || event.paths.first().and_then(|p| relative_to(root, p));

    let mapped = match &event.kind {
        EventKind::Create(_) => FsEvent::created(first()?),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (event.paths.first(), event.paths.get(1)) {
                (Some(old), Some(new)) => {
                    match (relative_to(root, old), relative_to(root, new)) {
                        (Some(old), Some(new)) => FsEvent::renamed(old, new),
                        // Moved in from outside the vault
                        (None, Some(new)) => FsEvent::created(new),
                        // Moved out of the vault
                        (Some(old), None) => FsEvent::deleted(old),
                        (None, None) => return None,
                    }
                }
                _ => FsEvent::modified(first()?),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FsEvent::deleted(first()?),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FsEvent::created(first()?),
        EventKind::Remove(_) => FsEvent::deleted(first()?),
        EventKind::Modify(_) => FsEvent::modified(first()?),
        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            return None;
        }
    };

    debug!(kind = ?mapped.kind, path = %mapped.path, "Mapped watcher event");
    Some(mapped)
}

// ============================================================================
// DebouncedChangeQueue
// ============================================================================

/// Queue that coalesces rapid changes into settled events
///
/// The latest event per path wins and restarts that path's quiet period.
/// [`poll`](DebouncedChangeQueue::poll) yields events that have been quiet
/// for at least the debounce delay.
pub struct DebouncedChangeQueue {
    pending: HashMap<String, (FsEvent, Instant)>,
    debounce_delay: Duration,
}

impl DebouncedChangeQueue {
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
        }
    }

    /// Inserts or replaces the pending event for the event's path
    ///
    /// A rename also settles any pending event of its source path, since
    /// that path no longer exists.
    pub fn push(&mut self, event: FsEvent) {
        self.push_at(event, Instant::now());
    }

    fn push_at(&mut self, event: FsEvent, at: Instant) {
        if let Some(old) = &event.old_path {
            self.pending.remove(old);
        }
        self.pending.insert(event.path.clone(), (event, at));
    }

    /// Removes and returns all events quiet for the debounce delay
    pub fn poll(&mut self) -> Vec<FsEvent> {
        self.poll_at(Instant::now())
    }

    fn poll_at(&mut self, now: Instant) -> Vec<FsEvent> {
        let ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now.duration_since(*at) >= self.debounce_delay)
            .map(|(path, _)| path.clone())
            .collect();

        let mut events: Vec<FsEvent> = ready
            .iter()
            .filter_map(|path| self.pending.remove(path).map(|(event, _)| event))
            .collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
