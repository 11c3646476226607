//! VaultSync Sync - Two-way synchronization engine
//!
//! Provides:
//! - Local index building with ignore-rule pruning
//! - Full and event-driven diffing against the last-synced remote snapshot
//! - Bounded-concurrency transfer batches
//! - The pull/push/sync/clone orchestrator
//!
//! ## Modules
//!
//! - [`engine`] - Sync orchestrator and its atomic state guard
//! - [`transfer`] - Upload, download and delete batches
//! - [`diff`] - Full and incremental diff computation
//! - [`index`] - Local index builder
//! - [`watcher`] - Filesystem change events for the incremental diff
//! - [`filesystem`] - Local vault adapter (atomic writes, mtime preservation)

pub mod diff;
pub mod engine;
pub mod filesystem;
pub mod index;
pub mod transfer;
pub mod watcher;

pub use engine::{EngineOptions, EnginePorts, EngineStatus, SyncEngine, SyncReport};
pub use filesystem::LocalVaultAdapter;
pub use watcher::{FileWatcher, FsEvent, FsEventKind};

use thiserror::Error;

use vaultsync_core::domain::DomainError;

/// Errors surfaced by the synchronization engine
///
/// Per-item transfer failures (`Upload`, `Download`) are recovered inside a
/// batch and only show up in logs and in [`SyncReport::failed`]. The other
/// variants abort the top-level operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No usable credential
    #[error("Authentication required: {0}")]
    Auth(String),

    /// An ignore pattern does not compile; nothing was persisted
    #[error("Invalid ignore pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: DomainError,
    },

    /// A listing, cursor fetch or root-folder setup failed
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Uploading a single item failed
    #[error("Upload of {path} failed: {reason}")]
    Upload { path: String, reason: String },

    /// Downloading or applying a single remote item failed
    #[error("Download of {path} failed: {reason}")]
    Download { path: String, reason: String },

    /// The operation cannot start right now
    #[error("{0}")]
    Precondition(String),

    /// The local vault could not be read or written
    #[error("Local vault error: {0}")]
    LocalVault(String),

    /// The persisted state could not be loaded or committed
    #[error("State store error: {0}")]
    State(String),

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Render an `anyhow` chain on one line
    pub(crate) fn chain(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}
