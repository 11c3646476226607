//! VaultSync Cache - Persisted sync state
//!
//! JSON-file storage for:
//! - The remote delta cursor
//! - The last-synced remote index snapshot
//! - The configured ignore patterns
//!
//! ## Architecture
//!
//! This crate implements the `IStateStore` port from `vaultsync-core`. It
//! is a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use vaultsync_cache::JsonStateStore;
//! use vaultsync_core::ports::IStateStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = JsonStateStore::new(PathBuf::from("/home/user/.local/share/vaultsync/Vault.state.json"));
//! let state = store.load().await?;
//! println!("cursor present: {}", state.cursor.is_some());
//! # Ok(())
//! # }
//! ```

pub mod store;

pub use store::JsonStateStore;

/// Errors that can occur while reading or writing the state file
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The state file could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not valid JSON for the expected shape
    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
