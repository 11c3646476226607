//! JSON-file implementation of the IStateStore port
//!
//! The whole [`PersistedState`] lives in a single JSON document. Every
//! update writes a sibling temp file, flushes it, then renames it over the
//! target, so readers see either the old document or the new one and never
//! a partial write. Updates are serialized through an async mutex.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use vaultsync_core::ports::{IStateStore, PersistedState, StateMutator};

use crate::CacheError;

/// State store backed by one JSON file
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn read(&self) -> Result<PersistedState, CacheError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, using defaults");
                Ok(PersistedState::default())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write(&self, state: &PersistedState) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(state).map_err(|source| CacheError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&json).await.map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IStateStore for JsonStateStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.read().await?)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn update(&self, mutator: StateMutator) -> Result<PersistedState> {
        let _guard = self.write_lock.lock().await;

        let mut state = self.read().await?;
        mutator(&mut state);
        self.write(&state).await?;

        debug!(
            entries = state.remote_index.len(),
            has_cursor = state.cursor.is_some(),
            "State persisted"
        );
        Ok(state)
    }
}
