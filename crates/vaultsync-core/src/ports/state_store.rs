//! Persisted state port (config store)
//!
//! Holds everything that must survive restarts:
//!
//! - the remote [`DeltaCursor`] (`None` until the first clone)
//! - the last-synced remote [`IndexSnapshot`]
//! - the configured ignore patterns
//!
//! ## Atomicity
//!
//! [`IStateStore::update`] applies a mutator to the whole state and
//! persists the result in one step. Committing the cursor and the remote
//! snapshot inside the same mutator makes them change together or not at
//! all.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ignore::{sanitize_patterns, validate_patterns};
use crate::domain::{DeltaCursor, IndexSnapshot};

/// Mutation applied by [`IStateStore::update`]
pub type StateMutator = Box<dyn FnOnce(&mut PersistedState) + Send>;

/// Durable engine state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Remote continuation cursor; `None` means a clone is required
    pub cursor: Option<DeltaCursor>,
    /// Last-synced remote snapshot
    pub remote_index: IndexSnapshot,
    /// Ignore pattern sources, in order
    pub ignore_patterns: Vec<String>,
}

/// Load/update access to the persisted state
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    /// Load the current state (the default state if nothing was saved)
    async fn load(&self) -> Result<PersistedState>;

    /// Apply `mutator` and persist the result atomically
    ///
    /// Returns the state as written. On failure the stored state is left
    /// unchanged.
    async fn update(&self, mutator: StateMutator) -> Result<PersistedState>;

    /// Replace the cursor and the remote snapshot together
    async fn commit(&self, cursor: Option<DeltaCursor>, remote_index: IndexSnapshot) -> Result<()> {
        self.update(Box::new(move |state| {
            state.cursor = cursor;
            state.remote_index = remote_index;
        }))
        .await
        .map(|_| ())
    }

    /// Validate and persist a new list of ignore patterns
    ///
    /// Blank patterns are dropped. If any pattern is invalid nothing is
    /// written and the error names the first offender.
    async fn update_ignore_patterns(&self, patterns: Vec<String>) -> Result<Vec<String>> {
        if let Some((index, err)) = validate_patterns(&patterns).into_iter().next() {
            return Err(anyhow!("ignore.patterns[{index}]: {err}"));
        }
        let patterns = sanitize_patterns(&patterns);
        let stored = patterns.clone();
        self.update(Box::new(move |state| state.ignore_patterns = stored))
            .await?;
        Ok(patterns)
    }
}
