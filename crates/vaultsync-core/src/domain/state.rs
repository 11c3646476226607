//! Orchestrator state machine
//!
//! The orchestrator is either `Idle`, rebuilding its diff (`Indexing`) or
//! running a transfer operation (`Busy`). Triggers may fire concurrently
//! (CLI command, file watcher, poll timer), so the state lives in an atomic
//! and every transition out of `Idle` is a compare-and-swap.
//!
//! ```text
//! Idle ──try_begin(Indexing)──▶ Indexing ──drop(guard)──▶ Idle
//! Idle ──try_begin(Busy)──────▶ Busy     ──drop(guard)──▶ Idle
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Current activity of the sync orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SyncState {
    Idle = 0,
    Indexing = 1,
    Busy = 2,
}

impl SyncState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SyncState::Indexing,
            2 => SyncState::Busy,
            _ => SyncState::Idle,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::Indexing => "indexing",
            SyncState::Busy => "busy",
        };
        write!(f, "{s}")
    }
}

/// Shared atomic holder of the [`SyncState`]
///
/// Cloning the cell shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct SyncStateCell {
    inner: Arc<AtomicU8>,
}

impl SyncStateCell {
    /// Create a cell in the `Idle` state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state (a snapshot; may change immediately after)
    #[must_use]
    pub fn current(&self) -> SyncState {
        SyncState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Atomically move from `Idle` to `target`
    ///
    /// Returns a guard that resets the state to `Idle` when dropped, so an
    /// early return or error inside the operation cannot leave the
    /// orchestrator stuck.
    ///
    /// # Errors
    /// Returns the state that was observed if it was not `Idle`
    pub fn try_begin(&self, target: SyncState) -> Result<SyncStateGuard, SyncState> {
        debug_assert_ne!(target, SyncState::Idle);
        self.inner
            .compare_exchange(
                SyncState::Idle as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| SyncStateGuard {
                cell: self.clone(),
                state: target,
            })
            .map_err(SyncState::from_u8)
    }
}

/// RAII token for a non-idle state; resets to `Idle` on drop
#[derive(Debug)]
#[must_use = "dropping the guard immediately returns the state to Idle"]
pub struct SyncStateGuard {
    cell: SyncStateCell,
    state: SyncState,
}

impl SyncStateGuard {
    /// The state this guard holds
    pub fn state(&self) -> SyncState {
        self.state
    }
}

impl Drop for SyncStateGuard {
    fn drop(&mut self) {
        self.cell
            .inner
            .store(SyncState::Idle as u8, Ordering::Release);
    }
}
