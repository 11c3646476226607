//! Domain entities and invariants
//!
//! - Index entries and snapshots (one side's path → metadata mapping)
//! - The pending-work [`DiffSet`]
//! - The opaque remote [`DeltaCursor`]
//! - The orchestrator [`SyncState`] and its atomic cell
//! - The [`IgnoreRuleSet`] path filter
//! - Domain-specific error types

pub mod cursor;
pub mod diff;
pub mod errors;
pub mod ignore;
pub mod index;
pub mod state;

pub use cursor::DeltaCursor;
pub use diff::DiffSet;
pub use errors::DomainError;
pub use ignore::IgnoreRuleSet;
pub use index::{EntryKind, IndexEntry, IndexSnapshot};
pub use state::{SyncState, SyncStateCell, SyncStateGuard};
