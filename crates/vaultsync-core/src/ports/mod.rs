//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the narrow contracts the sync engine consumes. Their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IAuthProvider`] - Bearer credential acquisition and auth status
//! - [`IRemoteDrive`] - Remote change tracking and per-item transfers
//! - [`ILocalVault`] - Local filesystem operations by vault-relative path
//! - [`IStateStore`] - Persisted cursor, remote snapshot and ignore patterns
//! - [`INotificationSink`] - Human-readable progress messages

pub mod auth;
pub mod local_vault;
pub mod notification;
pub mod remote_drive;
pub mod state_store;

pub use auth::{AuthStatus, IAuthProvider, Tokens};
pub use local_vault::{FileTimes, ILocalVault, VaultListing, VaultStat};
pub use notification::{INotificationSink, NullNotificationSink};
pub use remote_drive::{ChunkProgress, IRemoteDrive, RemoteItem, RemoteListing};
pub use state_store::{IStateStore, PersistedState, StateMutator};
