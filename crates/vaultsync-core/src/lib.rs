//! VaultSync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `IndexEntry`, `IndexSnapshot`, `DiffSet`, `DeltaCursor`, `SyncState`
//! - **Ignore rules** - `IgnoreRuleSet`, compiled from regular expressions
//! - **Port definitions** - Traits for adapters: `IRemoteDrive`, `ILocalVault`,
//!   `IStateStore`, `IAuthProvider`, `INotificationSink`
//! - **Configuration** - YAML-backed [`config::Config`]
//!
//! # Architecture
//!
//! The domain module contains pure data and invariants with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`vaultsync-graph`, `vaultsync-cache`, `vaultsync-sync`).

pub mod config;
pub mod domain;
pub mod ports;
