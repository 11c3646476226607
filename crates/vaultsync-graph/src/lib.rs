//! VaultSync Graph - Microsoft Graph adapter
//!
//! Talks to the OneDrive application folder (`/me/drive/special/approot`):
//! - Delta queries for full and incremental change listings
//! - Single-request and chunked upload-session uploads
//! - Item lookup, deletion, folder creation and downloads
//! - Keyring-backed token storage with OAuth2 refresh
//!
//! ## Modules
//!
//! - [`auth`] - Token storage and the [`IAuthProvider`](vaultsync_core::ports::IAuthProvider) adapter
//! - [`client`] - Authenticated HTTP client with 429 retry
//! - [`delta`] - Paginated delta listings and cursors
//! - [`items`] - Path-addressed item operations
//! - [`upload`] - Upload sizing and chunked sessions
//! - [`provider`] - The [`IRemoteDrive`](vaultsync_core::ports::IRemoteDrive) adapter

pub mod auth;
pub mod client;
pub mod delta;
pub mod items;
pub mod provider;
pub mod upload;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the Microsoft Graph API
#[derive(Debug, Error)]
pub enum GraphError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The item already exists or was modified concurrently
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit still exceeded after all retries
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// A delta listing ended without `@odata.deltaLink`
    #[error("Delta listing ended without a delta link")]
    MissingDeltaLink,

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GraphError {
    /// True for [`GraphError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound(_))
    }

    /// True for [`GraphError::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, GraphError::Conflict(_))
    }
}

/// Looks for a [`GraphError`] anywhere in an `anyhow` error chain
pub fn graph_error(err: &anyhow::Error) -> Option<&GraphError> {
    err.chain().find_map(|cause| cause.downcast_ref::<GraphError>())
}
