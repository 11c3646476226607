//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! malformed vault-relative paths, empty cursors and ignore patterns
//! that do not compile.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid vault-relative path (absolute, empty or containing `..`)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Delta cursor was empty
    #[error("Invalid delta cursor: {0}")]
    InvalidCursor(String),

    /// An ignore pattern is not a valid regular expression
    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern source as configured
        pattern: String,
        /// Compiler diagnostic from the regex engine
        reason: String,
    },
}
