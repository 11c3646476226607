//! Opaque remote continuation cursor
//!
//! A [`DeltaCursor`] stands for "all remote changes observed up to this
//! point". For the Graph adapter it is the full `@odata.deltaLink` URL, but
//! the engine never looks inside it.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Continuation token returned by the remote change tracker
///
/// Absence of a cursor (`Option::None` at the call sites) means no baseline
/// exists yet and a full clone is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeltaCursor(String);

impl DeltaCursor {
    /// Create a new DeltaCursor
    ///
    /// # Errors
    /// Returns error if the cursor is empty
    pub fn new(cursor: impl Into<String>) -> Result<Self, DomainError> {
        let cursor = cursor.into();
        if cursor.trim().is_empty() {
            return Err(DomainError::InvalidCursor(
                "Delta cursor cannot be empty".to_string(),
            ));
        }
        Ok(Self(cursor))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeltaCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeltaCursor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeltaCursor {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeltaCursor> for String {
    fn from(cursor: DeltaCursor) -> Self {
        cursor.0
    }
}
