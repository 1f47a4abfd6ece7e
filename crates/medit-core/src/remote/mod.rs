//! Remote record store: a generic table backend reached over HTTP.

mod client;
#[cfg(test)]
pub(crate) mod memory;
mod wire;

use thiserror::Error;

use crate::models::{DiagramId, DiagramRecord};

pub use client::HttpRecordClient;

/// Classified remote failures.
///
/// `Unauthorized`, `NotFound`, and `Unreachable` map to distinct user actions
/// (fix the credential, fix the table id, wait for connectivity).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote rejected the credential: {0}")]
    Unauthorized(String),
    #[error("Remote table or record not found: {0}")]
    NotFound(String),
    #[error("Remote is unreachable: {0}")]
    Unreachable(String),
    #[error("Remote rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    /// Failures that say nothing about an individual record and should stop
    /// the whole pass.
    #[must_use]
    pub const fn is_pass_level(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::NotFound(_) | Self::Unreachable(_)
        )
    }

    /// Failures worth retrying later without user action. Anything else needs
    /// the configuration fixed first.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Rejected(_) | Self::InvalidPayload(_)
        )
    }

    /// Short hint shown next to the error.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "check the remote settings",
            Self::Unauthorized(_) => "check the API token",
            Self::NotFound(_) => "check the base URL and table id",
            Self::Unreachable(_) => "will retry when the remote is reachable",
            Self::Rejected(_) | Self::InvalidPayload(_) => "will retry on the next pass",
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// CRUD over a remote table of diagram records.
///
/// Records returned by the remote are always clean (`dirty = false`,
/// `retry_count = 0`) with both timestamps populated.
pub trait RemoteStore {
    /// Create the record remotely; the returned copy carries the canonical id.
    async fn create(&self, record: &DiagramRecord) -> RemoteResult<DiagramRecord>;

    /// Overwrite an existing remote record.
    async fn update(&self, record: &DiagramRecord) -> RemoteResult<()>;

    /// Fetch one record; an absent record is `Ok(None)`.
    async fn fetch_by_id(&self, id: &DiagramId) -> RemoteResult<Option<DiagramRecord>>;

    /// Fetch every record in the table.
    async fn fetch_all(&self) -> RemoteResult<Vec<DiagramRecord>>;

    /// Delete a record; deleting an absent record succeeds.
    async fn delete_by_id(&self, id: &DiagramId) -> RemoteResult<()>;

    /// Cheap reachability and credential check, run once per sync pass.
    async fn verify_accessible(&self) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_level_errors_are_classified() {
        assert!(RemoteError::Unauthorized(String::new()).is_pass_level());
        assert!(RemoteError::NotFound(String::new()).is_pass_level());
        assert!(RemoteError::Unreachable(String::new()).is_pass_level());
        assert!(!RemoteError::Rejected(String::new()).is_pass_level());
        assert!(!RemoteError::InvalidPayload(String::new()).is_pass_level());
    }

    #[test]
    fn credential_errors_are_not_transient() {
        assert!(!RemoteError::Unauthorized(String::new()).is_transient());
        assert!(!RemoteError::NotFound(String::new()).is_transient());
        assert!(!RemoteError::InvalidConfiguration(String::new()).is_transient());
        assert!(RemoteError::Unreachable(String::new()).is_transient());
        assert!(RemoteError::InvalidPayload(String::new()).is_transient());
        assert_eq!(
            RemoteError::Unauthorized(String::new()).hint(),
            "check the API token"
        );
    }
}
