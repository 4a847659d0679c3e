//! Remote metadata source abstraction
//!
//! Decouples the verification engine from where candidate (unverified)
//! documents come from. A push source serves what the caller handed over;
//! a pull source fetches over a transport.

use async_trait::async_trait;

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected status {status} fetching {path}")]
    Status { status: u16, path: String },
}

/// Error returned by a [`RemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The remote has no document or target under that name.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backing source failed to produce the data (e.g. a local read error).
    #[error("remote source failed: {0}")]
    Source(String),

    #[error("fetch cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Supplies unverified metadata and target bytes for one repository.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a metadata document by name (`timestamp.json`, `3.root.json`, ...).
    async fn get_meta(&self, name: &str) -> Result<Vec<u8>, RemoteError>;

    /// Fetch raw target bytes by target path.
    async fn get_target(&self, path: &str) -> Result<Vec<u8>, RemoteError>;
}
