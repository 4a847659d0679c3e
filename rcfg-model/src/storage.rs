//! Storage Abstraction
//!
//! The verification engine reads and writes trusted metadata through
//! `LocalMetaStore`; the concrete redb-backed implementation lives in
//! `rcfg-storage` and routes every write through the transactional buffer.

use std::collections::BTreeMap;

/// Error type for storage operations.
#[derive(Debug, Clone)]
pub struct StorageError(pub String);

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StorageError {}

impl From<String> for StorageError {
    fn from(s: String) -> Self {
        StorageError(s)
    }
}

impl From<&str> for StorageError {
    fn from(s: &str) -> Self {
        StorageError(s.to_string())
    }
}

/// Trusted, persisted metadata of one repository.
///
/// Names are document names: `root.json`, `timestamp.json`, `snapshot.json`,
/// `targets.json` and historical `{version}.root.json`.
pub trait LocalMetaStore: Send + Sync {
    /// Every stored document, by name.
    fn get_meta(&self) -> Result<BTreeMap<String, Vec<u8>>, StorageError>;

    fn set_meta(&self, name: &str, meta: &[u8]) -> Result<(), StorageError>;

    fn delete_meta(&self, name: &str) -> Result<(), StorageError>;
}
