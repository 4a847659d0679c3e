use rcfg_model::{RemoteError, Role, StorageError};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while verifying a repository's metadata chain or its targets.
#[derive(Error, Debug)]
pub enum TufError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("target {0} is not listed in the trusted targets metadata")]
    UnknownTarget(String),

    #[error("no trusted {0} metadata")]
    MissingMeta(Role),

    #[error("{role} metadata has {valid} valid signatures, threshold is {threshold}")]
    Threshold { role: Role, valid: usize, threshold: u32 },

    #[error("{role} version {received} is lower than trusted version {trusted}")]
    LowVersion { role: Role, trusted: u64, received: u64 },

    #[error("{role} version {received} does not match expected version {expected}")]
    WrongVersion { role: Role, expected: u64, received: u64 },

    #[error("{role} metadata expired at {expires}")]
    Expired { role: Role, expires: OffsetDateTime },

    #[error("{name}: length {actual} does not match expected length {expected}")]
    LengthMismatch { name: String, expected: u64, actual: u64 },

    #[error("{name}: {algorithm} hash {actual} does not match expected {expected}")]
    HashMismatch {
        name: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("{0}: no supported hash algorithm")]
    NoSupportedHash(String),

    #[error("expected {expected} metadata, got '{received}'")]
    WrongType { expected: Role, received: String },

    #[error("invalid key {keyid}: {reason}")]
    InvalidKey { keyid: String, reason: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("remote error: {0}")]
    Remote(RemoteError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TufError {
    /// Whether the error means a document or target is absent rather than invalid.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnknownTarget(_))
    }
}

impl From<RemoteError> for TufError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::NotFound(name) => Self::NotFound(name),
            other => Self::Remote(other),
        }
    }
}

impl From<serde_json::Error> for TufError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
