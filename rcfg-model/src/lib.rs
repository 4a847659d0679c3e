//! rcfg Model
//!
//! Pure data types and traits for remote configuration distribution,
//! decoupled from storage engines, verification logic and transports.

pub mod canonical;
pub mod clock;
pub mod config_path;
pub mod crypto;
pub mod metadata;
pub mod remote;
pub mod role;
pub mod storage;
pub mod storage_config;
pub mod target;
pub mod types;

// Re-exports
pub use clock::{Clock, MockClock, SystemClock};
pub use config_path::{ConfigPath, ConfigPathError, Source};
pub use metadata::{MetaHeader, RawEnvelope};
pub use remote::{RemoteError, RemoteStore, TransportError};
pub use role::{versioned_root_name, Repository, Role};
pub use storage::{LocalMetaStore, StorageError};
pub use storage_config::StorageConfig;
pub use target::{Hashes, TargetFile, TargetFileRecord, TargetFiles};
pub use types::{HexBytes, PubKey, Signature};
