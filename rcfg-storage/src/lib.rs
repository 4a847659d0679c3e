//! Transactional redb storage for trusted metadata, target payloads and org
//! identity bindings.
//!
//! Stores built on the same [`TransactionalStore`] stage their writes
//! together and persist them with a single commit. Independent owners of
//! one database each wrap the shared [`Database`] in their own
//! `TransactionalStore`.

pub mod db;
pub mod error;
pub mod local_store;
pub mod org_store;
pub mod target_store;
pub mod transactional;

pub use db::{open_database, Bucket};
pub use error::StoreError;
pub use local_store::LocalStore;
pub use org_store::OrgStore;
pub use target_store::TargetStore;
pub use transactional::{Transaction, TransactionalStore};
pub use redb::Database;
// Re-export for convenience; canonical home is rcfg_model::StorageConfig
pub use rcfg_model::StorageConfig;
