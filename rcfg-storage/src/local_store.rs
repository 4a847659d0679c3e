//! Trusted metadata of one repository.
//!
//! Typed accessors over the repository's bucket. Writes are staged in the
//! shared [`TransactionalStore`] and become durable only with its commit.

use crate::db::Bucket;
use crate::error::StoreError;
use crate::transactional::TransactionalStore;
use rcfg_model::{versioned_root_name, LocalMetaStore, MetaHeader, Repository, Role, StorageError};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

pub struct LocalStore {
    repository: Repository,
    bucket: Bucket,
    store: Arc<TransactionalStore>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Open the repository's store, seeding it from `trust_anchor` (a signed
    /// root document) when no root is stored yet or the stored root is older.
    pub fn open(
        store: Arc<TransactionalStore>,
        repository: Repository,
        trust_anchor: &[u8],
    ) -> Result<Self, StoreError> {
        let local = Self {
            repository,
            bucket: Bucket::for_repository(repository),
            store,
        };

        let anchor = MetaHeader::parse(trust_anchor)
            .map_err(|e| StoreError::InvalidMetadata(format!("{} trust anchor: {}", repository, e)))?;
        if anchor.type_ != Role::Root.as_str() {
            return Err(StoreError::InvalidMetadata(format!(
                "{} trust anchor has type '{}', expected root",
                repository, anchor.type_
            )));
        }

        let stored_version = match local.get_role_meta(Role::Root)? {
            Some(raw) => Some(parse_header(&raw)?.version),
            None => None,
        };

        if stored_version.map_or(true, |v| v < anchor.version) {
            let txn = local.store.transaction()?;
            local.store.stage(local.bucket, Role::Root.meta_name(), trust_anchor.to_vec());
            local
                .store
                .stage(local.bucket, &versioned_root_name(anchor.version), trust_anchor.to_vec());
            txn.commit()?;
            tracing::info!(
                repository = %repository,
                version = anchor.version,
                previous = ?stored_version,
                "seeded root from trust anchor"
            );
        }

        Ok(local)
    }

    pub fn repository(&self) -> Repository {
        self.repository
    }

    /// Raw current document for `role`, if any.
    pub fn get_role_meta(&self, role: Role) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(self.bucket, role.meta_name())
    }

    fn header(&self, role: Role) -> Result<MetaHeader, StoreError> {
        let raw = self.get_role_meta(role)?.ok_or_else(|| {
            StoreError::NotFound(format!("{} {} metadata", self.repository, role))
        })?;
        parse_header(&raw)
    }

    /// Raw JSON of the role's `custom` field; `None` when the document has none.
    pub fn get_meta_custom(&self, role: Role) -> Result<Option<Vec<u8>>, StoreError> {
        match self.header(role)?.custom {
            Some(custom) => serde_json::to_vec(&custom)
                .map(Some)
                .map_err(|e| StoreError::Conversion(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn get_meta_version(&self, role: Role) -> Result<u64, StoreError> {
        Ok(self.header(role)?.version)
    }

    pub fn get_meta_expires(&self, role: Role) -> Result<OffsetDateTime, StoreError> {
        Ok(self.header(role)?.expires)
    }

    /// A historical root document, if that version was retained.
    pub fn get_root(&self, version: u64) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(self.bucket, &versioned_root_name(version))
    }
}

fn parse_header(raw: &[u8]) -> Result<MetaHeader, StoreError> {
    MetaHeader::parse(raw).map_err(|e| StoreError::InvalidMetadata(e.to_string()))
}

impl LocalMetaStore for LocalStore {
    fn get_meta(&self) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
        Ok(self.store.get_all(self.bucket)?)
    }

    fn set_meta(&self, name: &str, meta: &[u8]) -> Result<(), StorageError> {
        self.store.stage(self.bucket, name, meta.to_vec());
        Ok(())
    }

    fn delete_meta(&self, name: &str) -> Result<(), StorageError> {
        self.store.stage_delete(self.bucket, name);
        Ok(())
    }
}
