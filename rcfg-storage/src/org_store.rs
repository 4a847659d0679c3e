//! Org identity bindings.
//!
//! Each config repository root version is bound to at most one org UUID.
//! Once bound the binding never changes for that root version.

use crate::db::Bucket;
use crate::error::StoreError;
use crate::transactional::TransactionalStore;
use std::sync::Arc;

fn org_key(root_version: u64) -> String {
    format!("root/{}", root_version)
}

#[derive(Debug, Clone)]
pub struct OrgStore {
    store: Arc<TransactionalStore>,
}

impl OrgStore {
    pub fn new(store: Arc<TransactionalStore>) -> Self {
        Self { store }
    }

    pub fn get_org_uuid(&self, root_version: u64) -> Result<Option<String>, StoreError> {
        self.store
            .get(Bucket::OrgData, &org_key(root_version))?
            .map(|raw| String::from_utf8(raw).map_err(|e| StoreError::Conversion(e.to_string())))
            .transpose()
    }

    /// Bind `org_uuid` to `root_version`.
    ///
    /// Binding the UUID already bound is a no-op; binding a different one
    /// fails with [`StoreError::OrgUuidConflict`].
    pub fn store_org_uuid(&self, root_version: u64, org_uuid: &str) -> Result<(), StoreError> {
        match self.get_org_uuid(root_version)? {
            Some(bound) if bound == org_uuid => Ok(()),
            Some(bound) => Err(StoreError::OrgUuidConflict {
                root_version,
                bound,
                received: org_uuid.to_string(),
            }),
            None => {
                self.store
                    .stage(Bucket::OrgData, &org_key(root_version), org_uuid.as_bytes().to_vec());
                tracing::info!(root_version, org_uuid, "bound org UUID");
                Ok(())
            }
        }
    }
}
