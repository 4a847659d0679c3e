//! Metadata cache database
//!
//! One redb database, one table per logical namespace:
//! - director_metas: document name → signed director metadata
//! - config_metas: document name → signed config metadata
//! - target_files: target path → raw payload bytes
//! - org_data: `root/{version}` → org UUID

use crate::error::StoreError;
use rcfg_model::{Repository, StorageConfig};
use redb::{Database, TableDefinition};

const DIRECTOR_METAS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("director_metas");
const CONFIG_METAS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("config_metas");
const TARGET_FILES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("target_files");
const ORG_DATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("org_data");

/// A logical namespace of the cache database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    DirectorMetas,
    ConfigMetas,
    TargetFiles,
    OrgData,
}

impl Bucket {
    pub const fn all() -> &'static [Bucket] {
        &[
            Self::DirectorMetas,
            Self::ConfigMetas,
            Self::TargetFiles,
            Self::OrgData,
        ]
    }

    pub const fn for_repository(repository: Repository) -> Bucket {
        match repository {
            Repository::Director => Self::DirectorMetas,
            Repository::Config => Self::ConfigMetas,
        }
    }

    pub(crate) const fn table(&self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Self::DirectorMetas => DIRECTOR_METAS_TABLE,
            Self::ConfigMetas => CONFIG_METAS_TABLE,
            Self::TargetFiles => TARGET_FILES_TABLE,
            Self::OrgData => ORG_DATA_TABLE,
        }
    }
}

/// Open or create the cache database and make sure every table exists.
pub fn open_database(config: &StorageConfig) -> Result<Database, StoreError> {
    let db = match config {
        StorageConfig::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Database::create(path)?
        }
        StorageConfig::InMemory => {
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?
        }
    };

    let write_txn = db.begin_write()?;
    for bucket in Bucket::all() {
        let _ = write_txn.open_table(bucket.table())?;
    }
    write_txn.commit()?;

    Ok(db)
}
