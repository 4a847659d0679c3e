use thiserror::Error;

/// Errors raised by the metadata cache database and the stores built on it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("a transaction is already open on this store")]
    TransactionInProgress,

    #[error("writes were staged outside a transaction")]
    UnscopedWrites,

    #[error("org UUID already bound for root version {root_version}: bound={bound} received={received}")]
    OrgUuidConflict {
        root_version: u64,
        bound: String,
        received: String,
    },
}

impl From<StoreError> for rcfg_model::StorageError {
    fn from(e: StoreError) -> Self {
        rcfg_model::StorageError(e.to_string())
    }
}
