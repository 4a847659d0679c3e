//! Write buffering over the cache database.
//!
//! Every write is staged in memory. Readers going through this store see
//! staged writes layered over committed data; readers of the underlying
//! database never see them until [`TransactionalStore::commit`] persists the
//! whole buffer in a single redb write transaction.
//!
//! The buffer belongs to one owner. Several owners share a database by
//! wrapping the same `Arc<Database>` in their own `TransactionalStore`.

use crate::db::{open_database, Bucket};
use crate::error::StoreError;
use rcfg_model::StorageConfig;
use redb::{Database, ReadableTable};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Staged value: `Some` is a put, `None` is a delete.
type Pending = BTreeMap<Bucket, BTreeMap<String, Option<Vec<u8>>>>;

pub struct TransactionalStore {
    db: Arc<Database>,
    pending: Mutex<Pending>,
    /// Set while a [`Transaction`] scope is open.
    scoped: AtomicBool,
}

impl std::fmt::Debug for TransactionalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalStore").finish_non_exhaustive()
    }
}

impl TransactionalStore {
    /// A private staging buffer over `db`.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            pending: Mutex::new(Pending::new()),
            scoped: AtomicBool::new(false),
        }
    }

    /// Open the database described by `config` and wrap it.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(open_database(config)?)))
    }

    /// Access the underlying database. Reads here only see committed data.
    pub fn db(&self) -> &Database {
        &self.db
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin a scoped transaction.
    ///
    /// Refused while another scope is open or while writes staged outside
    /// any scope are waiting; those belong to someone else and are never
    /// discarded here.
    pub fn transaction(&self) -> Result<Transaction<'_>, StoreError> {
        if self.scoped.swap(true, Ordering::SeqCst) {
            return Err(StoreError::TransactionInProgress);
        }
        if self.has_pending() {
            self.scoped.store(false, Ordering::SeqCst);
            return Err(StoreError::UnscopedWrites);
        }
        Ok(Transaction {
            store: self,
            finished: false,
        })
    }

    /// Whether any write is staged.
    pub fn has_pending(&self) -> bool {
        self.pending().values().any(|writes| !writes.is_empty())
    }

    /// Stage a put.
    pub fn stage(&self, bucket: Bucket, key: &str, value: Vec<u8>) {
        self.pending()
            .entry(bucket)
            .or_default()
            .insert(key.to_string(), Some(value));
    }

    /// Stage a delete.
    pub fn stage_delete(&self, bucket: Bucket, key: &str) {
        self.pending()
            .entry(bucket)
            .or_default()
            .insert(key.to_string(), None);
    }

    /// Read a value, staged writes first.
    pub fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.pending().get(&bucket).and_then(|writes| writes.get(key)) {
            return Ok(staged.clone());
        }
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(bucket.table())?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    /// Every entry of a bucket, staged writes applied.
    pub fn get_all(&self, bucket: Bucket) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let mut entries = BTreeMap::new();
        {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(bucket.table())?;
            for result in table.iter()? {
                let (key, value) = result?;
                entries.insert(key.value().to_string(), value.value().to_vec());
            }
        }
        if let Some(writes) = self.pending().get(&bucket) {
            for (key, staged) in writes {
                match staged {
                    Some(value) => entries.insert(key.clone(), value.clone()),
                    None => entries.remove(key),
                };
            }
        }
        Ok(entries)
    }

    /// Every key of a bucket, staged writes applied. Values are not copied.
    pub fn keys(&self, bucket: Bucket) -> Result<BTreeSet<String>, StoreError> {
        let mut keys = BTreeSet::new();
        {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(bucket.table())?;
            for result in table.iter()? {
                let (key, _) = result?;
                keys.insert(key.value().to_string());
            }
        }
        if let Some(writes) = self.pending().get(&bucket) {
            for (key, staged) in writes {
                if staged.is_some() {
                    keys.insert(key.clone());
                } else {
                    keys.remove(key);
                }
            }
        }
        Ok(keys)
    }

    /// Persist every staged write in one redb write transaction.
    ///
    /// No-op when nothing is staged. The buffer is cleared whether or not the
    /// write succeeds; a failed commit leaves the database untouched.
    pub fn commit(&self) -> Result<(), StoreError> {
        let pending = std::mem::take(&mut *self.pending());
        if pending.values().all(|writes| writes.is_empty()) {
            return Ok(());
        }

        let write_txn = self.db.begin_write()?;
        let mut puts = 0usize;
        let mut deletes = 0usize;
        for (bucket, writes) in &pending {
            let mut table = write_txn.open_table(bucket.table())?;
            for (key, staged) in writes {
                match staged {
                    Some(value) => {
                        table.insert(key.as_str(), value.as_slice())?;
                        puts += 1;
                    }
                    None => {
                        table.remove(key.as_str())?;
                        deletes += 1;
                    }
                }
            }
        }
        write_txn.commit()?;

        tracing::debug!(puts, deletes, "committed staged writes");
        Ok(())
    }

    /// Discard every staged write. No-op when nothing is staged.
    pub fn rollback(&self) {
        let mut pending = self.pending();
        if !pending.is_empty() {
            tracing::debug!(buckets = pending.len(), "rolled back staged writes");
            pending.clear();
        }
    }
}

/// Scoped transaction: rolls back on drop unless committed.
///
/// Dropping the guard on an error path, an early return, or a cancelled
/// future discards everything staged since the scope began.
#[must_use = "dropping a transaction rolls it back"]
pub struct Transaction<'a> {
    store: &'a TransactionalStore,
    finished: bool,
}

impl Transaction<'_> {
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.commit()
    }

    pub fn rollback(mut self) {
        self.finished = true;
        self.store.rollback();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.rollback();
        }
        self.store.scoped.store(false, Ordering::SeqCst);
    }
}
