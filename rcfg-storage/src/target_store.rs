//! Raw target payloads, keyed by target path.

use crate::db::Bucket;
use crate::error::StoreError;
use crate::transactional::TransactionalStore;
use rcfg_model::TargetFile;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TargetStore {
    store: Arc<TransactionalStore>,
}

impl TargetStore {
    pub fn new(store: Arc<TransactionalStore>) -> Self {
        Self { store }
    }

    /// Stage every file. Later entries for the same path win.
    pub fn store_target_files(&self, files: &[TargetFile]) {
        for file in files {
            self.store.stage(Bucket::TargetFiles, &file.path, file.raw.clone());
        }
    }

    pub fn get_target_file(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(Bucket::TargetFiles, path)
    }

    pub fn stored_paths(&self) -> Result<BTreeSet<String>, StoreError> {
        self.store.keys(Bucket::TargetFiles)
    }

    /// Stage deletion of every stored file whose path is not in `keep`.
    /// Returns how many files were dropped.
    pub fn prune_target_files(&self, keep: &[String]) -> Result<usize, StoreError> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let mut pruned = 0;
        for path in self.stored_paths()? {
            if !keep.contains(path.as_str()) {
                self.store.stage_delete(Bucket::TargetFiles, &path);
                pruned += 1;
            }
        }
        if pruned > 0 {
            tracing::debug!(pruned, kept = keep.len(), "pruned target files");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcfg_model::StorageConfig;

    fn target_store() -> (Arc<TransactionalStore>, TargetStore) {
        let store = Arc::new(TransactionalStore::open(&StorageConfig::InMemory).unwrap());
        (store.clone(), TargetStore::new(store))
    }

    #[test]
    fn test_store_and_get() {
        let (store, targets) = target_store();
        targets.store_target_files(&[
            TargetFile::new("datadog/2/APM_SAMPLING/a/config", b"one".to_vec()),
            TargetFile::new("datadog/2/APM_SAMPLING/a/config", b"two".to_vec()),
        ]);
        store.commit().unwrap();

        assert_eq!(
            targets.get_target_file("datadog/2/APM_SAMPLING/a/config").unwrap(),
            Some(b"two".to_vec())
        );
        assert_eq!(targets.get_target_file("missing").unwrap(), None);
    }

    #[test]
    fn test_prune_keeps_listed_paths() {
        let (store, targets) = target_store();
        targets.store_target_files(&[
            TargetFile::new("a", b"1".to_vec()),
            TargetFile::new("b", b"2".to_vec()),
            TargetFile::new("c", b"3".to_vec()),
        ]);
        store.commit().unwrap();

        let pruned = targets
            .prune_target_files(&["a".to_string(), "unknown".to_string()])
            .unwrap();
        assert_eq!(pruned, 2);
        store.commit().unwrap();

        let paths: Vec<_> = targets.stored_paths().unwrap().into_iter().collect();
        assert_eq!(paths, vec!["a".to_string()]);
    }

    #[test]
    fn test_prune_with_empty_keep_drops_everything() {
        let (store, targets) = target_store();
        targets.store_target_files(&[TargetFile::new("a", b"1".to_vec())]);
        assert_eq!(targets.prune_target_files(&[]).unwrap(), 1);
        store.commit().unwrap();
        assert!(targets.stored_paths().unwrap().is_empty());
    }
}
