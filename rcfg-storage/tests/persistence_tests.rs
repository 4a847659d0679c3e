use rcfg_model::{LocalMetaStore, Repository, Role, TargetFile};
use rcfg_storage::{LocalStore, OrgStore, StorageConfig, StoreError, TargetStore, TransactionalStore};
use std::sync::Arc;
use tempfile::tempdir;

fn root_doc(version: u64) -> Vec<u8> {
    format!(
        r#"{{"signed":{{"_type":"root","version":{},"expires":"2040-01-01T00:00:00Z"}},"signatures":[]}}"#,
        version
    )
    .into_bytes()
}

#[test]
fn test_committed_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("remote-config.db");

    {
        let store = Arc::new(TransactionalStore::open(&StorageConfig::File(path.clone())).unwrap());
        let director = LocalStore::open(store.clone(), Repository::Director, &root_doc(2)).unwrap();
        let targets = TargetStore::new(store.clone());
        let orgs = OrgStore::new(store.clone());

        let txn = store.transaction().unwrap();
        director.set_meta("targets.json", br#"{"signed":{"_type":"targets","version":5,"expires":"2040-01-01T00:00:00Z"}}"#).unwrap();
        targets.store_target_files(&[TargetFile::new("datadog/2/ASM/a/config", b"payload".to_vec())]);
        orgs.store_org_uuid(2, "org-uuid").unwrap();
        txn.commit().unwrap();
    }

    let store = Arc::new(TransactionalStore::open(&StorageConfig::File(path)).unwrap());
    // An older anchor does not replace the persisted root.
    let director = LocalStore::open(store.clone(), Repository::Director, &root_doc(1)).unwrap();
    assert_eq!(director.get_meta_version(Role::Root).unwrap(), 2);
    assert_eq!(director.get_meta_version(Role::Targets).unwrap(), 5);
    assert_eq!(
        TargetStore::new(store.clone()).get_target_file("datadog/2/ASM/a/config").unwrap(),
        Some(b"payload".to_vec())
    );
    assert_eq!(OrgStore::new(store).get_org_uuid(2).unwrap().as_deref(), Some("org-uuid"));
}

#[test]
fn test_uncommitted_writes_are_lost_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("remote-config.db");

    {
        let store = Arc::new(TransactionalStore::open(&StorageConfig::File(path.clone())).unwrap());
        let config = LocalStore::open(store.clone(), Repository::Config, &root_doc(1)).unwrap();
        let _txn = store.transaction().unwrap();
        config.set_meta("timestamp.json", &root_doc(9)).unwrap();
        TargetStore::new(store.clone()).store_target_files(&[TargetFile::new("x", b"y".to_vec())]);
        // Dropped without commit.
    }

    let store = Arc::new(TransactionalStore::open(&StorageConfig::File(path)).unwrap());
    let config = LocalStore::open(store.clone(), Repository::Config, &root_doc(1)).unwrap();
    assert!(matches!(config.get_meta_version(Role::Timestamp), Err(StoreError::NotFound(_))));
    assert!(TargetStore::new(store).stored_paths().unwrap().is_empty());
}

#[test]
fn test_conflicting_org_binding_leaves_store_unchanged() {
    let store = Arc::new(TransactionalStore::open(&StorageConfig::InMemory).unwrap());
    let orgs = OrgStore::new(store.clone());
    orgs.store_org_uuid(3, "first").unwrap();
    store.commit().unwrap();

    let txn = store.transaction().unwrap();
    let err = orgs.store_org_uuid(3, "second").unwrap_err();
    assert!(matches!(err, StoreError::OrgUuidConflict { .. }));
    drop(txn);

    assert_eq!(orgs.get_org_uuid(3).unwrap().as_deref(), Some("first"));
}
