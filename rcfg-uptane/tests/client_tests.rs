//! Core agent (push) client: updates, atomicity, org identity and reads.

mod common;

use common::Harness;
use rcfg_mock::TEST_EXPIRES;
use rcfg_model::{crypto, HexBytes, MetaHeader, Repository, StorageConfig, TargetFileRecord};
use rcfg_storage::TargetStore;
use rcfg_tuf::TufError;
use rcfg_uptane::UptaneError;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

const FEATURE_A: &str = "datadog/2/APM_SAMPLING/feature-a/config";
const FEATURE_B: &str = "datadog/2/APM_SAMPLING/feature-b/config";

fn targets_version(raw: &[u8]) -> u64 {
    MetaHeader::parse(raw).unwrap().version
}

#[tokio::test]
async fn test_update_then_read_targets() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    let client = h.core_agent_client();

    client.update(h.publish()).await.unwrap();

    let targets = client.targets().await.unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[FEATURE_A].length, 10);
    assert_eq!(targets[FEATURE_A], TargetFileRecord::for_bytes(b"0123456789"));
    assert_eq!(client.target_file(FEATURE_A).await.unwrap(), b"0123456789".to_vec());
    assert_eq!(targets_version(&client.targets_meta().await.unwrap()), 1);
    assert_eq!(h.committed_targets_version(Repository::Director), 1);
    assert_eq!(h.committed_targets_version(Repository::Config), 1);
}

#[tokio::test]
async fn test_unstructured_path_without_org_id() {
    let mut h = Harness::new();
    h.add_target("cfg/feature-a", b"feature-a!");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    let raw = client.target_file("cfg/feature-a").await.unwrap();
    assert_eq!(raw.len(), 10);
    assert_eq!(
        client.targets().await.unwrap()["cfg/feature-a"],
        TargetFileRecord::for_bytes(&raw)
    );
}

#[tokio::test]
async fn test_verified_reads_need_a_first_update() {
    let h = Harness::new();
    let client = h.core_agent_client();

    // No config snapshot yet to check the org UUID against.
    let err = client.targets().await.unwrap_err();
    assert!(matches!(err, UptaneError::OrgIdentity(_)), "{err}");
    assert!(client.unsafe_targets_meta().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_batch_read_and_unknown_target() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"aaa").add_target(FEATURE_B, b"bbbb");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    let files = client
        .target_files(&[FEATURE_A.to_string(), FEATURE_B.to_string()])
        .await
        .unwrap();
    assert_eq!(files[FEATURE_A], b"aaa".to_vec());
    assert_eq!(files[FEATURE_B], b"bbbb".to_vec());

    let err = client.target_file("datadog/2/APM_SAMPLING/nope/config").await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn test_repeated_update_is_idempotent() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    h.config.set_snapshot_custom(json!({ "org_uuid": "org-uuid-1" }));
    let client = h.core_agent_client();

    let payload = h.publish();
    client.update(payload.clone()).await.unwrap();
    let first = client.targets_meta().await.unwrap();
    client.update(payload).await.unwrap();

    assert_eq!(client.targets_meta().await.unwrap(), first);
    assert_eq!(client.stored_org_uuid().await.unwrap(), "org-uuid-1");
    // The binding made by the first update is reused from then on.
    assert_eq!(h.provider_calls(), 1);
}

#[tokio::test]
async fn test_failed_update_leaves_no_trace() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    // Director rotates its root and references a target config never declared.
    h.director.rotate_root(70).add_target(FEATURE_B, b"new");
    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::NotFound(ref m) if m.contains("config repository")), "{err}");
    assert_eq!(h.committed_targets_version(Repository::Director), 1);
    assert_eq!(h.committed_targets_version(Repository::Config), 1);

    // Neither the new root, the new targets nor the new target bytes survived.
    assert!(client.director_root(2).await.unwrap_err().is_not_found());
    assert!(client.director_root(1).await.is_ok());
    assert_eq!(targets_version(&client.targets_meta().await.unwrap()), 1);
    let stored = TargetStore::new(h.view()).stored_paths().unwrap();
    assert_eq!(stored, BTreeSet::from([FEATURE_A.to_string()]));
    assert_eq!(client.target_file(FEATURE_A).await.unwrap(), b"0123456789".to_vec());
}

#[tokio::test]
async fn test_rotation_commits_with_consistent_update() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    h.director.rotate_root(70);
    h.config.rotate_root(90);
    client.update(h.publish()).await.unwrap();

    assert!(client.director_root(2).await.is_ok());
    assert_eq!(targets_version(&client.targets_meta().await.unwrap()), 2);
}

#[tokio::test]
async fn test_hash_mismatch_rejected() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    // Same length, different bytes.
    h.director.add_target(FEATURE_A, b"9876543210");
    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::Mismatch(ref m) if m.contains(FEATURE_A)), "{err}");

    assert_eq!(client.target_file(FEATURE_A).await.unwrap(), b"0123456789".to_vec());
    assert_eq!(targets_version(&client.targets_meta().await.unwrap()), 1);
}

#[tokio::test]
async fn test_length_mismatch_rejected() {
    let mut h = Harness::new();
    h.director.add_target(FEATURE_A, b"short");
    h.config.add_target(FEATURE_A, b"much longer");
    let client = h.core_agent_client();

    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::Mismatch(ref m) if m.contains("size")), "{err}");
}

fn with_sha512(mut record: TargetFileRecord, data: &[u8]) -> TargetFileRecord {
    let sha512 = crypto::digest("sha512", data).unwrap();
    record.hashes.insert("sha512".to_string(), HexBytes(sha512));
    record
}

#[tokio::test]
async fn test_hash_count_mismatch_rejected() {
    let mut h = Harness::new();
    let data = b"0123456789";
    h.director.add_target_record(FEATURE_A, TargetFileRecord::for_bytes(data));
    h.config
        .add_target_record(FEATURE_A, with_sha512(TargetFileRecord::for_bytes(data), data));
    let client = h.core_agent_client();

    let err = client.update(h.publish()).await.unwrap_err();
    assert!(
        matches!(err, UptaneError::Mismatch(ref m) if m.contains("1 hashes") && m.contains("2 hashes")),
        "{err}"
    );
    assert_eq!(h.committed_targets_version(Repository::Director), 0);
}

#[tokio::test]
async fn test_hash_algorithm_missing_from_config_rejected() {
    let mut h = Harness::new();
    let data = b"0123456789";
    let mut director = with_sha512(TargetFileRecord::for_bytes(data), data);
    director.hashes.remove("sha256");
    let director_hash = director.hashes["sha512"].to_string();
    h.director.add_target_record(FEATURE_A, director);
    h.config.add_target_record(FEATURE_A, TargetFileRecord::for_bytes(data));
    let client = h.core_agent_client();

    let err = client.update(h.publish()).await.unwrap_err();
    assert!(
        matches!(err, UptaneError::Mismatch(ref m) if m.contains("sha512") && m.contains(&director_hash)),
        "{err}"
    );
    assert!(client.unsafe_targets_meta().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_director_target_without_hashes_rejected() {
    let mut h = Harness::new();
    let record = TargetFileRecord {
        length: 3,
        hashes: Default::default(),
        custom: None,
    };
    h.director.add_target_record(FEATURE_A, record.clone());
    h.config.add_target_record(FEATURE_A, record);
    let client = h.core_agent_client();

    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::Mismatch(ref m) if m.contains("no hashes")), "{err}");
}

#[tokio::test]
async fn test_targets_no_longer_referenced_are_pruned() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"aaa").add_target(FEATURE_B, b"bbb");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    let store = TargetStore::new(h.view());
    assert_eq!(store.stored_paths().unwrap().len(), 2);

    h.remove_target(FEATURE_B);
    client.update(h.publish()).await.unwrap();
    assert_eq!(
        store.stored_paths().unwrap(),
        BTreeSet::from([FEATURE_A.to_string()])
    );
}

#[tokio::test]
async fn test_org_uuid_mismatch_rejected() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    h.config.set_snapshot_custom(json!({ "org_uuid": "someone-else" }));
    let client = h.core_agent_client();

    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::OrgIdentity(_)), "{err}");
    assert!(client.unsafe_targets_meta().await.unwrap_err().is_not_found());
    assert_eq!(h.committed_targets_version(Repository::Config), 0);
}

#[tokio::test]
async fn test_org_uuid_binding_is_immutable() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    h.config.set_snapshot_custom(json!({ "org_uuid": "org-uuid-1" }));
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    // The provider changes its mind, and the backend follows.
    h.set_org_uuid("org-uuid-2");
    h.config.set_snapshot_custom(json!({ "org_uuid": "org-uuid-2" }));
    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::OrgIdentity(ref m) if m.contains("org-uuid-1")), "{err}");

    assert_eq!(client.stored_org_uuid().await.unwrap(), "org-uuid-1");
    assert_eq!(h.provider_calls(), 1);
}

#[tokio::test]
async fn test_org_uuid_rebound_on_config_root_rotation() {
    let mut h = Harness::new();
    h.config.set_snapshot_custom(json!({ "org_uuid": "org-uuid-1" }));
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    h.set_org_uuid("org-uuid-2");
    h.config
        .rotate_root(90)
        .set_snapshot_custom(json!({ "org_uuid": "org-uuid-2" }));
    client.update(h.publish()).await.unwrap();

    assert_eq!(client.stored_org_uuid().await.unwrap(), "org-uuid-2");
    assert_eq!(h.provider_calls(), 2);
}

#[tokio::test]
async fn test_org_id_ownership() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"mine");
    h.add_target("employee/APM_SAMPLING/internal/config", b"internal");
    let client = h.core_agent_client_with(h.options().with_org_id(2));
    client.update(h.publish()).await.unwrap();
    assert_eq!(client.targets().await.unwrap().len(), 2);

    h.add_target("datadog/3/APM_SAMPLING/theirs/config", b"theirs");
    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::OrgIdentity(ref m) if m.contains("datadog/3")), "{err}");
    assert_eq!(client.targets().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_target_path_rejected_with_org_id() {
    let mut h = Harness::new();
    h.add_target("not/a/config/path/at/all", b"x");
    let client = h.core_agent_client_with(h.options().with_org_id(2));

    let err = client.update(h.publish()).await.unwrap_err();
    assert!(matches!(err, UptaneError::ConfigPath(_)), "{err}");
}

#[tokio::test]
async fn test_config_failure_reports_payload_summary() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    let client = h.core_agent_client();

    let mut payload = h.publish();
    payload.config_metas.timestamp = None;
    let err = client.update(payload).await.unwrap_err();

    assert_eq!(err.repository(), Some(Repository::Config));
    assert!(
        err.to_string()
            .starts_with("could not update config repository [roots=1 targets=1 snapshot=1]"),
        "{err}"
    );
}

#[tokio::test]
async fn test_director_failure_names_director() {
    let mut h = Harness::new();
    let client = h.core_agent_client();

    let mut payload = h.publish();
    payload.director_metas.snapshot = None;
    let err = client.update(payload).await.unwrap_err();

    assert_eq!(err.repository(), Some(Repository::Director));
    assert!(err.to_string().starts_with("failed updating director repository"), "{err}");
}

#[tokio::test]
async fn test_metadata_reads() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    h.director.set_targets_custom(json!({ "opaque_backend_state": "c3RhdGU=" }));
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    let custom = client.targets_custom().await.unwrap().unwrap();
    let custom: serde_json::Value = serde_json::from_slice(&custom).unwrap();
    assert_eq!(custom["opaque_backend_state"], "c3RhdGU=");
    assert_eq!(client.timestamp_expires().await.unwrap(), TEST_EXPIRES);

    let root = client.director_root(1).await.unwrap();
    assert_eq!(root, h.director.trust_anchor());
    assert_eq!(targets_version(&client.unsafe_targets_meta().await.unwrap()), 1);
}

#[tokio::test]
async fn test_expired_metadata_fails_reads() {
    let mut h = Harness::new();
    h.add_target(FEATURE_A, b"0123456789");
    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();

    h.clock.advance(Duration::from_secs(20 * 365 * 24 * 3600));
    let err = client.targets().await.unwrap_err();
    assert!(matches!(err, UptaneError::Verification(TufError::Expired { .. })), "{err}");

    // Unverified diagnostics still answer.
    assert!(client.unsafe_targets_meta().await.is_ok());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::File(dir.path().join("remote-config.db"));
    let mut h = Harness::with_storage(config.clone());
    h.add_target(FEATURE_A, b"0123456789");
    h.config.set_snapshot_custom(json!({ "org_uuid": "org-uuid-1" }));

    let client = h.core_agent_client();
    client.update(h.publish()).await.unwrap();
    drop(client);

    h.reopen(&config);
    let client = h.core_agent_client();
    assert_eq!(client.target_file(FEATURE_A).await.unwrap(), b"0123456789".to_vec());
    assert_eq!(targets_version(&client.targets_meta().await.unwrap()), 1);
    assert_eq!(client.stored_org_uuid().await.unwrap(), "org-uuid-1");
    assert_eq!(h.provider_calls(), 1);
}
