use ed25519_dalek::SigningKey;
use rcfg_model::metadata::{Snapshot, Targets, Timestamp, SPEC_VERSION};
use rcfg_model::{Repository, Role, TargetFileRecord, TargetFiles};
use rcfg_tuf::signing::{meta_file, sign_metadata, RootBuilder};
use serde_json::Value;
use std::collections::BTreeMap;
use time::macros::datetime;
use time::OffsetDateTime;

/// Clock start for tests: 2023-11-14T22:13:20Z.
pub const TEST_NOW_MS: u64 = 1_700_000_000_000;

/// Default expiry of published documents.
pub const TEST_EXPIRES: OffsetDateTime = datetime!(2040-01-01 0:00 UTC);

/// One signing key per role, derived from a seed.
pub struct RepositoryKeys {
    pub root: SigningKey,
    pub timestamp: SigningKey,
    pub snapshot: SigningKey,
    pub targets: SigningKey,
}

impl RepositoryKeys {
    pub fn from_seed(seed: u8) -> Self {
        let key = |offset: u8| SigningKey::from_bytes(&[seed.wrapping_add(offset); 32]);
        Self {
            root: key(0),
            timestamp: key(1),
            snapshot: key(2),
            targets: key(3),
        }
    }
}

/// A signed document and its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMeta {
    pub version: u64,
    pub raw: Vec<u8>,
}

/// Everything one publication offers.
#[derive(Debug, Clone, Default)]
pub struct PublishedMetas {
    pub roots: Vec<SignedMeta>,
    pub timestamp: Option<SignedMeta>,
    pub snapshot: Option<SignedMeta>,
    pub targets: Option<SignedMeta>,
}

/// A signing repository under test control.
pub struct TestRepository {
    repository: Repository,
    keys: RepositoryKeys,
    roots: Vec<SignedMeta>,
    version: u64,
    expires: OffsetDateTime,
    targets: TargetFiles,
    files: BTreeMap<String, Vec<u8>>,
    targets_custom: Option<Value>,
    snapshot_custom: Option<Value>,
    published: PublishedMetas,
}

impl TestRepository {
    /// A repository with root version 1 and nothing published yet.
    pub fn new(repository: Repository, seed: u8) -> Self {
        let keys = RepositoryKeys::from_seed(seed);
        let root = sign_root(&keys, 1, &[&keys.root]);
        Self {
            repository,
            keys,
            roots: vec![SignedMeta { version: 1, raw: root }],
            version: 0,
            expires: TEST_EXPIRES,
            targets: TargetFiles::new(),
            files: BTreeMap::new(),
            targets_custom: None,
            snapshot_custom: None,
            published: PublishedMetas::default(),
        }
    }

    pub fn repository(&self) -> Repository {
        self.repository
    }

    /// The version 1 root, to seed a client with.
    pub fn trust_anchor(&self) -> Vec<u8> {
        self.roots[0].raw.clone()
    }

    pub fn root_version(&self) -> u64 {
        self.roots.last().map_or(1, |root| root.version)
    }

    /// Declare a target with a record matching `raw`.
    pub fn add_target(&mut self, path: &str, raw: &[u8]) -> &mut Self {
        self.targets.insert(path.to_string(), TargetFileRecord::for_bytes(raw));
        self.files.insert(path.to_string(), raw.to_vec());
        self
    }

    /// Declare a target with an arbitrary record. No bytes are attached.
    pub fn add_target_record(&mut self, path: &str, record: TargetFileRecord) -> &mut Self {
        self.targets.insert(path.to_string(), record);
        self
    }

    pub fn remove_target(&mut self, path: &str) -> &mut Self {
        self.targets.remove(path);
        self.files.remove(path);
        self
    }

    /// Raw bytes of every target declared with [`add_target`](Self::add_target).
    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn set_snapshot_custom(&mut self, custom: Value) -> &mut Self {
        self.snapshot_custom = Some(custom);
        self
    }

    pub fn set_targets_custom(&mut self, custom: Value) -> &mut Self {
        self.targets_custom = Some(custom);
        self
    }

    pub fn set_expires(&mut self, expires: OffsetDateTime) -> &mut Self {
        self.expires = expires;
        self
    }

    /// Sign the next root version with fresh keys, cross-signed by the
    /// current root key.
    pub fn rotate_root(&mut self, seed: u8) -> &mut Self {
        let next = self.root_version() + 1;
        let keys = RepositoryKeys::from_seed(seed);
        let raw = sign_root(&keys, next, &[&self.keys.root, &keys.root]);
        self.roots.push(SignedMeta { version: next, raw });
        self.keys = keys;
        self
    }

    /// Sign targets, snapshot and timestamp at the next version. Every
    /// root is offered along with them.
    pub fn publish(&mut self) -> PublishedMetas {
        self.version += 1;
        let version = self.version;

        let targets = sign_metadata(
            &Targets {
                type_: Role::Targets.as_str().to_string(),
                spec_version: SPEC_VERSION.to_string(),
                version,
                expires: self.expires,
                targets: self.targets.clone(),
                custom: self.targets_custom.clone(),
            },
            &[&self.keys.targets],
        )
        .expect("sign targets");
        let snapshot = sign_metadata(
            &Snapshot {
                type_: Role::Snapshot.as_str().to_string(),
                spec_version: SPEC_VERSION.to_string(),
                version,
                expires: self.expires,
                meta: [(Role::Targets.meta_name().to_string(), meta_file(&targets, version))].into(),
                custom: self.snapshot_custom.clone(),
            },
            &[&self.keys.snapshot],
        )
        .expect("sign snapshot");
        let timestamp = sign_metadata(
            &Timestamp {
                type_: Role::Timestamp.as_str().to_string(),
                spec_version: SPEC_VERSION.to_string(),
                version,
                expires: self.expires,
                meta: [(Role::Snapshot.meta_name().to_string(), meta_file(&snapshot, version))].into(),
                custom: None,
            },
            &[&self.keys.timestamp],
        )
        .expect("sign timestamp");

        self.published = PublishedMetas {
            roots: self.roots.clone(),
            timestamp: Some(SignedMeta { version, raw: timestamp }),
            snapshot: Some(SignedMeta { version, raw: snapshot }),
            targets: Some(SignedMeta { version, raw: targets }),
        };
        self.published.clone()
    }

    /// The last publication.
    pub fn published(&self) -> &PublishedMetas {
        &self.published
    }

    /// The last publication laid out as a CDN serves it:
    /// `{repository}/{document}` and `{repository}/targets/{path}`.
    pub fn cdn_files(&self) -> BTreeMap<String, Vec<u8>> {
        let prefix = self.repository.as_str();
        let mut out = BTreeMap::new();
        for root in &self.published.roots {
            out.insert(format!("{}/{}.root.json", prefix, root.version), root.raw.clone());
        }
        let current = [
            (Role::Timestamp, &self.published.timestamp),
            (Role::Snapshot, &self.published.snapshot),
            (Role::Targets, &self.published.targets),
        ];
        for (role, meta) in current {
            if let Some(meta) = meta {
                out.insert(format!("{}/{}", prefix, role.meta_name()), meta.raw.clone());
            }
        }
        for (path, raw) in &self.files {
            out.insert(format!("{}/targets/{}", prefix, path), raw.clone());
        }
        out
    }
}

fn sign_root(keys: &RepositoryKeys, version: u64, signers: &[&SigningKey]) -> Vec<u8> {
    let root = RootBuilder::new(version, TEST_EXPIRES)
        .role(Role::Root, &[&keys.root], 1)
        .role(Role::Timestamp, &[&keys.timestamp], 1)
        .role(Role::Snapshot, &[&keys.snapshot], 1)
        .role(Role::Targets, &[&keys.targets], 1)
        .build();
    sign_metadata(&root, signers).expect("sign root")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcfg_model::MetaHeader;

    #[test]
    fn test_publish_bumps_versions() {
        let mut repo = TestRepository::new(Repository::Director, 10);
        repo.add_target("employee/ASM/a/config", b"abc");
        let first = repo.publish();
        let second = repo.publish();

        assert_eq!(first.timestamp.unwrap().version, 1);
        let targets = second.targets.unwrap();
        assert_eq!(targets.version, 2);
        assert_eq!(MetaHeader::parse(&targets.raw).unwrap().version, 2);
        assert_eq!(second.roots.len(), 1);
    }

    #[test]
    fn test_rotation_appends_root() {
        let mut repo = TestRepository::new(Repository::Config, 10);
        repo.rotate_root(60);
        assert_eq!(repo.root_version(), 2);
        let published = repo.publish();
        assert_eq!(published.roots.len(), 2);
        assert_eq!(MetaHeader::parse(&published.roots[1].raw).unwrap().version, 2);
    }

    #[test]
    fn test_cdn_layout() {
        let mut repo = TestRepository::new(Repository::Director, 10);
        repo.add_target("employee/ASM/a/config", b"abc");
        repo.publish();
        let files = repo.cdn_files();
        assert!(files.contains_key("director/1.root.json"));
        assert!(files.contains_key("director/timestamp.json"));
        assert!(files.contains_key("director/targets/employee/ASM/a/config"));
    }
}
