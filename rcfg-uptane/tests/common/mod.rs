#![allow(dead_code)]

use async_trait::async_trait;
use rcfg_mock::{MockCdn, PublishedMetas, SignedMeta, TestRepository, TEST_NOW_MS};
use rcfg_model::{MetaHeader, MockClock, RemoteError, Repository, Role, StorageConfig, TargetFile};
use rcfg_storage::{open_database, Bucket, Database, TransactionalStore};
use rcfg_uptane::{
    CdnClient, ClientOptions, CoreAgentClient, RepositoryMetas, Transport, UpdatePayload, VersionedMeta,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const DIRECTOR_SEED: u8 = 10;
pub const CONFIG_SEED: u8 = 30;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Transport over the simulated CDN.
pub struct MockTransport(pub MockCdn);

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.0.fetch(path).await
    }
}

fn versioned(meta: &SignedMeta) -> VersionedMeta {
    VersionedMeta::new(meta.version, meta.raw.clone())
}

pub fn to_metas(published: &PublishedMetas) -> RepositoryMetas {
    RepositoryMetas {
        roots: published.roots.iter().map(versioned).collect(),
        timestamp: published.timestamp.as_ref().map(versioned),
        snapshot: published.snapshot.as_ref().map(versioned),
        targets: published.targets.as_ref().map(versioned),
    }
}

/// Both signing repositories, a shared clock, a cache database and a
/// counting org UUID provider.
pub struct Harness {
    pub director: TestRepository,
    pub config: TestRepository,
    pub clock: MockClock,
    pub db: Arc<Database>,
    pub org_uuid: Arc<Mutex<String>>,
    pub provider_calls: Arc<AtomicU64>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(StorageConfig::InMemory)
    }

    pub fn with_storage(config: StorageConfig) -> Self {
        init_tracing();
        Self {
            director: TestRepository::new(Repository::Director, DIRECTOR_SEED),
            config: TestRepository::new(Repository::Config, CONFIG_SEED),
            clock: MockClock::new(TEST_NOW_MS),
            db: Arc::new(open_database(&config).expect("open cache database")),
            org_uuid: Arc::new(Mutex::new("org-uuid-1".to_string())),
            provider_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn options(&self) -> ClientOptions {
        ClientOptions::new(self.director.trust_anchor(), self.config.trust_anchor())
            .with_site("datadoghq.com")
            .with_clock(Arc::new(self.clock.clone()))
    }

    pub fn core_agent_client(&self) -> CoreAgentClient {
        self.core_agent_client_with(self.options())
    }

    pub fn core_agent_client_with(&self, options: ClientOptions) -> CoreAgentClient {
        let org_uuid = self.org_uuid.clone();
        let calls = self.provider_calls.clone();
        let provider = move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(org_uuid.lock().unwrap().clone())
        };
        CoreAgentClient::new(self.db.clone(), provider, options).expect("create client")
    }

    pub fn cdn_client(&self, cdn: &MockCdn) -> CdnClient {
        CdnClient::new(
            self.db.clone(),
            Arc::new(MockTransport(cdn.clone())),
            self.options(),
        )
        .expect("create client")
    }

    /// Declare the same target in both repositories.
    pub fn add_target(&mut self, path: &str, raw: &[u8]) -> &mut Self {
        self.director.add_target(path, raw);
        self.config.add_target(path, raw);
        self
    }

    pub fn remove_target(&mut self, path: &str) -> &mut Self {
        self.director.remove_target(path);
        self.config.remove_target(path);
        self
    }

    /// Publish both repositories and bundle the result with the director's
    /// target bytes.
    pub fn publish(&mut self) -> UpdatePayload {
        let director = self.director.publish();
        let config = self.config.publish();
        self.payload_from(&director, &config)
    }

    pub fn payload_from(&self, director: &PublishedMetas, config: &PublishedMetas) -> UpdatePayload {
        UpdatePayload {
            target_files: self
                .director
                .files()
                .iter()
                .map(|(path, raw)| TargetFile::new(path.clone(), raw.clone()))
                .collect(),
            director_metas: to_metas(director),
            config_metas: to_metas(config),
        }
    }

    /// Publish both repositories onto `cdn`.
    pub fn publish_to(&mut self, cdn: &MockCdn) {
        self.director.publish();
        self.config.publish();
        cdn.serve(self.director.cdn_files());
        cdn.serve(self.config.cdn_files());
    }

    /// Swap the cache database, e.g. to reopen a file-backed one. Clients
    /// built on the previous database must be dropped first.
    pub fn reopen(&mut self, config: &StorageConfig) {
        // Release the old handle first: redb refuses to open a file twice.
        self.db = Arc::new(open_database(&StorageConfig::InMemory).expect("open placeholder database"));
        self.db = Arc::new(open_database(config).expect("reopen cache database"));
    }

    /// A store of its own over the cache database. Sees committed data only.
    pub fn view(&self) -> Arc<TransactionalStore> {
        Arc::new(TransactionalStore::new(self.db.clone()))
    }

    /// Version of the committed targets metadata of `repository`, 0 if none.
    pub fn committed_targets_version(&self, repository: Repository) -> u64 {
        self.view()
            .get(Bucket::for_repository(repository), Role::Targets.meta_name())
            .expect("read cache database")
            .map_or(0, |raw| MetaHeader::parse(&raw).expect("stored targets").version)
    }

    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::SeqCst)
    }

    pub fn set_org_uuid(&self, org_uuid: &str) {
        *self.org_uuid.lock().unwrap() = org_uuid.to_string();
    }
}
