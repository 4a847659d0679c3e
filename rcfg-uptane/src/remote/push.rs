//! Push variant: metadata comes with the update payload, target bytes from
//! the target store the payload was staged into.

use super::RemoteSource;
use crate::payload::RepositoryMetas;
use async_trait::async_trait;
use rcfg_model::{RemoteError, RemoteStore, Repository, Role};
use rcfg_storage::TargetStore;
use std::sync::{Arc, RwLock};

pub struct PushRemoteStore {
    repository: Repository,
    metas: RwLock<RepositoryMetas>,
    targets: TargetStore,
}

impl PushRemoteStore {
    pub fn new(repository: Repository, targets: TargetStore) -> Self {
        Self {
            repository,
            metas: RwLock::new(RepositoryMetas::default()),
            targets,
        }
    }

    /// Replace the documents served with those of a new update.
    pub fn load(&self, metas: RepositoryMetas) {
        *self.metas.write().unwrap_or_else(|p| p.into_inner()) = metas;
    }

    pub fn clear(&self) {
        self.load(RepositoryMetas::default());
    }

    fn lookup(&self, name: &str) -> Option<Vec<u8>> {
        let metas = self.metas.read().unwrap_or_else(|p| p.into_inner());
        let doc = if name == Role::Timestamp.meta_name() {
            metas.timestamp.as_ref()
        } else if name == Role::Snapshot.meta_name() {
            metas.snapshot.as_ref()
        } else if name == Role::Targets.meta_name() {
            metas.targets.as_ref()
        } else {
            let version = root_version(name)?;
            metas.roots.iter().find(|root| root.version == version)
        };
        doc.map(|d| d.raw.clone())
    }
}

/// Version of a `{version}.root.json` name.
fn root_version(name: &str) -> Option<u64> {
    name.strip_suffix(".root.json")?.parse().ok()
}

#[async_trait]
impl RemoteStore for PushRemoteStore {
    async fn get_meta(&self, name: &str) -> Result<Vec<u8>, RemoteError> {
        self.lookup(name)
            .ok_or_else(|| RemoteError::NotFound(format!("{}/{}", self.repository, name)))
    }

    async fn get_target(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.targets
            .get_target_file(path)
            .map_err(|e| RemoteError::Source(e.to_string()))?
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

/// Both repositories' push stores.
pub struct PushSource {
    director: Arc<PushRemoteStore>,
    config: Arc<PushRemoteStore>,
    config_summary: RwLock<Option<String>>,
}

impl PushSource {
    pub fn new(targets: TargetStore) -> Self {
        Self {
            director: Arc::new(PushRemoteStore::new(Repository::Director, targets.clone())),
            config: Arc::new(PushRemoteStore::new(Repository::Config, targets)),
            config_summary: RwLock::new(None),
        }
    }

    pub fn load(&self, director: RepositoryMetas, config: RepositoryMetas) {
        *self.config_summary.write().unwrap_or_else(|p| p.into_inner()) = Some(config.summary());
        self.director.load(director);
        self.config.load(config);
    }
}

impl RemoteSource for PushSource {
    fn remote(&self, repository: Repository) -> Arc<dyn RemoteStore> {
        match repository {
            Repository::Director => self.director.clone(),
            Repository::Config => self.config.clone(),
        }
    }

    fn verifies_org(&self) -> bool {
        true
    }

    fn config_context(&self) -> Option<String> {
        self.config_summary.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn reset(&self) {
        self.director.clear();
        self.config.clear();
        *self.config_summary.write().unwrap_or_else(|p| p.into_inner()) = None;
    }
}
