//! The Uptane client.
//!
//! One [`Client`] owns both repositories' verification engines and every
//! store it builds on the cache database. Its staging buffer is private:
//! clients sharing a database never see or discard each other's writes. A single async lock guards the
//! whole instance: updates and reads are strictly serialized, so a read never
//! observes a half-applied update.
//!
//! An update stages everything it writes, verifies director and config
//! repositories against each other, and either commits the lot in one
//! database transaction or rolls it all back.

use crate::error::UptaneError;
use crate::options::ClientOptions;
use crate::org::{OrgUuidProvider, SnapshotCustom};
use crate::payload::UpdatePayload;
use crate::remote::{CdnSource, HttpTransport, PushSource, RemoteSource, Transport};
use rcfg_model::{Clock, ConfigPath, LocalMetaStore, Repository, Role, TargetFiles};
use rcfg_storage::{Database, LocalStore, OrgStore, TargetStore, TransactionalStore};
use rcfg_tuf::TufClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// How long a successful verification is reused by reads.
pub const VERIFICATION_TTL: Duration = Duration::from_secs(60);

/// Client fed by update payloads pushed from the core agent.
pub type CoreAgentClient = Client<PushSource>;

/// Client pulling updates from the CDN.
pub type CdnClient = Client<CdnSource>;

struct ClientState {
    director: TufClient,
    config: TufClient,
    /// Clock time (ms) of the last successful verification.
    verified_at: Option<u64>,
    /// Set while an update is in flight. Still set at the next lock
    /// acquisition means the update future was dropped.
    dirty: bool,
}

pub struct Client<S: RemoteSource> {
    source: S,
    store: Arc<TransactionalStore>,
    director_local: Arc<LocalStore>,
    config_local: Arc<LocalStore>,
    targets: TargetStore,
    orgs: OrgStore,
    org_id: Option<u64>,
    org_uuid_provider: Box<dyn OrgUuidProvider>,
    clock: Arc<dyn Clock>,
    state: Mutex<ClientState>,
}

impl<S: RemoteSource> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("org_id", &self.org_id)
            .finish_non_exhaustive()
    }
}

impl Client<PushSource> {
    pub fn new(
        db: Arc<Database>,
        org_uuid_provider: impl OrgUuidProvider + 'static,
        options: ClientOptions,
    ) -> Result<Self, UptaneError> {
        let store = Arc::new(TransactionalStore::new(db));
        let source = PushSource::new(TargetStore::new(store.clone()));
        Self::with_source(store, source, Box::new(org_uuid_provider), options)
    }

    /// Apply a pushed update payload. On failure nothing it carried is kept
    /// and the previously committed state keeps being served.
    #[tracing::instrument(skip_all)]
    pub async fn update(&self, payload: UpdatePayload) -> Result<(), UptaneError> {
        self.run_update(None, move |client| {
            client.targets.store_target_files(&payload.target_files);
            client.source.load(payload.director_metas, payload.config_metas);
        })
        .await
    }
}

impl Client<CdnSource> {
    /// CDN clients do not check the snapshot org UUID.
    pub fn new(
        db: Arc<Database>,
        transport: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Result<Self, UptaneError> {
        let store = Arc::new(TransactionalStore::new(db));
        let provider = || Ok::<_, String>(String::new());
        Self::with_source(store, CdnSource::new(transport), Box::new(provider), options)
    }

    /// CDN client over HTTPS for the configured site.
    pub fn with_http(
        db: Arc<Database>,
        api_key: &str,
        options: ClientOptions,
    ) -> Result<Self, UptaneError> {
        let site = options
            .site()
            .ok_or_else(|| UptaneError::InvalidOptions("a site is required to reach the CDN".to_string()))?;
        let transport = HttpTransport::for_site(site, api_key)?;
        Self::new(db, Arc::new(transport), options)
    }

    /// Pull and apply the latest metadata. Cancelling `token` aborts the
    /// update with [`UptaneError::Cancelled`] after rolling it back.
    #[tracing::instrument(skip_all)]
    pub async fn update(&self, token: CancellationToken) -> Result<(), UptaneError> {
        let bound = token.clone();
        self.run_update(Some(token), move |client| client.source.bind(bound))
            .await
    }
}

impl<S: RemoteSource> Client<S> {
    fn with_source(
        store: Arc<TransactionalStore>,
        source: S,
        org_uuid_provider: Box<dyn OrgUuidProvider>,
        options: ClientOptions,
    ) -> Result<Self, UptaneError> {
        let director_local = Arc::new(LocalStore::open(
            store.clone(),
            Repository::Director,
            &options.director_root,
        )?);
        let config_local = Arc::new(LocalStore::open(
            store.clone(),
            Repository::Config,
            &options.config_root,
        )?);

        let (director, config) = build_engines(&source, &director_local, &config_local, &options.clock);
        let client = Self {
            targets: TargetStore::new(store.clone()),
            orgs: OrgStore::new(store.clone()),
            org_id: options.org_id,
            org_uuid_provider,
            clock: options.clock,
            state: Mutex::new(ClientState {
                director,
                config,
                verified_at: None,
                dirty: false,
            }),
            source,
            store,
            director_local,
            config_local,
        };

        tracing::info!(
            site = options.site.as_deref().unwrap_or("default"),
            org_id = ?client.org_id,
            "uptane client ready"
        );
        Ok(client)
    }

    fn engines(&self) -> (TufClient, TufClient) {
        build_engines(&self.source, &self.director_local, &self.config_local, &self.clock)
    }

    /// Rebuild both engines from the committed trust state.
    fn reset_engines(&self, state: &mut ClientState) {
        let (director, config) = self.engines();
        state.director = director;
        state.config = config;
        state.verified_at = None;
    }

    async fn lock(&self) -> MutexGuard<'_, ClientState> {
        let mut state = self.state.lock().await;
        if state.dirty {
            tracing::warn!("previous update was abandoned; resetting verification engines");
            self.store.rollback();
            self.source.reset();
            self.reset_engines(&mut state);
            state.dirty = false;
        }
        state
    }

    async fn run_update<F>(&self, cancel: Option<CancellationToken>, prepare: F) -> Result<(), UptaneError>
    where
        F: FnOnce(&Self) + Send,
    {
        let mut state = self.lock().await;
        let txn = self.store.transaction()?;
        state.verified_at = None;
        state.dirty = true;
        prepare(self);

        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(UptaneError::Cancelled),
                    result = self.update_and_verify(&mut state) => result,
                }
            }
            None => self.update_and_verify(&mut state).await,
        };
        let result = result.and_then(|()| txn.commit().map_err(UptaneError::from));
        self.source.finish();

        match result {
            Ok(()) => {
                state.verified_at = Some(self.clock.now_ms());
                state.dirty = false;
                tracing::info!("update committed");
                Ok(())
            }
            Err(e) => {
                // An uncommitted transaction was rolled back when its guard dropped.
                self.source.reset();
                self.reset_engines(&mut state);
                state.dirty = false;
                tracing::warn!(error = %e, "update rolled back");
                Err(e)
            }
        }
    }

    async fn update_and_verify(&self, state: &mut ClientState) -> Result<(), UptaneError> {
        state
            .director
            .update()
            .await
            .map_err(|e| UptaneError::protocol(Repository::Director, "failed updating director repository", e))?;
        state.config.update().await.map_err(|e| {
            let context = match self.source.config_context() {
                Some(summary) => format!("could not update config repository [{}]", summary),
                None => "could not update config repository".to_string(),
            };
            UptaneError::protocol(Repository::Config, context, e)
        })?;

        self.prune_target_files(state);
        self.verify_org(state)?;
        self.verify_uptane(state).await
    }

    /// Drop stored target files the director no longer references. Failure
    /// is logged and retried with the next update.
    fn prune_target_files(&self, state: &mut ClientState) {
        let keep: Vec<String> = match state.director.targets() {
            Ok(targets) => targets.into_keys().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not list director targets for pruning");
                return;
            }
        };
        if let Err(e) = self.targets.prune_target_files(&keep) {
            tracing::warn!(error = %e, "failed to prune target files");
        }
    }

    /// Verify unless a verification succeeded within [`VERIFICATION_TTL`].
    /// Bindings resolved along the way are committed.
    async fn verify(&self, state: &mut ClientState) -> Result<(), UptaneError> {
        let now = self.clock.now_ms();
        if let Some(verified_at) = state.verified_at {
            if now.saturating_sub(verified_at) < VERIFICATION_TTL.as_millis() as u64 {
                return Ok(());
            }
        }

        let txn = self.store.transaction()?;
        self.verify_org(state)?;
        self.verify_uptane(state).await?;
        txn.commit()?;

        state.verified_at = Some(now);
        tracing::debug!("verification refreshed");
        Ok(())
    }

    fn verify_org(&self, state: &mut ClientState) -> Result<(), UptaneError> {
        if !self.source.verifies_org() {
            return Ok(());
        }

        let raw_custom = self
            .config_local
            .get_meta_custom(Role::Snapshot)
            .map_err(|e| UptaneError::OrgIdentity(format!("could not obtain snapshot custom: {}", e)))?;
        let custom = SnapshotCustom::parse(raw_custom.as_deref())?;
        if let Some(received) = custom.org_uuid {
            let stored = self.resolve_org_uuid()?;
            if stored != received {
                return Err(UptaneError::OrgIdentity(format!(
                    "stored/remote org UUID and snapshot org UUID do not match: stored={} received={}",
                    stored, received
                )));
            }
        }

        let Some(org_id) = self.org_id else {
            return Ok(());
        };
        for path in state.director.targets()?.keys() {
            let config_path = ConfigPath::parse(path)?;
            if config_path.is_exempt_from_org_check() {
                continue;
            }
            if config_path.org_id != Some(org_id) {
                return Err(UptaneError::OrgIdentity(format!(
                    "director target '{}' does not have the correct org ID: {} != {}",
                    path,
                    config_path.org_id.map(|id| id.to_string()).unwrap_or_default(),
                    org_id
                )));
            }
        }
        Ok(())
    }

    /// Director targets must be exactly matched by config targets, and the
    /// bytes of every target must verify in both repositories.
    async fn verify_uptane(&self, state: &mut ClientState) -> Result<(), UptaneError> {
        let director_targets = state.director.targets()?;
        if director_targets.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = director_targets.keys().cloned().collect();
        let config_targets = state.config.target_batch(&paths).map_err(|e| {
            if e.is_not_found() {
                UptaneError::NotFound(format!("failed to find target in config repository: {}", e))
            } else {
                UptaneError::Verification(e)
            }
        })?;

        for (path, director) in &director_targets {
            let config = config_targets
                .get(path)
                .ok_or_else(|| UptaneError::NotFound(format!("target '{}' missing from config repository", path)))?;
            if config.length != director.length {
                return Err(UptaneError::Mismatch(format!(
                    "target '{}' has size {} in director repository and {} in config repository",
                    path, director.length, config.length
                )));
            }
            if director.hashes.is_empty() {
                return Err(UptaneError::Mismatch(format!(
                    "target '{}' has no hashes in the director repository",
                    path
                )));
            }
            if director.hashes.len() != config.hashes.len() {
                return Err(UptaneError::Mismatch(format!(
                    "target '{}' has {} hashes in director repository and {} hashes in config repository",
                    path,
                    director.hashes.len(),
                    config.hashes.len()
                )));
            }
            for (algorithm, director_hash) in &director.hashes {
                match config.hashes.get(algorithm) {
                    None => {
                        return Err(UptaneError::Mismatch(format!(
                            "target '{}': {} hash '{}' found in director repository but not in config repository",
                            path, algorithm, director_hash
                        )))
                    }
                    Some(config_hash) if config_hash != director_hash => {
                        return Err(UptaneError::Mismatch(format!(
                            "target '{}': director {} hash '{}' does not match config repository hash '{}'",
                            path, algorithm, director_hash, config_hash
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        let mut buffers: BTreeMap<String, Vec<u8>> =
            paths.into_iter().map(|path| (path, Vec::new())).collect();
        state.config.download_batch(&mut buffers).await?;
        state.director.download_batch(&mut buffers).await?;
        Ok(())
    }

    /// Org UUID bound to the current config root version, asking the
    /// provider and staging the binding when none exists yet.
    fn resolve_org_uuid(&self) -> Result<String, UptaneError> {
        let root_version = self.config_local.get_meta_version(Role::Root)?;
        if let Some(org_uuid) = self.orgs.get_org_uuid(root_version)? {
            return Ok(org_uuid);
        }
        let org_uuid = self
            .org_uuid_provider
            .org_uuid()
            .map_err(|e| UptaneError::OrgIdentity(format!("could not obtain org UUID: {}", e)))?;
        self.orgs.store_org_uuid(root_version, &org_uuid)?;
        Ok(org_uuid)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Director target records.
    pub async fn targets(&self) -> Result<TargetFiles, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        Ok(state.director.targets()?)
    }

    /// Verified bytes of one director target.
    pub async fn target_file(&self, path: &str) -> Result<Vec<u8>, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        Ok(state.director.download(path).await?)
    }

    /// Verified bytes of several director targets.
    pub async fn target_files(&self, paths: &[String]) -> Result<BTreeMap<String, Vec<u8>>, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        let mut files: BTreeMap<String, Vec<u8>> =
            paths.iter().map(|path| (path.clone(), Vec::new())).collect();
        state.director.download_batch(&mut files).await?;
        Ok(files)
    }

    /// Raw director `targets.json`.
    pub async fn targets_meta(&self) -> Result<Vec<u8>, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        self.stored_targets_meta()
    }

    /// Raw director `targets.json` without verification. Diagnostics only.
    pub async fn unsafe_targets_meta(&self) -> Result<Vec<u8>, UptaneError> {
        let _state = self.lock().await;
        self.stored_targets_meta()
    }

    fn stored_targets_meta(&self) -> Result<Vec<u8>, UptaneError> {
        self.director_local
            .get_role_meta(Role::Targets)?
            .ok_or_else(|| UptaneError::NotFound("empty targets meta in director local store".to_string()))
    }

    /// Raw `custom` field of the director targets metadata.
    pub async fn targets_custom(&self) -> Result<Option<Vec<u8>>, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        Ok(self.director_local.get_meta_custom(Role::Targets)?)
    }

    /// Expiry of the director timestamp.
    pub async fn timestamp_expires(&self) -> Result<OffsetDateTime, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        Ok(self.director_local.get_meta_expires(Role::Timestamp)?)
    }

    /// A retained director root document.
    pub async fn director_root(&self, version: u64) -> Result<Vec<u8>, UptaneError> {
        let mut state = self.lock().await;
        self.verify(&mut state).await?;
        self.director_local.get_root(version)?.ok_or_else(|| {
            UptaneError::NotFound(format!(
                "director root version {} was not found in local store",
                version
            ))
        })
    }

    /// Org UUID bound to the current config root version. The first call
    /// for a root version asks the provider and persists its answer.
    pub async fn stored_org_uuid(&self) -> Result<String, UptaneError> {
        let _state = self.lock().await;
        let txn = self.store.transaction()?;
        let org_uuid = self.resolve_org_uuid()?;
        txn.commit()?;
        Ok(org_uuid)
    }
}

fn build_engines<S: RemoteSource>(
    source: &S,
    director_local: &Arc<LocalStore>,
    config_local: &Arc<LocalStore>,
    clock: &Arc<dyn Clock>,
) -> (TufClient, TufClient) {
    let director_store: Arc<dyn LocalMetaStore> = director_local.clone();
    let config_store: Arc<dyn LocalMetaStore> = config_local.clone();
    (
        TufClient::new(
            Repository::Director,
            director_store,
            source.remote(Repository::Director),
            clock.clone(),
        ),
        TufClient::new(
            Repository::Config,
            config_store,
            source.remote(Repository::Config),
            clock.clone(),
        ),
    )
}
