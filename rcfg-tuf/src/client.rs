//! Verification engine for one repository.
//!
//! [`TufClient`] walks the chain root → timestamp → snapshot → targets,
//! fetching candidate documents from a [`RemoteStore`] and persisting every
//! accepted document through a [`LocalMetaStore`]. It never commits: the
//! local store decides when staged writes become durable.

use crate::error::TufError;
use crate::verify::{check_meta_file, check_target, decode_role, verify_role};
use futures::future::try_join_all;
use rcfg_model::metadata::{MetaFile, Root, Snapshot, Targets, Timestamp};
use rcfg_model::{
    versioned_root_name, Clock, LocalMetaStore, RawEnvelope, RemoteStore, Repository, Role,
    TargetFileRecord, TargetFiles,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// Documents trusted after the last successful load or update.
#[derive(Debug, Clone)]
struct TrustedState {
    root: Root,
    timestamp: Option<Timestamp>,
    snapshot: Option<Snapshot>,
    targets: Option<Targets>,
}

pub struct TufClient {
    repository: Repository,
    local: Arc<dyn LocalMetaStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    trusted: Option<TrustedState>,
}

impl std::fmt::Debug for TufClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TufClient")
            .field("repository", &self.repository)
            .field("loaded", &self.trusted.is_some())
            .finish_non_exhaustive()
    }
}

impl TufClient {
    /// Trusted state is loaded from `local` on first use.
    pub fn new(
        repository: Repository,
        local: Arc<dyn LocalMetaStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            local,
            remote,
            clock,
            trusted: None,
        }
    }

    pub fn repository(&self) -> Repository {
        self.repository
    }

    /// Bring the local chain up to date with the remote and return the
    /// resulting target records.
    ///
    /// On failure the in-memory trusted state is dropped and reloaded from
    /// the local store on next use.
    pub async fn update(&mut self) -> Result<TargetFiles, TufError> {
        match self.try_update().await {
            Ok(state) => {
                let targets = state
                    .targets
                    .as_ref()
                    .map(|t| t.targets.clone())
                    .unwrap_or_default();
                tracing::debug!(
                    repository = %self.repository,
                    root = state.root.version,
                    targets = targets.len(),
                    "metadata chain verified"
                );
                self.trusted = Some(state);
                Ok(targets)
            }
            Err(e) => {
                self.trusted = None;
                Err(e)
            }
        }
    }

    async fn try_update(&self) -> Result<TrustedState, TufError> {
        let mut state = self.load_trusted()?;
        if self.update_roots(&mut state).await? {
            // Re-read the other roles under the rotated keys.
            state = self.load_trusted()?;
        }
        self.check_expiry(Role::Root, state.root.expires)?;

        let snapshot_meta = self.update_timestamp(&mut state).await?;
        let targets_meta = self.update_snapshot(&mut state, &snapshot_meta).await?;
        self.update_targets(&mut state, &targets_meta).await?;
        Ok(state)
    }

    /// Walk `{n+1}.root.json`, `{n+2}.root.json`, ... until the remote has no
    /// newer root. Returns whether any rotation happened.
    async fn update_roots(&self, state: &mut TrustedState) -> Result<bool, TufError> {
        let mut rotated = false;
        loop {
            let next = state.root.version + 1;
            let name = versioned_root_name(next);
            let raw = match self.remote.get_meta(&name).await {
                Ok(raw) => raw,
                Err(e) if e.is_not_found() => break,
                Err(e) => return Err(e.into()),
            };

            let envelope = RawEnvelope::parse(&raw)?;
            verify_role(&state.root, Role::Root, &envelope)?;
            let root: Root = decode_role(&envelope, Role::Root)?;
            verify_role(&root, Role::Root, &envelope)?;
            if root.version != next {
                return Err(TufError::WrongVersion {
                    role: Role::Root,
                    expected: next,
                    received: root.version,
                });
            }

            let keys_changed = [Role::Timestamp, Role::Snapshot]
                .iter()
                .any(|role| state.root.role(*role) != root.role(*role));

            self.local.set_meta(&name, &raw)?;
            self.local.set_meta(Role::Root.meta_name(), &raw)?;
            if keys_changed {
                self.local.delete_meta(Role::Timestamp.meta_name())?;
                self.local.delete_meta(Role::Snapshot.meta_name())?;
            }
            tracing::info!(
                repository = %self.repository,
                version = next,
                keys_changed,
                "rotated root"
            );
            state.root = root;
            rotated = true;
        }
        Ok(rotated)
    }

    async fn update_timestamp(&self, state: &mut TrustedState) -> Result<MetaFile, TufError> {
        let raw = self.remote.get_meta(Role::Timestamp.meta_name()).await?;
        let envelope = RawEnvelope::parse(&raw)?;
        verify_role(&state.root, Role::Timestamp, &envelope)?;
        let timestamp: Timestamp = decode_role(&envelope, Role::Timestamp)?;

        if let Some(trusted) = &state.timestamp {
            check_not_lower(Role::Timestamp, trusted.version, timestamp.version)?;
        }
        self.check_expiry(Role::Timestamp, timestamp.expires)?;

        let snapshot_meta = timestamp
            .meta
            .get(Role::Snapshot.meta_name())
            .cloned()
            .ok_or_else(|| TufError::Decode("timestamp does not reference snapshot.json".to_string()))?;
        if let Some(trusted) = state
            .timestamp
            .as_ref()
            .and_then(|t| t.meta.get(Role::Snapshot.meta_name()))
        {
            check_not_lower(Role::Snapshot, trusted.version, snapshot_meta.version)?;
        }

        self.local.set_meta(Role::Timestamp.meta_name(), &raw)?;
        state.timestamp = Some(timestamp);
        Ok(snapshot_meta)
    }

    async fn update_snapshot(
        &self,
        state: &mut TrustedState,
        snapshot_meta: &MetaFile,
    ) -> Result<MetaFile, TufError> {
        let up_to_date = state
            .snapshot
            .as_ref()
            .is_some_and(|s| s.version == snapshot_meta.version);

        if !up_to_date {
            let name = Role::Snapshot.meta_name();
            let raw = self.remote.get_meta(name).await?;
            check_meta_file(name, &raw, snapshot_meta)?;
            let envelope = RawEnvelope::parse(&raw)?;
            verify_role(&state.root, Role::Snapshot, &envelope)?;
            let snapshot: Snapshot = decode_role(&envelope, Role::Snapshot)?;
            check_version(Role::Snapshot, snapshot_meta.version, snapshot.version)?;

            if let Some(trusted) = &state.snapshot {
                check_not_lower(Role::Snapshot, trusted.version, snapshot.version)?;
                let targets = Role::Targets.meta_name();
                if let (Some(old), Some(new)) = (trusted.meta.get(targets), snapshot.meta.get(targets)) {
                    check_not_lower(Role::Targets, old.version, new.version)?;
                }
            }

            self.local.set_meta(name, &raw)?;
            state.snapshot = Some(snapshot);
        }

        let snapshot = state
            .snapshot
            .as_ref()
            .ok_or(TufError::MissingMeta(Role::Snapshot))?;
        self.check_expiry(Role::Snapshot, snapshot.expires)?;
        snapshot
            .meta
            .get(Role::Targets.meta_name())
            .cloned()
            .ok_or_else(|| TufError::Decode("snapshot does not reference targets.json".to_string()))
    }

    async fn update_targets(&self, state: &mut TrustedState, targets_meta: &MetaFile) -> Result<(), TufError> {
        let up_to_date = state
            .targets
            .as_ref()
            .is_some_and(|t| t.version == targets_meta.version);

        if !up_to_date {
            let name = Role::Targets.meta_name();
            let raw = self.remote.get_meta(name).await?;
            check_meta_file(name, &raw, targets_meta)?;
            let envelope = RawEnvelope::parse(&raw)?;
            verify_role(&state.root, Role::Targets, &envelope)?;
            let targets: Targets = decode_role(&envelope, Role::Targets)?;
            check_version(Role::Targets, targets_meta.version, targets.version)?;
            if let Some(trusted) = &state.targets {
                check_not_lower(Role::Targets, trusted.version, targets.version)?;
            }

            self.local.set_meta(name, &raw)?;
            state.targets = Some(targets);
        }

        let targets = state
            .targets
            .as_ref()
            .ok_or(TufError::MissingMeta(Role::Targets))?;
        self.check_expiry(Role::Targets, targets.expires)
    }

    /// Every target record of the trusted targets metadata. Empty when no
    /// targets metadata is trusted yet.
    pub fn targets(&mut self) -> Result<TargetFiles, TufError> {
        self.ensure_loaded()?;
        Ok(self
            .loaded()?
            .targets
            .as_ref()
            .map(|t| t.targets.clone())
            .unwrap_or_default())
    }

    /// Records for exactly `paths`. Fails with [`TufError::UnknownTarget`]
    /// for the first path the trusted targets metadata does not list, and
    /// with [`TufError::Expired`] when the trusted snapshot or targets
    /// metadata has expired.
    pub fn target_batch(&mut self, paths: &[String]) -> Result<TargetFiles, TufError> {
        self.ensure_loaded()?;
        let targets = self.unexpired_targets()?;
        paths
            .iter()
            .map(|path| {
                targets
                    .targets
                    .get(path)
                    .cloned()
                    .map(|record| (path.clone(), record))
                    .ok_or_else(|| TufError::UnknownTarget(path.clone()))
            })
            .collect()
    }

    /// Fetch one target and check it against its trusted record.
    pub async fn download(&mut self, path: &str) -> Result<Vec<u8>, TufError> {
        self.ensure_loaded()?;
        let record = self
            .unexpired_targets()?
            .targets
            .get(path)
            .ok_or_else(|| TufError::UnknownTarget(path.to_string()))?;
        self.fetch_target(path, record).await
    }

    /// Fetch every target keyed in `destinations` concurrently and fill in
    /// the verified bytes. Nothing is written unless every download verifies.
    pub async fn download_batch(&mut self, destinations: &mut BTreeMap<String, Vec<u8>>) -> Result<(), TufError> {
        self.ensure_loaded()?;
        let targets = self.unexpired_targets()?;

        let mut requests = Vec::with_capacity(destinations.len());
        for path in destinations.keys() {
            let record = targets
                .targets
                .get(path)
                .ok_or_else(|| TufError::UnknownTarget(path.clone()))?;
            requests.push(self.fetch_target(path, record));
        }
        let downloaded = try_join_all(requests).await?;

        for (dest, raw) in destinations.values_mut().zip(downloaded) {
            *dest = raw;
        }
        Ok(())
    }

    async fn fetch_target(&self, path: &str, record: &TargetFileRecord) -> Result<Vec<u8>, TufError> {
        let raw = self.remote.get_target(path).await?;
        check_target(path, &raw, record)?;
        Ok(raw)
    }

    fn ensure_loaded(&mut self) -> Result<(), TufError> {
        if self.trusted.is_none() {
            self.trusted = Some(self.load_trusted()?);
        }
        Ok(())
    }

    fn loaded(&self) -> Result<&TrustedState, TufError> {
        self.trusted.as_ref().ok_or(TufError::MissingMeta(Role::Root))
    }

    fn unexpired_targets(&self) -> Result<&Targets, TufError> {
        let state = self.loaded()?;
        let snapshot = state
            .snapshot
            .as_ref()
            .ok_or(TufError::MissingMeta(Role::Snapshot))?;
        self.check_expiry(Role::Snapshot, snapshot.expires)?;
        let targets = state
            .targets
            .as_ref()
            .ok_or(TufError::MissingMeta(Role::Targets))?;
        self.check_expiry(Role::Targets, targets.expires)?;
        Ok(targets)
    }

    /// Load the persisted chain. The root must verify against itself; other
    /// documents that fail to verify under it are ignored. Expiry is not
    /// checked here.
    fn load_trusted(&self) -> Result<TrustedState, TufError> {
        let meta = self.local.get_meta()?;
        let raw_root = meta
            .get(Role::Root.meta_name())
            .ok_or(TufError::MissingMeta(Role::Root))?;
        let envelope = RawEnvelope::parse(raw_root)?;
        let root: Root = decode_role(&envelope, Role::Root)?;
        verify_role(&root, Role::Root, &envelope)?;

        Ok(TrustedState {
            timestamp: self.load_local(&root, &meta, Role::Timestamp),
            snapshot: self.load_local(&root, &meta, Role::Snapshot),
            targets: self.load_local(&root, &meta, Role::Targets),
            root,
        })
    }

    fn load_local<T: DeserializeOwned>(
        &self,
        root: &Root,
        meta: &BTreeMap<String, Vec<u8>>,
        role: Role,
    ) -> Option<T> {
        let raw = meta.get(role.meta_name())?;
        let loaded = RawEnvelope::parse(raw)
            .map_err(TufError::from)
            .and_then(|envelope| {
                verify_role(root, role, &envelope)?;
                decode_role(&envelope, role)
            });
        match loaded {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(
                    repository = %self.repository,
                    role = %role,
                    error = %e,
                    "ignoring local metadata that no longer verifies"
                );
                None
            }
        }
    }

    fn check_expiry(&self, role: Role, expires: OffsetDateTime) -> Result<(), TufError> {
        if expires <= self.clock.now() {
            return Err(TufError::Expired { role, expires });
        }
        Ok(())
    }
}

fn check_not_lower(role: Role, trusted: u64, received: u64) -> Result<(), TufError> {
    if received < trusted {
        return Err(TufError::LowVersion {
            role,
            trusted,
            received,
        });
    }
    Ok(())
}

fn check_version(role: Role, expected: u64, received: u64) -> Result<(), TufError> {
    if received != expected {
        return Err(TufError::WrongVersion {
            role,
            expected,
            received,
        });
    }
    Ok(())
}
