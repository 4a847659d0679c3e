//! Update payloads handed to the push-based client.

use rcfg_model::{MetaHeader, TargetFile};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A signed metadata document and the version it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedMeta {
    pub version: u64,
    pub raw: Vec<u8>,
}

impl VersionedMeta {
    pub fn new(version: u64, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            raw: raw.into(),
        }
    }

    /// Take the version from the document itself. Signatures are not checked.
    pub fn from_raw(raw: impl Into<Vec<u8>>) -> Result<Self, serde_json::Error> {
        let raw = raw.into();
        let version = MetaHeader::parse(&raw)?.version;
        Ok(Self { version, raw })
    }
}

/// Candidate documents for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetas {
    /// New roots, in ascending version order.
    #[serde(default)]
    pub roots: Vec<VersionedMeta>,
    #[serde(default)]
    pub timestamp: Option<VersionedMeta>,
    #[serde(default)]
    pub snapshot: Option<VersionedMeta>,
    #[serde(default)]
    pub targets: Option<VersionedMeta>,
}

impl RepositoryMetas {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.timestamp.is_none() && self.snapshot.is_none() && self.targets.is_none()
    }

    /// Versions offered, e.g. `roots=2,3 targets=7 snapshot=9 timestamp=12`.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no metas in update".to_string();
        }
        let mut parts = Vec::new();
        if !self.roots.is_empty() {
            let mut roots = String::from("roots=");
            for (i, root) in self.roots.iter().enumerate() {
                if i > 0 {
                    roots.push(',');
                }
                let _ = write!(roots, "{}", root.version);
            }
            parts.push(roots);
        }
        if let Some(targets) = &self.targets {
            parts.push(format!("targets={}", targets.version));
        }
        if let Some(snapshot) = &self.snapshot {
            parts.push(format!("snapshot={}", snapshot.version));
        }
        if let Some(timestamp) = &self.timestamp {
            parts.push(format!("timestamp={}", timestamp.version));
        }
        parts.join(" ")
    }
}

/// Everything one push update carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    #[serde(default)]
    pub target_files: Vec<TargetFile>,
    #[serde(default)]
    pub director_metas: RepositoryMetas,
    #[serde(default)]
    pub config_metas: RepositoryMetas,
}
