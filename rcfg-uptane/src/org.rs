//! Organization identity.

use crate::error::UptaneError;
use serde::Deserialize;

/// Source of the organization UUID this host belongs to.
pub trait OrgUuidProvider: Send + Sync {
    fn org_uuid(&self) -> Result<String, String>;
}

impl<F> OrgUuidProvider for F
where
    F: Fn() -> Result<String, String> + Send + Sync,
{
    fn org_uuid(&self) -> Result<String, String> {
        self()
    }
}

/// `custom` field of the config repository's snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnapshotCustom {
    #[serde(default)]
    pub org_uuid: Option<String>,
}

impl SnapshotCustom {
    /// Parse the raw `custom` JSON. An absent field means no org binding.
    pub fn parse(raw: Option<&[u8]>) -> Result<Self, UptaneError> {
        match raw {
            None => Ok(Self::default()),
            Some(raw) => serde_json::from_slice(raw)
                .map_err(|e| UptaneError::OrgIdentity(format!("could not parse snapshot custom: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_custom() {
        assert_eq!(SnapshotCustom::parse(None).unwrap().org_uuid, None);
        assert_eq!(SnapshotCustom::parse(Some(b"{}")).unwrap().org_uuid, None);
        let custom = SnapshotCustom::parse(Some(br#"{"org_uuid":"abc","other":1}"#)).unwrap();
        assert_eq!(custom.org_uuid.as_deref(), Some("abc"));
        assert!(SnapshotCustom::parse(Some(b"[1,2]")).is_err());
    }

    #[test]
    fn test_closure_provider() {
        let provider = || Ok::<_, String>("uuid".to_string());
        assert_eq!(OrgUuidProvider::org_uuid(&provider).unwrap(), "uuid");
    }
}
