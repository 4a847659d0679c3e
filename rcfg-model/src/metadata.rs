//! Signed metadata documents.
//!
//! A document on the wire is an envelope `{"signed": {...}, "signatures": [...]}`.
//! Signatures cover the canonical JSON of the `signed` object exactly as
//! received, so verification works on [`RawEnvelope`] and only then decodes
//! the typed body.

use crate::canonical::canonical_json;
use crate::role::Role;
use crate::target::{Hashes, TargetFiles};
use crate::types::PubKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

pub const SPEC_VERSION: &str = "1.0";
pub const KEY_TYPE_ED25519: &str = "ed25519";

/// A public key as listed in a root document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub keytype: String,
    pub scheme: String,
    pub keyval: KeyValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Hex-encoded public key bytes.
    pub public: String,
}

impl Key {
    pub fn ed25519(pubkey: &PubKey) -> Self {
        Self {
            keytype: KEY_TYPE_ED25519.to_string(),
            scheme: KEY_TYPE_ED25519.to_string(),
            keyval: KeyValue {
                public: pubkey.to_string(),
            },
        }
    }

    /// Key ID: hex sha256 of the key's canonical JSON.
    pub fn key_id(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        hex::encode(crate::crypto::sha256(&canonical_json(&value)))
    }

    /// Decode the Ed25519 public key, rejecting other key types.
    pub fn pubkey(&self) -> Result<PubKey, String> {
        if self.keytype != KEY_TYPE_ED25519 || self.scheme != KEY_TYPE_ED25519 {
            return Err(format!("unsupported key type {}/{}", self.keytype, self.scheme));
        }
        PubKey::from_hex(&self.keyval.public)
    }
}

/// Key IDs and signature threshold for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeys {
    pub keyids: Vec<String>,
    pub threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(rename = "_type")]
    pub type_: String,
    pub spec_version: String,
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub keys: BTreeMap<String, Key>,
    pub roles: BTreeMap<String, RoleKeys>,
    #[serde(default)]
    pub consistent_snapshot: bool,
}

impl Root {
    pub fn role(&self, role: Role) -> Option<&RoleKeys> {
        self.roles.get(role.as_str())
    }
}

/// Version, length and hashes of a referenced metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hashes: Hashes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    #[serde(rename = "_type")]
    pub type_: String,
    pub spec_version: String,
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub meta: BTreeMap<String, MetaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "_type")]
    pub type_: String,
    pub spec_version: String,
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub meta: BTreeMap<String, MetaFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(rename = "_type")]
    pub type_: String,
    pub spec_version: String,
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    #[serde(default)]
    pub targets: TargetFiles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

/// One signature entry of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub keyid: String,
    /// Hex-encoded signature bytes.
    pub sig: String,
}

/// An envelope with its `signed` body kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEnvelope {
    pub signed: serde_json::Value,
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
}

impl RawEnvelope {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Bytes the signatures are computed over.
    pub fn signed_bytes(&self) -> Vec<u8> {
        canonical_json(&self.signed)
    }
}

/// Fields shared by every role, read without knowing the role.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetaHeader {
    #[serde(rename = "_type")]
    pub type_: String,
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    #[serde(default)]
    pub custom: Option<serde_json::Value>,
}

impl MetaHeader {
    /// Read the header of a raw signed document. Signatures are not checked.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            signed: MetaHeader,
        }
        let envelope: Envelope = serde_json::from_slice(raw)?;
        Ok(envelope.signed)
    }
}
