//! Target records and payloads.

use crate::types::HexBytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hash algorithm name → digest.
pub type Hashes = BTreeMap<String, HexBytes>;

/// Declared metadata for one target file inside a targets document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFileRecord {
    pub length: u64,
    #[serde(default)]
    pub hashes: Hashes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

impl TargetFileRecord {
    /// Build a record describing `data`, hashed with sha256.
    pub fn for_bytes(data: &[u8]) -> Self {
        let mut hashes = Hashes::new();
        hashes.insert("sha256".to_string(), HexBytes(crate::crypto::sha256(data).to_vec()));
        Self {
            length: data.len() as u64,
            hashes,
            custom: None,
        }
    }
}

/// Target path → declared record.
pub type TargetFiles = BTreeMap<String, TargetFileRecord>;

/// Raw target payload bytes, addressed by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFile {
    pub path: String,
    pub raw: Vec<u8>,
}

impl TargetFile {
    pub fn new(path: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            raw: raw.into(),
        }
    }
}
