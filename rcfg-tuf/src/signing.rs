//! Publisher-side helpers: building and signing metadata documents.
//!
//! Used by repository tooling and test fixtures. The client never signs.

use rcfg_model::metadata::{Key, MetaFile, Root, RoleKeys, SignatureEntry, SPEC_VERSION};
use rcfg_model::{crypto, Hashes, HexBytes, PubKey, RawEnvelope, Role};
use ed25519_dalek::SigningKey;
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Public [`Key`] entry for a signing key.
pub fn public_key(signing_key: &SigningKey) -> Key {
    Key::ed25519(&PubKey(signing_key.verifying_key().to_bytes()))
}

/// Wrap `body` in an envelope signed by every key in `signers`.
pub fn sign_metadata(body: &impl Serialize, signers: &[&SigningKey]) -> Result<Vec<u8>, serde_json::Error> {
    let signed = serde_json::to_value(body)?;
    let mut envelope = RawEnvelope {
        signed,
        signatures: Vec::with_capacity(signers.len()),
    };
    let message = envelope.signed_bytes();
    for signer in signers {
        envelope.signatures.push(SignatureEntry {
            keyid: public_key(signer).key_id(),
            sig: crypto::sign(signer, &message).to_string(),
        });
    }
    serde_json::to_vec(&envelope)
}

/// Describe a signed document for a timestamp or snapshot `meta` entry.
pub fn meta_file(raw: &[u8], version: u64) -> MetaFile {
    let mut hashes = Hashes::new();
    hashes.insert("sha256".to_string(), HexBytes(crypto::sha256(raw).to_vec()));
    MetaFile {
        version,
        length: Some(raw.len() as u64),
        hashes,
    }
}

/// Builder for root documents.
pub struct RootBuilder {
    version: u64,
    expires: OffsetDateTime,
    keys: BTreeMap<String, Key>,
    roles: BTreeMap<String, RoleKeys>,
}

impl RootBuilder {
    pub fn new(version: u64, expires: OffsetDateTime) -> Self {
        Self {
            version,
            expires,
            keys: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }

    /// Authorize `signers` for `role` with the given threshold.
    pub fn role(mut self, role: Role, signers: &[&SigningKey], threshold: u32) -> Self {
        let mut keyids = Vec::with_capacity(signers.len());
        for signer in signers {
            let key = public_key(signer);
            let keyid = key.key_id();
            keyids.push(keyid.clone());
            self.keys.insert(keyid, key);
        }
        self.roles
            .insert(role.as_str().to_string(), RoleKeys { keyids, threshold });
        self
    }

    pub fn build(self) -> Root {
        Root {
            type_: Role::Root.as_str().to_string(),
            spec_version: SPEC_VERSION.to_string(),
            version: self.version,
            expires: self.expires,
            keys: self.keys,
            roles: self.roles,
            consistent_snapshot: false,
        }
    }
}
