//! Threshold signature checks over signed envelopes.

use crate::error::TufError;
use rcfg_model::crypto;
use rcfg_model::metadata::{MetaFile, Root};
use rcfg_model::target::TargetFileRecord;
use rcfg_model::{RawEnvelope, Role, Signature};
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Count the distinct authorized keys of `role` that signed `envelope` and
/// require at least the role's threshold.
///
/// A signature counts only if its key ID is listed for the role, the key ID
/// is the key's own ID, and the signature verifies over the canonical
/// `signed` bytes. Duplicates of one key count once.
pub fn verify_role(root: &Root, role: Role, envelope: &RawEnvelope) -> Result<(), TufError> {
    let role_keys = root
        .role(role)
        .ok_or_else(|| TufError::Decode(format!("root has no {} role", role)))?;
    if role_keys.threshold == 0 {
        return Err(TufError::Decode(format!("{} role has a zero threshold", role)));
    }

    let message = envelope.signed_bytes();
    let mut counted = HashSet::new();
    for entry in &envelope.signatures {
        if !role_keys.keyids.contains(&entry.keyid) || counted.contains(&entry.keyid) {
            continue;
        }
        let Some(key) = root.keys.get(&entry.keyid) else {
            continue;
        };
        if key.key_id() != entry.keyid {
            continue;
        }
        let (Ok(pubkey), Ok(signature)) = (key.pubkey(), Signature::from_hex(&entry.sig)) else {
            continue;
        };
        if crypto::verify(&pubkey, &message, &signature).is_ok() {
            counted.insert(entry.keyid.clone());
        }
    }

    if counted.len() < role_keys.threshold as usize {
        return Err(TufError::Threshold {
            role,
            valid: counted.len(),
            threshold: role_keys.threshold,
        });
    }
    Ok(())
}

/// Decode the `signed` body as `role`, rejecting a mismatched `_type`.
pub fn decode_role<T: DeserializeOwned>(envelope: &RawEnvelope, role: Role) -> Result<T, TufError> {
    let type_ = envelope
        .signed
        .get("_type")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if type_ != role.as_str() {
        return Err(TufError::WrongType {
            expected: role,
            received: type_.to_string(),
        });
    }
    Ok(serde_json::from_value(envelope.signed.clone())?)
}

/// Check a referenced metadata document against its declared length and
/// hashes. Unknown hash algorithms are skipped.
pub fn check_meta_file(name: &str, raw: &[u8], meta: &MetaFile) -> Result<(), TufError> {
    if let Some(expected) = meta.length {
        check_length(name, raw, expected)?;
    }
    for (algorithm, expected) in &meta.hashes {
        if let Some(actual) = crypto::digest(algorithm, raw) {
            check_hash(name, algorithm, expected.as_slice(), &actual)?;
        }
    }
    Ok(())
}

/// Check downloaded target bytes. At least one supported hash is required and
/// every supported hash must match.
pub fn check_target(path: &str, raw: &[u8], record: &TargetFileRecord) -> Result<(), TufError> {
    check_length(path, raw, record.length)?;
    let mut checked = 0;
    for (algorithm, expected) in &record.hashes {
        if let Some(actual) = crypto::digest(algorithm, raw) {
            check_hash(path, algorithm, expected.as_slice(), &actual)?;
            checked += 1;
        }
    }
    if checked == 0 {
        return Err(TufError::NoSupportedHash(path.to_string()));
    }
    Ok(())
}

fn check_length(name: &str, raw: &[u8], expected: u64) -> Result<(), TufError> {
    let actual = raw.len() as u64;
    if actual != expected {
        return Err(TufError::LengthMismatch {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_hash(name: &str, algorithm: &str, expected: &[u8], actual: &[u8]) -> Result<(), TufError> {
    if expected != actual {
        return Err(TufError::HashMismatch {
            name: name.to_string(),
            algorithm: algorithm.to_string(),
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}
