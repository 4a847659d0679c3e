//! Centralized cryptographic operations.
//!
//! **All** Ed25519 signing, verification and digest computation should go
//! through this module. This provides a single audit surface for
//! cryptographic correctness.
//!
//! # Primitives
//!
//! | Primitive   | Algorithm         | Purpose                                   |
//! |-------------|-------------------|-------------------------------------------|
//! | Digest      | SHA-256 / SHA-512 | Target hashes, metadata hashes, key IDs   |
//! | Signature   | Ed25519 (64 B)    | Metadata role signatures                  |

use crate::types::{PubKey, Signature};
use sha2::{Digest, Sha256, Sha512};

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

/// Hash algorithm names understood by the verifier.
pub const SUPPORTED_HASH_ALGORITHMS: &[&str] = &["sha256", "sha512"];

/// Compute the SHA-256 digest of arbitrary bytes.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute the digest of `data` with the named algorithm.
///
/// Returns `None` for algorithms this module does not implement; callers
/// decide whether an unknown algorithm is acceptable.
pub fn digest(algorithm: &str, data: &[u8]) -> Option<Vec<u8>> {
    match algorithm {
        "sha256" => Some(Sha256::digest(data).to_vec()),
        "sha512" => Some(Sha512::digest(data).to_vec()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Ed25519 signing
// ---------------------------------------------------------------------------

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &ed25519_dalek::SigningKey, message: &[u8]) -> Signature {
    use ed25519_dalek::Signer;
    Signature(signing_key.sign(message).to_bytes())
}

// ---------------------------------------------------------------------------
// Ed25519 verification
// ---------------------------------------------------------------------------

/// Verify an Ed25519 signature over a message (strict).
///
/// Uses `verify_strict()` (rejects small-order keys, checks canonical S).
pub fn verify(pubkey: &PubKey, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
    let vk = verifying_key(pubkey)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify_strict(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Deserialize a `PubKey` into an Ed25519 `VerifyingKey`.
///
/// Fails if the 32 bytes are not a valid curve point.
pub fn verifying_key(pubkey: &PubKey) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
    ed25519_dalek::VerifyingKey::from_bytes(&pubkey.0).map_err(|_| CryptoError::InvalidPublicKey)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Cryptographic operation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid Ed25519 signature")]
    InvalidSignature,

    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let pubkey = PubKey(key.verifying_key().to_bytes());
        let sig = sign(&key, b"payload");
        assert!(verify(&pubkey, b"payload", &sig).is_ok());
        assert_eq!(
            verify(&pubkey, b"tampered", &sig),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_digest_algorithms() {
        assert_eq!(digest("sha256", b"abc").unwrap().len(), 32);
        assert_eq!(digest("sha512", b"abc").unwrap().len(), 64);
        assert!(digest("md5", b"abc").is_none());
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
