//! Outbound message signing and the shared signature-check helpers.
//!
//! The wire rule is digest-then-sign: the 32-byte SHA-256 digest of the
//! exact serialized payload bytes is the message handed to ECDSA P-256.
//! Signatures are DER-encoded and randomized, so the payload→signature
//! mapping is one-to-many; both sides only ever compare by verification.

use p256::ecdsa::signature::{RandomizedSigner, Verifier};
use p256::ecdsa::{Signature, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{TrustError, TrustResult};
use crate::key_material::KeyMaterial;

/// Required digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Signs outbound payloads with the client key.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct MessageSigner {
    key: KeyMaterial,
}

impl MessageSigner {
    /// Builds a signer around unlocked key material.
    #[must_use]
    pub const fn new(key: KeyMaterial) -> Self {
        Self { key }
    }

    /// Signs the digest of `payload` with the client key, returning the
    /// DER-encoded signature.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidInput`] if the internal digest is ever
    /// not exactly 32 bytes. Unreachable with a fixed hash algorithm; kept
    /// because the digest-signing entry point is also reachable with
    /// caller-supplied digests.
    pub fn sign(&self, payload: &[u8]) -> TrustResult<Vec<u8>> {
        self.sign_digest(&payload_digest(payload))
    }

    /// Signs a precomputed 32-byte digest.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidInput`] if `digest` is not exactly 32
    /// bytes.
    pub fn sign_digest(&self, digest: &[u8]) -> TrustResult<Vec<u8>> {
        if digest.len() != DIGEST_LEN {
            return Err(TrustError::invalid_input(
                "digest",
                format!("must be {DIGEST_LEN} bytes, got {}", digest.len()),
            ));
        }
        let signature: Signature = self
            .key
            .signing_key()
            .sign_with_rng(&mut OsRng, digest);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// The public key responses to this client's requests are verified
    /// against on the authority side.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

/// SHA-256 digest of the exact payload bytes.
#[must_use]
pub fn payload_digest(payload: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(payload).into()
}

/// Verifies a DER-encoded signature over the digest of `payload`.
#[must_use]
pub fn verify_payload_signature(
    key: &VerifyingKey,
    payload: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(signature) = Signature::from_der(signature) else {
        return false;
    };
    key.verify(&payload_digest(payload), &signature).is_ok()
}

/// The 4-digit decimal code displayed to the user while an operation is in
/// progress, derived from the last two digest bytes.
///
/// # Errors
///
/// Returns [`TrustError::InvalidInput`] if `digest` is not exactly 32 bytes.
pub fn verification_code(digest: &[u8]) -> TrustResult<String> {
    if digest.len() != DIGEST_LEN {
        return Err(TrustError::invalid_input(
            "digest",
            format!("must be {DIGEST_LEN} bytes, got {}", digest.len()),
        ));
    }
    let tail = u16::from_be_bytes([digest[DIGEST_LEN - 2], digest[DIGEST_LEN - 1]]);
    Ok(format!("{:04}", u32::from(tail) % 10_000))
}
