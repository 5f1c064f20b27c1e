//! Client key material and its password-protected store.
//!
//! The client key is an ECDSA P-256 private key. At rest it is sealed with
//! AES-256-GCM under an Argon2id-derived key; in memory the plaintext PKCS#8
//! encoding is zeroized as soon as the key is parsed. Key material is never
//! serialized off-device in any other form.

use std::fmt;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::Argon2;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{TrustError, TrustResult};

/// Salt length for Argon2id key derivation.
const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM.
const NONCE_LEN: usize = 12;

/// The client's private key.
///
/// Owned by the process for the lifetime of the client instance. `Debug`
/// never prints key bytes.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone)]
pub struct KeyMaterial {
    signing_key: SigningKey,
}

impl KeyMaterial {
    /// Generates a fresh P-256 key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Loads a key from a PKCS#8 PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyAccess`] if the PEM does not contain a valid
    /// P-256 private key.
    pub fn from_pkcs8_pem(pem: &str) -> TrustResult<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|err| TrustError::key_access(format!("invalid PKCS#8 PEM: {err}")))?;
        Ok(Self { signing_key })
    }

    /// Loads a key from PKCS#8 DER bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyAccess`] if the bytes are not a valid P-256
    /// private key.
    pub fn from_pkcs8_der(der: &[u8]) -> TrustResult<Self> {
        let signing_key = SigningKey::from_pkcs8_der(der)
            .map_err(|err| TrustError::key_access(format!("invalid PKCS#8 DER: {err}")))?;
        Ok(Self { signing_key })
    }

    /// The public half of the key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    pub(crate) const fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Exports the key as PKCS#8 DER. The returned buffer zeroizes on drop;
    /// the caller is responsible for not copying it elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyAccess`] if DER encoding fails.
    pub fn to_pkcs8_der(&self) -> TrustResult<Zeroizing<Vec<u8>>> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|err| TrustError::key_access(format!("PKCS#8 encoding failed: {err}")))?;
        Ok(Zeroizing::new(der.as_bytes().to_vec()))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Password-protected key store: the PKCS#8 encoding of the client key
/// sealed with AES-256-GCM under an Argon2id-derived key.
///
/// Serializes to JSON with hex-encoded binary fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKeyStore {
    /// AES-256-GCM ciphertext of the PKCS#8 DER key.
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    /// Argon2id salt.
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    /// AES-256-GCM nonce.
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
}

impl EncryptedKeyStore {
    /// Seals key material under a password.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyAccess`] if key derivation or encryption
    /// fails.
    pub fn seal(key: &KeyMaterial, password: &SecretString) -> TrustResult<Self> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut derived = derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        let plaintext = key.to_pkcs8_der()?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|err| TrustError::key_access(format!("sealing failed: {err}")))?;
        derived.zeroize();

        Ok(Self {
            ciphertext,
            salt,
            nonce,
        })
    }

    /// Opens the store with a password.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyAccess`] if the password is wrong or the
    /// store is corrupted.
    pub fn open(&self, password: &SecretString) -> TrustResult<KeyMaterial> {
        let mut derived = derive_key(password, &self.salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| TrustError::key_access("wrong password or corrupted key store"))?;
        derived.zeroize();

        let plaintext = Zeroizing::new(plaintext);
        KeyMaterial::from_pkcs8_der(&plaintext)
    }

    /// Serializes the store to its JSON file format.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> TrustResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| TrustError::serialization(err.to_string()))
    }

    /// Parses a store from its JSON file format.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Serialization`] if the JSON is malformed.
    pub fn from_json(json: &str) -> TrustResult<Self> {
        serde_json::from_str(json).map_err(|err| TrustError::serialization(err.to_string()))
    }
}

fn derive_key(password: &SecretString, salt: &[u8]) -> TrustResult<[u8; 32]> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|err| TrustError::key_access(format!("key derivation failed: {err}")))?;
    Ok(key)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(serde::de::Error::custom)
    }
}
