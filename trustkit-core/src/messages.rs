//! The fixed operation payload catalogue.
//!
//! Each request shape is serialized exactly once before signing; each
//! response shape implements [`ResponsePayload`] so its result code is read
//! through static dispatch instead of name-keyed lookup.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::envelope::{ResponsePayload, ResultCode};

/// The kind of key entry an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum KeyEntryKind {
    /// The entry value is an email address.
    Email,
    /// The entry value is a phone number.
    Phone,
}

/// A key entry identifying the subject of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Entry kind.
    pub kind: KeyEntryKind,
    /// Entry value (the address or number itself).
    pub value: String,
}

impl KeyEntry {
    /// Builds an email entry.
    pub fn email(value: impl Into<String>) -> Self {
        Self {
            kind: KeyEntryKind::Email,
            value: value.into(),
        }
    }

    /// Builds a phone entry.
    pub fn phone(value: impl Into<String>) -> Self {
        Self {
            kind: KeyEntryKind::Phone,
            value: value.into(),
        }
    }
}

// ── Authentication ──────────────────────────────────────────────────────────

/// Request payload initiating an authentication operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitAuthRequest {
    /// Subject to authenticate.
    pub key_entry: KeyEntry,
    /// Optional 32-byte digest to co-sign during authentication.
    pub hash_to_sign: Option<Vec<u8>>,
    /// Whether to request an identity report.
    pub with_report: bool,
    /// Whether to extract subject attributes into the response certificate.
    pub extract_subject: bool,
    /// Whether to run sanctions screening.
    pub with_sanctions: bool,
}

/// Response payload of an authentication init call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitAuthResponse {
    /// Identifier of the started operation, used for status polling.
    pub session_id: String,
}

impl ResponsePayload for InitAuthResponse {}

/// Request payload polling the status of an authentication operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatusRequest {
    /// Operation to poll.
    pub session_id: String,
}

/// Status envelope of an authentication operation.
///
/// On the terminal OK envelope `certificate` carries the subject
/// certificate and, when a hash was submitted, `signed_hash` carries the
/// subject's signature over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatusResponse {
    /// Operation this status belongs to.
    pub session_id: String,
    /// Progress of the operation.
    pub result_code: ResultCode,
    /// Subject certificate (X.509 DER), present on the terminal OK envelope.
    pub certificate: Option<Vec<u8>>,
    /// Subject's signature over the submitted hash, if one was submitted.
    pub signed_hash: Option<Vec<u8>>,
    /// Identity report, if one was requested.
    pub report: Option<Vec<u8>>,
}

impl ResponsePayload for AuthStatusResponse {
    fn result_code(&self) -> ResultCode {
        self.result_code
    }
}

/// Request payload cancelling an authentication operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAuthRequest {
    /// Operation to cancel.
    pub session_id: String,
}

/// Acknowledgement of an authentication cancel call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAuthResponse {
    /// Operation that was cancelled.
    pub session_id: String,
}

impl ResponsePayload for CancelAuthResponse {}

// ── Remote signing ──────────────────────────────────────────────────────────

/// Request payload initiating a remote signing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitSignRequest {
    /// Subject whose key will sign.
    pub key_entry: KeyEntry,
}

/// Status envelope of a signing init operation.
///
/// The terminal OK envelope carries the signer's certificate chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitSignResponse {
    /// Identifier of the started operation.
    pub session_id: String,
    /// Progress of the operation.
    pub result_code: ResultCode,
    /// Signer certificate chain (X.509 DER, leaf first), present on the
    /// terminal OK envelope.
    pub certificate_chain: Vec<Vec<u8>>,
}

impl ResponsePayload for InitSignResponse {
    fn result_code(&self) -> ResultCode {
        self.result_code
    }
}

/// Request payload asking the subject to sign a digest remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignHashRequest {
    /// Operation the digest belongs to.
    pub session_id: String,
    /// The 32-byte digest to sign.
    pub hash_to_sign: Vec<u8>,
}

/// Status envelope of a remote hash-signing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignHashResponse {
    /// Operation this status belongs to.
    pub session_id: String,
    /// Progress of the operation.
    pub result_code: ResultCode,
    /// The remote signature over the submitted digest, present on the
    /// terminal OK envelope.
    pub signed_hash: Option<Vec<u8>>,
}

impl ResponsePayload for SignHashResponse {
    fn result_code(&self) -> ResultCode {
        self.result_code
    }
}

/// Request payload cancelling a signing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSignRequest {
    /// Operation to cancel.
    pub session_id: String,
}

/// Acknowledgement of a signing cancel call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSignResponse {
    /// Operation that was cancelled.
    pub session_id: String,
}

impl ResponsePayload for CancelSignResponse {}

// ── Certificate fetch ───────────────────────────────────────────────────────

/// Payload of the certificate fetch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificatePayload {
    /// The authority certificate (X.509 DER).
    pub server_certificate: Vec<u8>,
    /// Outcome of the fetch.
    pub result_code: ResultCode,
}

impl ResponsePayload for CertificatePayload {
    fn result_code(&self) -> ResultCode {
        self.result_code
    }
}
