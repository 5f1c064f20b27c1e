//! Wire envelopes and result-code classification.
//!
//! Requests travel as `{access_key_id, signature, payload}` and responses as
//! `{payload, signature, result_code?}`. The signature is always computed
//! over the exact serialized payload bytes carried in the envelope, never a
//! re-derived encoding, so the bytes are kept opaque here and decoded into
//! typed payloads only after verification.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{TrustError, TrustResult};

/// Result code reported by the authority.
///
/// The domain is an open enumeration: the authority may introduce new
/// terminal failure codes without a client schema change, so unknown codes
/// are carried through as [`ResultCode::Other`] and classified as generic
/// operation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum ResultCode {
    /// The operation succeeded (or the envelope carried no code).
    Ok,
    /// The operation is still in progress; more envelopes will follow.
    Pending,
    /// Any other code defined by the authority. Always terminal.
    Other(u32),
}

impl ResultCode {
    /// Whether this code ends a polling session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl From<u32> for ResultCode {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Pending,
            other => Self::Other(other),
        }
    }
}

impl From<ResultCode> for u32 {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Ok => 0,
            ResultCode::Pending => 1,
            ResultCode::Other(other) => other,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Pending => f.write_str("pending"),
            Self::Other(code) => write!(f, "code({code})"),
        }
    }
}

/// A signed operation request: `{access_key_id, signature, payload}`.
///
/// `signature` is the client's ECDSA signature over the SHA-256 digest of
/// `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Access key identifying the integration.
    pub access_key_id: String,
    /// DER-encoded ECDSA signature over the payload digest.
    pub signature: Vec<u8>,
    /// Exact serialized payload bytes the signature covers.
    pub payload: Vec<u8>,
}

/// A response envelope: `{payload, signature, result_code?}`.
///
/// Absence of a result code is treated as [`ResultCode::Ok`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedResponse {
    /// Exact serialized payload bytes the signature covers.
    pub payload: Vec<u8>,
    /// DER-encoded ECDSA signature by the authority over the payload digest.
    pub signature: Vec<u8>,
    /// Result code, if the operation reports one.
    #[serde(default)]
    pub result_code: Option<ResultCode>,
}

impl SignedResponse {
    /// The raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The result code, defaulting to [`ResultCode::Ok`] when absent.
    #[must_use]
    pub fn result_code(&self) -> ResultCode {
        self.result_code.unwrap_or(ResultCode::Ok)
    }
}

/// Accessor capability every typed response payload implements.
///
/// Replaces name-keyed field lookup with static dispatch: each payload shape
/// reports its own result code (default OK for shapes that carry none).
pub trait ResponsePayload: DeserializeOwned + Serialize {
    /// Result code carried inside the payload, if any.
    fn result_code(&self) -> ResultCode {
        ResultCode::Ok
    }
}

/// Serializes a payload into the canonical CBOR bytes that get signed.
///
/// The caller signs and transmits exactly these bytes; re-encoding on the
/// other side of a signature is never valid.
///
/// # Errors
///
/// Returns [`TrustError::Serialization`] if the encoder fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> TrustResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(payload, &mut bytes)
        .map_err(|err| TrustError::serialization(err.to_string()))?;
    Ok(bytes)
}

/// Decodes verified payload bytes into a typed payload.
///
/// # Errors
///
/// Returns [`TrustError::Serialization`] if the bytes are not a valid
/// encoding of `T`.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> TrustResult<T> {
    ciborium::de::from_reader(bytes).map_err(|err| TrustError::serialization(err.to_string()))
}
