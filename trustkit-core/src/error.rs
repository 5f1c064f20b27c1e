//! Error taxonomy for the trust protocol.

#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

use crate::envelope::ResultCode;

/// Result type for trust protocol operations.
pub type TrustResult<T> = Result<T, TrustError>;

/// Errors raised by the trust protocol client.
///
/// The enum is `Clone` so a single coalesced certificate refresh failure can
/// be handed to every waiter of the refresh. Display strings never include
/// key bytes, passwords or payload contents.
#[derive(Debug, Clone, Error)]
pub enum TrustError {
    /// Certificate retrieval or self-verification failed. Fatal for the
    /// operation in progress; no automatic retry.
    #[error("security error: {reason}")]
    Security {
        /// Why the certificate could not be trusted.
        reason: String,
    },

    /// A response's signature does not verify against the authority
    /// certificate. Fatal, never retried: it indicates tampering or a
    /// protocol mismatch, not a transient condition.
    #[error("response signature verification failed")]
    SignatureVerification,

    /// The remote operation reported a non-OK/PENDING result code. A
    /// business-level failure; the caller may retry the whole operation with
    /// new input.
    #[error("operation failed with result code: {code}")]
    Operation {
        /// The result code reported by the authority.
        code: ResultCode,
    },

    /// The private key could not be unlocked or used.
    #[error("key access error: {reason}")]
    KeyAccess {
        /// Why the key is inaccessible.
        reason: String,
    },

    /// A caller-supplied input failed local validation before any network
    /// activity.
    #[error("invalid input `{attribute}`: {reason}")]
    InvalidInput {
        /// Name of the offending input.
        attribute: String,
        /// Why the input is invalid.
        reason: String,
    },

    /// Unexpected failure serializing or deserializing a payload, or a
    /// decoded payload inconsistent with its envelope.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Underlying encoder/decoder message.
        reason: String,
    },

    /// The external RPC layer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl TrustError {
    /// Builds a [`TrustError::Security`] from any displayable reason.
    #[must_use]
    pub fn security(reason: impl Into<String>) -> Self {
        Self::Security {
            reason: reason.into(),
        }
    }

    /// Builds a [`TrustError::KeyAccess`] from any displayable reason.
    #[must_use]
    pub fn key_access(reason: impl Into<String>) -> Self {
        Self::KeyAccess {
            reason: reason.into(),
        }
    }

    /// Builds a [`TrustError::InvalidInput`] for a named attribute.
    #[must_use]
    pub fn invalid_input(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`TrustError::Serialization`] from any displayable reason.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}

/// Failure of the external RPC layer, carrying the route that failed.
///
/// Kept distinct from [`TrustError`]'s protocol taxonomy: a transport failure
/// says nothing about signatures or result codes.
#[derive(Debug, Clone, Error)]
#[error("transport error on `{route}`: {reason}")]
pub struct TransportError {
    /// Route of the failed call (for example `auth/init`).
    pub route: String,
    /// Underlying channel failure.
    pub reason: String,
}

impl TransportError {
    /// Builds a transport error for a route.
    #[must_use]
    pub fn new(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            reason: reason.into(),
        }
    }
}
