//! The remote signing facade.

use std::sync::Arc;

use crate::error::TrustResult;
use crate::messages::{
    CancelSignRequest, CancelSignResponse, InitSignRequest, InitSignResponse, KeyEntry,
    SignHashRequest, SignHashResponse,
};
use crate::session::TypedSession;
use crate::transport::OperationRoute;

use super::{ensure_digest_len, ClientCore};

/// Obtains remote signatures from a subject's key held by the authority.
pub struct SignClient {
    core: Arc<ClientCore>,
}

impl SignClient {
    pub(super) const fn new(core: Arc<ClientCore>) -> Self {
        Self { core }
    }

    /// Initiates a signing operation and polls it until terminal. The
    /// terminal OK envelope carries the signer's certificate chain.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the stream cannot be opened; per-item
    /// failures surface through the returned session.
    pub async fn init(&self, key_entry: KeyEntry) -> TrustResult<TypedSession<InitSignResponse>> {
        let payload = InitSignRequest { key_entry };
        self.core.polling(OperationRoute::SignInit, &payload).await
    }

    /// Submits a 32-byte digest for remote signing and polls until
    /// terminal. The terminal OK envelope carries the remote signature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TrustError::InvalidInput`] if `hash_to_sign` is not
    /// exactly 32 bytes (checked before any network activity); stream-open
    /// failures surface here, per-item failures through the session.
    pub async fn hash(
        &self,
        session_id: impl Into<String>,
        hash_to_sign: Vec<u8>,
    ) -> TrustResult<TypedSession<SignHashResponse>> {
        ensure_digest_len(&hash_to_sign)?;
        let payload = SignHashRequest {
            session_id: session_id.into(),
            hash_to_sign,
        };
        self.core.polling(OperationRoute::SignHash, &payload).await
    }

    /// Cancels a signing operation.
    ///
    /// # Errors
    ///
    /// Returns any verification error from the operation core.
    pub async fn cancel(
        &self,
        session_id: impl Into<String>,
    ) -> TrustResult<CancelSignResponse> {
        let payload = CancelSignRequest {
            session_id: session_id.into(),
        };
        self.core.unary(OperationRoute::SignCancel, &payload).await
    }
}
