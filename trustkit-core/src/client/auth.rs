//! The authentication facade.

use std::sync::Arc;

use crate::error::TrustResult;
use crate::messages::{
    AuthStatusRequest, AuthStatusResponse, CancelAuthRequest, CancelAuthResponse,
    InitAuthRequest, InitAuthResponse, KeyEntry,
};
use crate::session::TypedSession;
use crate::transport::OperationRoute;

use super::{ensure_digest_len, ClientCore};

/// Optional flags of an authentication operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthOptions {
    /// Request an identity report with the result.
    pub with_report: bool,
    /// Extract subject attributes into the result certificate.
    pub extract_subject: bool,
    /// Run sanctions screening.
    pub with_sanctions: bool,
}

/// Authenticates subjects against the authority.
///
/// A thin marshaling layer: every method builds one fixed payload shape and
/// hands it to the shared operation core.
pub struct AuthClient {
    core: Arc<ClientCore>,
}

impl AuthClient {
    pub(super) const fn new(core: Arc<ClientCore>) -> Self {
        Self { core }
    }

    /// Initiates an authentication operation and returns its session id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TrustError::InvalidInput`] if `hash_to_sign` is
    /// present and not exactly 32 bytes (checked before any network
    /// activity), or any verification error from the operation core.
    pub async fn init(
        &self,
        key_entry: KeyEntry,
        hash_to_sign: Option<Vec<u8>>,
        options: AuthOptions,
    ) -> TrustResult<InitAuthResponse> {
        if let Some(hash) = &hash_to_sign {
            ensure_digest_len(hash)?;
        }
        let payload = InitAuthRequest {
            key_entry,
            hash_to_sign,
            with_report: options.with_report,
            extract_subject: options.extract_subject,
            with_sanctions: options.with_sanctions,
        };
        self.core.unary(OperationRoute::AuthInit, &payload).await
    }

    /// Polls the status of a previously initiated operation until terminal.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the stream cannot be opened; per-item
    /// failures surface through the returned session.
    pub async fn check(
        &self,
        session_id: impl Into<String>,
    ) -> TrustResult<TypedSession<AuthStatusResponse>> {
        let payload = AuthStatusRequest {
            session_id: session_id.into(),
        };
        self.core.polling(OperationRoute::AuthCheck, &payload).await
    }

    /// Initiates an authentication operation and polls it in one call. The
    /// terminal OK envelope carries the subject certificate.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::init`] for the digest check; stream-open
    /// failures surface here, per-item failures through the session.
    pub async fn auth(
        &self,
        key_entry: KeyEntry,
        hash_to_sign: Option<Vec<u8>>,
        options: AuthOptions,
    ) -> TrustResult<TypedSession<AuthStatusResponse>> {
        if let Some(hash) = &hash_to_sign {
            ensure_digest_len(hash)?;
        }
        let payload = InitAuthRequest {
            key_entry,
            hash_to_sign,
            with_report: options.with_report,
            extract_subject: options.extract_subject,
            with_sanctions: options.with_sanctions,
        };
        self.core.polling(OperationRoute::Auth, &payload).await
    }

    /// Cancels an authentication operation.
    ///
    /// # Errors
    ///
    /// Returns any verification error from the operation core.
    pub async fn cancel(
        &self,
        session_id: impl Into<String>,
    ) -> TrustResult<CancelAuthResponse> {
        let payload = CancelAuthRequest {
            session_id: session_id.into(),
        };
        self.core.unary(OperationRoute::AuthCancel, &payload).await
    }
}
