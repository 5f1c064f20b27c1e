//! The external RPC seam.
//!
//! The crate never opens a channel itself: callers supply an
//! [`AuthorityTransport`] and the protocol core routes signed envelopes
//! through it. Channel security, deadlines and retry policy all live behind
//! this trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use strum::Display;

use crate::envelope::{SignedRequest, SignedResponse};
use crate::error::TransportError;

/// A lazy sequence of response envelopes from a long-running operation.
///
/// Dropping the stream releases the underlying network resource.
pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<SignedResponse, TransportError>> + Send>>;

/// Route of an operation on the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperationRoute {
    /// Initiate an authentication operation.
    #[strum(serialize = "auth/init")]
    AuthInit,
    /// Poll the status of an authentication operation.
    #[strum(serialize = "auth/check")]
    AuthCheck,
    /// Initiate an authentication operation and poll it in one call.
    #[strum(serialize = "auth/auth")]
    Auth,
    /// Cancel an authentication operation.
    #[strum(serialize = "auth/cancel")]
    AuthCancel,
    /// Initiate a remote signing operation.
    #[strum(serialize = "sign/init")]
    SignInit,
    /// Submit a digest for remote signing.
    #[strum(serialize = "sign/hash")]
    SignHash,
    /// Cancel a remote signing operation.
    #[strum(serialize = "sign/cancel")]
    SignCancel,
}

/// The RPC channel to the authority.
///
/// Implementations own connection management and transport-level deadlines;
/// the protocol core assumes every call eventually completes or fails and
/// imposes no timeout of its own.
#[allow(clippy::module_name_repetitions)]
#[async_trait]
pub trait AuthorityTransport: Send + Sync {
    /// Fetches the authority certificate. The request body is empty by
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the channel fails.
    async fn fetch_certificate(&self) -> Result<SignedResponse, TransportError>;

    /// Issues a single-shot signed call.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the channel fails.
    async fn call(
        &self,
        route: OperationRoute,
        request: SignedRequest,
    ) -> Result<SignedResponse, TransportError>;

    /// Opens a polling stream for a long-running signed call.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the stream cannot be opened.
    async fn open_stream(
        &self,
        route: OperationRoute,
        request: SignedRequest,
    ) -> Result<ResponseStream, TransportError>;
}
