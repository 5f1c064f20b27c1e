//! The polling state machine over long-running operations.

#![allow(clippy::module_name_repetitions)]

use std::marker::PhantomData;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::envelope::{ResponsePayload, ResultCode};
use crate::error::TrustResult;
use crate::transport::ResponseStream;
use crate::verifier::{ResponseVerifier, VerifiedPayload};

/// State of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No envelope consumed yet.
    Init,
    /// The last envelope carried a PENDING code; more may follow.
    Pending,
    /// A terminal envelope (any code other than PENDING) was consumed.
    Terminal(ResultCode),
}

/// Drives a lazy sequence of response envelopes to its terminal outcome.
///
/// Every envelope passes through the verifier; every successfully verified
/// payload is forwarded in the order received. The session stops consuming
/// at (and including) the first envelope whose result code is not PENDING:
/// that terminal item is forwarded, then the upstream stream is dropped so
/// its network resource is released. A verification failure anywhere
/// terminates the session immediately with that error.
pub struct PollingSession {
    verifier: ResponseVerifier,
    upstream: Option<ResponseStream>,
    state: SessionState,
}

impl PollingSession {
    pub(crate) const fn new(verifier: ResponseVerifier, upstream: ResponseStream) -> Self {
        Self {
            verifier,
            upstream: Some(upstream),
            state: SessionState::Init,
        }
    }

    /// Current state of the session.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session has released its upstream stream (terminal item
    /// consumed, error raised, cancelled, or upstream exhausted).
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.upstream.is_none()
    }

    /// Consumes and verifies the next envelope.
    ///
    /// Returns `Ok(None)` once the session is finished; it never awaits the
    /// upstream again after a terminal item, an error or a cancellation.
    ///
    /// # Errors
    ///
    /// Propagates the first [`crate::TrustError`] encountered (transport,
    /// security, signature or operation failure) and finishes the session.
    pub async fn next(&mut self) -> TrustResult<Option<VerifiedPayload>> {
        let Some(upstream) = self.upstream.as_mut() else {
            return Ok(None);
        };

        let Some(envelope) = upstream.next().await else {
            self.upstream = None;
            return Ok(None);
        };
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(error) => {
                self.upstream = None;
                return Err(error.into());
            }
        };

        match self.verifier.verify(&envelope).await {
            Ok(verified) => {
                debug!(result_code = %verified.result_code, "polling envelope verified");
                if verified.result_code.is_terminal() {
                    self.state = SessionState::Terminal(verified.result_code);
                    self.upstream = None;
                } else {
                    self.state = SessionState::Pending;
                }
                Ok(Some(verified))
            }
            Err(error) => {
                self.upstream = None;
                Err(error)
            }
        }
    }

    /// Cancels the session, dropping the upstream stream immediately.
    ///
    /// No further items are emitted after cancellation; the underlying
    /// network resource is released without waiting for a terminal event.
    pub fn cancel(&mut self) {
        if self.upstream.take().is_some() {
            debug!("polling session cancelled");
        }
    }

    /// Adapts the session into a stream of verified payloads.
    ///
    /// The stream yields every forwarded item, then the first error if one
    /// occurs, then ends. Dropping the stream drops the upstream with it.
    pub fn into_stream(self) -> impl Stream<Item = TrustResult<VerifiedPayload>> + Send {
        futures::stream::unfold(self, |mut session| async move {
            match session.next().await {
                Ok(Some(item)) => Some((Ok(item), session)),
                Ok(None) => None,
                Err(error) => Some((Err(error), session)),
            }
        })
    }
}

/// A [`PollingSession`] whose payloads decode into one typed response shape.
///
/// The facades hand these out; the generic session underneath is the same
/// for every operation.
pub struct TypedSession<T> {
    inner: PollingSession,
    _payload: PhantomData<fn() -> T>,
}

impl<T: ResponsePayload> TypedSession<T> {
    pub(crate) const fn new(inner: PollingSession) -> Self {
        Self {
            inner,
            _payload: PhantomData,
        }
    }

    /// Current state of the session.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Whether the session has released its upstream stream.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Consumes, verifies and decodes the next envelope.
    ///
    /// # Errors
    ///
    /// Propagates verification failures from [`PollingSession::next`] and
    /// [`crate::TrustError::Serialization`] if a verified payload does not
    /// decode as `T`.
    pub async fn next(&mut self) -> TrustResult<Option<T>> {
        match self.inner.next().await? {
            Some(verified) => Ok(Some(verified.decode()?)),
            None => Ok(None),
        }
    }

    /// Cancels the session, dropping the upstream stream immediately.
    pub fn cancel(&mut self) {
        self.inner.cancel();
    }

    /// Adapts the session into a stream of typed payloads.
    pub fn into_stream(self) -> impl Stream<Item = TrustResult<T>> + Send
    where
        T: Send,
    {
        self.inner
            .into_stream()
            .map(|item| item.and_then(|verified| verified.decode()))
    }
}
