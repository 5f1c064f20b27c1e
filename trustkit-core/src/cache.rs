//! Certificate lifecycle: cached current value and single-flight refresh.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::certificate::AuthorityCertificate;
use crate::envelope::{decode_payload, ResponsePayload, ResultCode};
use crate::error::{TrustError, TrustResult};
use crate::messages::CertificatePayload;
use crate::signer::verify_payload_signature;
use crate::transport::AuthorityTransport;

/// Owns the current authority certificate.
///
/// Reads proceed concurrently against the cached value; a refresh is
/// exclusive and single-flight. When N callers observe an expired
/// certificate at once, exactly one fetch RPC is issued and all N observe
/// its result, success or failure alike. A failed refresh leaves the
/// previous certificate untouched.
#[allow(clippy::module_name_repetitions)]
pub struct CertificateCache {
    transport: Arc<dyn AuthorityTransport>,
    state: Mutex<CacheState>,
    refresh_gate: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct CacheState {
    certificate: Option<Arc<AuthorityCertificate>>,
    /// Completed refresh attempts. Waiters that queued behind an attempt
    /// compare this against the value they observed before waiting, so
    /// every coalesced caller sees that attempt's outcome instead of
    /// issuing its own fetch.
    attempt: u64,
    last_error: Option<TrustError>,
}

impl CertificateCache {
    /// Builds an empty cache over a transport. The first [`Self::current`]
    /// call populates it.
    #[must_use]
    pub fn new(transport: Arc<dyn AuthorityTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(CacheState::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the cached certificate, refreshing first if the cache is
    /// empty or the certificate is expired at `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Security`] if a refresh was needed and failed.
    pub async fn current(&self, now: u64) -> TrustResult<Arc<AuthorityCertificate>> {
        if let Some(certificate) = self.fresh_at(now)? {
            return Ok(certificate);
        }
        self.refresh_coalesced(Some(now)).await
    }

    /// Fetches and installs a new authority certificate.
    ///
    /// The fetched certificate is trusted only if the response signature
    /// verifies under the newly received certificate's own public key and
    /// the result code is OK — deliberate trust-on-first-use: the new
    /// certificate vouches for its own transport, not a pre-established
    /// root. Pinning, if any, belongs to the transport implementation.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Security`] if the fetch, parse or
    /// self-verification fails. The previously cached certificate (if any)
    /// stays in place.
    pub async fn refresh(&self) -> TrustResult<Arc<AuthorityCertificate>> {
        self.refresh_coalesced(None).await
    }

    /// The cached certificate if present and not expired at `now`.
    fn fresh_at(&self, now: u64) -> TrustResult<Option<Arc<AuthorityCertificate>>> {
        let state = self.state()?;
        Ok(state
            .certificate
            .as_ref()
            .filter(|certificate| !certificate.is_expired_at(now))
            .cloned())
    }

    /// Refreshes with single-flight coalescing.
    ///
    /// `freshness` carries the caller's `now` when the refresh was triggered
    /// by an expiry check; callers of [`Self::refresh`] pass `None` and
    /// always observe a completed attempt.
    async fn refresh_coalesced(
        &self,
        freshness: Option<u64>,
    ) -> TrustResult<Arc<AuthorityCertificate>> {
        let observed = self.state()?.attempt;
        let _gate = self.refresh_gate.lock().await;

        {
            let state = self.state()?;
            if state.attempt != observed {
                // Another caller completed a refresh while we queued;
                // observe its outcome instead of fetching again.
                return match (&state.last_error, &state.certificate) {
                    (Some(error), _) => Err(error.clone()),
                    (None, Some(certificate)) => Ok(Arc::clone(certificate)),
                    (None, None) => Err(TrustError::security("certificate cache is empty")),
                };
            }
            if let (Some(now), Some(certificate)) = (freshness, &state.certificate) {
                if !certificate.is_expired_at(now) {
                    return Ok(Arc::clone(certificate));
                }
            }
        }

        debug!("fetching authority certificate");
        let outcome = self.fetch_and_verify().await;

        let mut state = self.state()?;
        state.attempt += 1;
        match outcome {
            Ok(certificate) => {
                let certificate = Arc::new(certificate);
                info!(
                    fingerprint = certificate.fingerprint(),
                    not_after = certificate.not_after(),
                    "authority certificate rotated"
                );
                state.certificate = Some(Arc::clone(&certificate));
                state.last_error = None;
                Ok(certificate)
            }
            Err(error) => {
                warn!(%error, "authority certificate refresh failed");
                state.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Issues the fetch RPC and runs the trust-on-first-use checks.
    async fn fetch_and_verify(&self) -> TrustResult<AuthorityCertificate> {
        let response = self
            .transport
            .fetch_certificate()
            .await
            .map_err(|err| TrustError::security(format!("certificate fetch failed: {err}")))?;

        let payload: CertificatePayload = decode_payload(response.payload())
            .map_err(|err| TrustError::security(format!("malformed certificate payload: {err}")))?;
        let candidate = AuthorityCertificate::from_der(&payload.server_certificate)?;

        if !verify_payload_signature(
            candidate.public_key(),
            response.payload(),
            response.signature(),
        ) {
            return Err(TrustError::security(
                "certificate response does not verify under the presented certificate",
            ));
        }
        if payload.result_code() != ResultCode::Ok {
            return Err(TrustError::security(format!(
                "certificate fetch returned result code: {}",
                payload.result_code()
            )));
        }

        Ok(candidate)
    }

    fn state(&self) -> TrustResult<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| TrustError::security("certificate cache lock poisoned"))
    }
}

impl std::fmt::Debug for CertificateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fingerprint = self
            .state
            .lock()
            .ok()
            .and_then(|state| state.certificate.as_ref().map(|cert| cert.fingerprint()));
        f.debug_struct("CertificateCache")
            .field("certificate", &fingerprint)
            .finish_non_exhaustive()
    }
}
