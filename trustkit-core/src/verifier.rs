//! Inbound response verification and result-code classification.

use std::sync::Arc;

use tracing::warn;

use crate::cache::CertificateCache;
use crate::certificate::unix_now;
use crate::envelope::{decode_payload, ResponsePayload, ResultCode, SignedResponse};
use crate::error::{TrustError, TrustResult};
use crate::signer::verify_payload_signature;

/// A response payload that passed signature verification.
///
/// The bytes are decoded into a typed payload only after this point, so no
/// unauthenticated bytes ever reach the decoder.
#[derive(Debug, Clone)]
pub struct VerifiedPayload {
    /// The exact payload bytes the verified signature covers.
    pub payload: Vec<u8>,
    /// The envelope's result code (OK when absent).
    pub result_code: ResultCode,
}

impl VerifiedPayload {
    /// Decodes the verified bytes into a typed payload.
    ///
    /// The payload's embedded result code must agree with the envelope's;
    /// an envelope cannot relabel the outcome its signed payload reports.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Serialization`] if the bytes are not a valid
    /// encoding of `T` or the embedded result code disagrees with the
    /// envelope's.
    pub fn decode<T: ResponsePayload>(&self) -> TrustResult<T> {
        let payload: T = decode_payload(&self.payload)?;
        let embedded = payload.result_code();
        if embedded != self.result_code {
            return Err(TrustError::serialization(format!(
                "payload result code ({embedded}) disagrees with envelope result code ({})",
                self.result_code
            )));
        }
        Ok(payload)
    }
}

/// Verifies response envelopes against the cached authority certificate.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct ResponseVerifier {
    cache: Arc<CertificateCache>,
}

impl ResponseVerifier {
    /// Builds a verifier over a certificate cache.
    #[must_use]
    pub const fn new(cache: Arc<CertificateCache>) -> Self {
        Self { cache }
    }

    /// The certificate cache backing this verifier.
    #[must_use]
    pub const fn certificates(&self) -> &Arc<CertificateCache> {
        &self.cache
    }

    /// Verifies one response envelope.
    ///
    /// Freshness is checked at point of use: an expired certificate is
    /// lazily repaired here, triggering at most one refresh RPC across all
    /// concurrent callers. The signature is checked over the exact payload
    /// bytes before the result code is classified, so a forged envelope can
    /// never smuggle a code through.
    ///
    /// # Errors
    ///
    /// - [`TrustError::Security`] if the certificate had to be refreshed and
    ///   the refresh failed.
    /// - [`TrustError::SignatureVerification`] if the signature does not
    ///   verify. Fatal, never retried.
    /// - [`TrustError::Operation`] if the result code is neither OK nor
    ///   PENDING. A business-level failure, distinct from the two above.
    pub async fn verify(&self, response: &SignedResponse) -> TrustResult<VerifiedPayload> {
        let certificate = self.cache.current(unix_now()).await?;

        if !verify_payload_signature(
            certificate.public_key(),
            response.payload(),
            response.signature(),
        ) {
            warn!(
                certificate = certificate.fingerprint(),
                "response signature verification failed"
            );
            return Err(TrustError::SignatureVerification);
        }

        let result_code = response.result_code();
        match result_code {
            ResultCode::Ok | ResultCode::Pending => Ok(VerifiedPayload {
                payload: response.payload.clone(),
                result_code,
            }),
            ResultCode::Other(_) => Err(TrustError::Operation { code: result_code }),
        }
    }
}
