//! Common test utilities shared across integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]
// Test helpers don't need doc comments.
#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use p256::ecdsa::signature::RandomizedSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePrivateKey;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use trustkit_core::{
    encode_payload, AuthorityTransport, CertificatePayload, OperationRoute, ResponseStream,
    ResultCode, SignedRequest, SignedResponse, TransportError,
};

/// Installs the test log subscriber. Safe to call from every test; only the
/// first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

/// Current Unix timestamp in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// An authority identity: a real P-256 key and an rcgen-issued certificate
/// holding its public half.
#[derive(Clone)]
pub struct AuthorityFixture {
    signing_key: SigningKey,
    cert_der: Vec<u8>,
}

impl AuthorityFixture {
    /// An authority whose certificate is valid for one hour.
    pub fn new() -> Self {
        Self::with_not_after(i64::try_from(unix_now()).expect("timestamp") + 3600)
    }

    /// An authority whose certificate expires at the given Unix timestamp.
    pub fn with_not_after(not_after: i64) -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let pem = signing_key
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .expect("pem");
        let key_pair = rcgen::KeyPair::from_pem(&pem).expect("rcgen key");

        let mut params = rcgen::CertificateParams::default();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "trustkit test authority");
        params.not_after =
            time::OffsetDateTime::from_unix_timestamp(not_after).expect("timestamp");
        let cert = params.self_signed(&key_pair).expect("certificate");

        Self {
            signing_key,
            cert_der: cert.der().to_vec(),
        }
    }

    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    /// Signs payload bytes the way the authority does on the wire:
    /// SHA-256 digest, then randomized ECDSA, DER-encoded.
    pub fn sign_payload(&self, payload: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(payload);
        let signature: Signature = self.signing_key.sign_with_rng(&mut OsRng, &digest);
        signature.to_der().as_bytes().to_vec()
    }

    /// Builds a correctly signed response envelope around a typed payload.
    pub fn response<T: Serialize>(
        &self,
        payload: &T,
        result_code: Option<ResultCode>,
    ) -> SignedResponse {
        let payload = encode_payload(payload).expect("encode payload");
        let signature = self.sign_payload(&payload);
        SignedResponse {
            payload,
            signature,
            result_code,
        }
    }

    /// Builds a response whose payload was flipped after signing.
    pub fn tampered_response<T: Serialize>(
        &self,
        payload: &T,
        result_code: Option<ResultCode>,
    ) -> SignedResponse {
        let mut response = self.response(payload, result_code);
        let last = response.payload.len() - 1;
        response.payload[last] ^= 0x01;
        response
    }
}

impl Default for AuthorityFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer handle for a scripted polling stream.
#[derive(Clone, Default)]
pub struct StreamProbe {
    pulls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl StreamProbe {
    /// Number of items pulled from the underlying sequence so far.
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Whether the underlying sequence has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct ReleaseGuard {
    released: Arc<AtomicBool>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// In-memory [`AuthorityTransport`] holding a real authority identity,
/// scripted per-route responses, misbehavior switches and call counters.
pub struct InMemoryAuthority {
    fixture: Mutex<AuthorityFixture>,
    fetch_calls: AtomicUsize,
    fetch_delay: Mutex<Option<Duration>>,
    fetch_code: Mutex<ResultCode>,
    foreign_fetch_signer: AtomicBool,
    calls: Mutex<HashMap<String, usize>>,
    scripted_calls: Mutex<HashMap<String, Vec<SignedResponse>>>,
    scripted_streams: Mutex<HashMap<String, Vec<(Vec<SignedResponse>, StreamProbe)>>>,
}

impl InMemoryAuthority {
    /// An authority with a certificate valid for one hour.
    pub fn new() -> Arc<Self> {
        Self::with_fixture(AuthorityFixture::new())
    }

    /// An authority serving an already-expired certificate.
    pub fn with_expired_certificate() -> Arc<Self> {
        Self::with_fixture(AuthorityFixture::with_not_after(
            i64::try_from(unix_now()).expect("timestamp") - 3600,
        ))
    }

    pub fn with_fixture(fixture: AuthorityFixture) -> Arc<Self> {
        Arc::new(Self {
            fixture: Mutex::new(fixture),
            fetch_calls: AtomicUsize::new(0),
            fetch_delay: Mutex::new(None),
            fetch_code: Mutex::new(ResultCode::Ok),
            foreign_fetch_signer: AtomicBool::new(false),
            calls: Mutex::new(HashMap::new()),
            scripted_calls: Mutex::new(HashMap::new()),
            scripted_streams: Mutex::new(HashMap::new()),
        })
    }

    /// Snapshot of the current authority identity, for building scripted
    /// responses.
    pub fn fixture(&self) -> AuthorityFixture {
        self.fixture.lock().expect("fixture lock").clone()
    }

    /// Replaces the authority identity, simulating certificate rotation.
    pub fn rotate(&self, fixture: AuthorityFixture) {
        *self.fixture.lock().expect("fixture lock") = fixture;
    }

    /// Number of certificate fetch RPCs issued so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of calls issued on a route (unary and stream-open alike).
    pub fn route_calls(&self, route: OperationRoute) -> usize {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .get(&route.to_string())
            .unwrap_or(&0)
    }

    /// Delays every certificate fetch, widening concurrency race windows.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().expect("delay lock") = Some(delay);
    }

    /// Makes certificate fetches report a result code other than OK.
    pub fn set_fetch_result_code(&self, code: ResultCode) {
        *self.fetch_code.lock().expect("code lock") = code;
    }

    /// Makes certificate fetch responses signed by an unrelated key, so the
    /// self-verification check fails.
    pub fn use_foreign_fetch_signer(&self, enabled: bool) {
        self.foreign_fetch_signer.store(enabled, Ordering::SeqCst);
    }

    /// Scripts the next response of a unary route.
    pub fn script_call(&self, route: OperationRoute, response: SignedResponse) {
        self.scripted_calls
            .lock()
            .expect("script lock")
            .entry(route.to_string())
            .or_default()
            .push(response);
    }

    /// Scripts the next stream opened on a route and returns its probe.
    pub fn script_stream(
        &self,
        route: OperationRoute,
        responses: Vec<SignedResponse>,
    ) -> StreamProbe {
        let probe = StreamProbe::default();
        self.scripted_streams
            .lock()
            .expect("script lock")
            .entry(route.to_string())
            .or_default()
            .push((responses, probe.clone()));
        probe
    }

    fn record_call(&self, route: OperationRoute) {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(route.to_string())
            .or_default() += 1;
    }
}

#[async_trait]
impl AuthorityTransport for InMemoryAuthority {
    async fn fetch_certificate(&self) -> Result<SignedResponse, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fixture = self.fixture();
        let payload = CertificatePayload {
            server_certificate: fixture.cert_der().to_vec(),
            result_code: *self.fetch_code.lock().expect("code lock"),
        };
        let bytes = encode_payload(&payload).expect("encode payload");
        let signature = if self.foreign_fetch_signer.load(Ordering::SeqCst) {
            AuthorityFixture::new().sign_payload(&bytes)
        } else {
            fixture.sign_payload(&bytes)
        };
        Ok(SignedResponse {
            payload: bytes,
            signature,
            result_code: None,
        })
    }

    async fn call(
        &self,
        route: OperationRoute,
        _request: SignedRequest,
    ) -> Result<SignedResponse, TransportError> {
        self.record_call(route);
        self.scripted_calls
            .lock()
            .expect("script lock")
            .get_mut(&route.to_string())
            .and_then(|queue| {
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            })
            .ok_or_else(|| TransportError::new(route.to_string(), "no scripted response"))
    }

    async fn open_stream(
        &self,
        route: OperationRoute,
        _request: SignedRequest,
    ) -> Result<ResponseStream, TransportError> {
        self.record_call(route);
        let (responses, probe) = self
            .scripted_streams
            .lock()
            .expect("script lock")
            .get_mut(&route.to_string())
            .and_then(|queue| {
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            })
            .ok_or_else(|| TransportError::new(route.to_string(), "no scripted stream"))?;

        let guard = ReleaseGuard {
            released: probe.released.clone(),
        };
        let pulls = probe.pulls.clone();
        let stream = futures::stream::unfold(
            (responses, 0usize, pulls, guard),
            |(responses, index, pulls, guard)| async move {
                if index >= responses.len() {
                    return None;
                }
                pulls.fetch_add(1, Ordering::SeqCst);
                let item = responses[index].clone();
                Some((Ok(item), (responses, index + 1, pulls, guard)))
            },
        );
        Ok(Box::pin(stream))
    }
}
