//! Client assembly: validated builder, shared operation core, facades.

#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::cache::CertificateCache;
use crate::envelope::{encode_payload, ResponsePayload, SignedRequest};
use crate::error::{TrustError, TrustResult};
use crate::key_material::{EncryptedKeyStore, KeyMaterial};
use crate::session::{PollingSession, TypedSession};
use crate::signer::{MessageSigner, DIGEST_LEN};
use crate::transport::{AuthorityTransport, OperationRoute};
use crate::verifier::ResponseVerifier;
use crate::Environment;

mod auth;
pub use auth::{AuthClient, AuthOptions};

mod sign;
pub use sign::SignClient;

enum KeySource {
    Unlocked(KeyMaterial),
    Sealed(EncryptedKeyStore, SecretString),
}

/// Builder for [`TrustClient`].
///
/// `build` validates everything up front: a missing field or a wrong store
/// password fails there, never on first use.
pub struct ClientBuilder {
    environment: Environment,
    access_key_id: Option<Uuid>,
    key_source: Option<KeySource>,
    transport: Option<Arc<dyn AuthorityTransport>>,
}

impl ClientBuilder {
    /// Starts a builder for an authority deployment.
    #[must_use]
    pub const fn new(environment: Environment) -> Self {
        Self {
            environment,
            access_key_id: None,
            key_source: None,
            transport: None,
        }
    }

    /// Sets the access key identifying this integration.
    #[must_use]
    pub const fn with_access_key(mut self, access_key_id: Uuid) -> Self {
        self.access_key_id = Some(access_key_id);
        self
    }

    /// Uses already-unlocked key material.
    #[must_use]
    pub fn with_key_material(mut self, key: KeyMaterial) -> Self {
        self.key_source = Some(KeySource::Unlocked(key));
        self
    }

    /// Uses an encrypted key store; the password is checked during `build`.
    #[must_use]
    pub fn with_encrypted_store(
        mut self,
        store: EncryptedKeyStore,
        password: SecretString,
    ) -> Self {
        self.key_source = Some(KeySource::Sealed(store, password));
        self
    }

    /// Sets the RPC channel to the authority.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn AuthorityTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validates the configuration and assembles the client.
    ///
    /// # Errors
    ///
    /// - [`TrustError::InvalidInput`] if the access key, key material or
    ///   transport is missing.
    /// - [`TrustError::KeyAccess`] if the encrypted store cannot be opened
    ///   with the configured password.
    pub fn build(self) -> TrustResult<TrustClient> {
        let access_key_id = self
            .access_key_id
            .ok_or_else(|| TrustError::invalid_input("access_key_id", "not configured"))?;
        let transport = self
            .transport
            .ok_or_else(|| TrustError::invalid_input("transport", "not configured"))?;
        let key = match self.key_source {
            Some(KeySource::Unlocked(key)) => key,
            Some(KeySource::Sealed(store, password)) => store.open(&password)?,
            None => return Err(TrustError::invalid_input("key_material", "not configured")),
        };

        let cache = Arc::new(CertificateCache::new(Arc::clone(&transport)));
        let core = Arc::new(ClientCore {
            environment: self.environment,
            access_key_id,
            signer: MessageSigner::new(key),
            verifier: ResponseVerifier::new(cache),
            transport,
        });
        Ok(TrustClient { core })
    }
}

/// Shared state behind every facade: one signer, one certificate cache, one
/// verifier, one channel.
struct ClientCore {
    environment: Environment,
    access_key_id: Uuid,
    signer: MessageSigner,
    verifier: ResponseVerifier,
    transport: Arc<dyn AuthorityTransport>,
}

impl ClientCore {
    /// Serializes a payload exactly once and signs those bytes.
    fn signed_request<T: Serialize>(&self, payload: &T) -> TrustResult<SignedRequest> {
        let payload = encode_payload(payload)?;
        let signature = self.signer.sign(&payload)?;
        Ok(SignedRequest {
            access_key_id: self.access_key_id.to_string(),
            signature,
            payload,
        })
    }

    /// The single-shot operation core: sign, route, verify, decode.
    async fn unary<Req, Resp>(&self, route: OperationRoute, payload: &Req) -> TrustResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: ResponsePayload,
    {
        debug!(%route, "issuing signed call");
        let request = self.signed_request(payload)?;
        let response = self.transport.call(route, request).await?;
        let verified = self.verifier.verify(&response).await?;
        verified.decode()
    }

    /// The polling operation core: sign, open the stream, wrap it in a
    /// session.
    async fn polling<Req, Resp>(
        &self,
        route: OperationRoute,
        payload: &Req,
    ) -> TrustResult<TypedSession<Resp>>
    where
        Req: Serialize + Sync,
        Resp: ResponsePayload,
    {
        debug!(%route, "opening polling stream");
        let request = self.signed_request(payload)?;
        let upstream = self.transport.open_stream(route, request).await?;
        Ok(TypedSession::new(PollingSession::new(
            self.verifier.clone(),
            upstream,
        )))
    }
}

/// The assembled trust protocol client.
///
/// Cheap to clone; all clones share one certificate cache and one channel,
/// and may be used concurrently.
#[derive(Clone)]
pub struct TrustClient {
    core: Arc<ClientCore>,
}

impl TrustClient {
    /// The authentication facade.
    #[must_use]
    pub fn auth(&self) -> AuthClient {
        AuthClient::new(Arc::clone(&self.core))
    }

    /// The remote signing facade.
    #[must_use]
    pub fn sign(&self) -> SignClient {
        SignClient::new(Arc::clone(&self.core))
    }

    /// The shared certificate cache.
    #[must_use]
    pub fn certificates(&self) -> &Arc<CertificateCache> {
        self.core.verifier.certificates()
    }

    /// The deployment this client talks to.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.core.environment
    }
}

/// Validates a caller-supplied digest before any network activity.
fn ensure_digest_len(digest: &[u8]) -> TrustResult<()> {
    if digest.len() == DIGEST_LEN {
        Ok(())
    } else {
        Err(TrustError::invalid_input(
            "hash_to_sign",
            format!("must be {DIGEST_LEN} bytes, got {}", digest.len()),
        ))
    }
}
