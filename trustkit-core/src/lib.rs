//! Client-side trust protocol for a remote signing/authentication authority.
//!
//! Every outbound request is signed with a client-held P-256 key and every
//! inbound response is verified against the authority's certificate, which is
//! itself fetched and rotated through [`CertificateCache`]. Long-running
//! operations (authentication, remote hash signing) are driven through a
//! result-code polling state machine ([`PollingSession`]) until a terminal
//! outcome is reached.
//!
//! The RPC channel itself is out of scope: callers provide an implementation
//! of [`AuthorityTransport`] and the crate never opens sockets on its own.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use strum::{Display, EnumString};

/// Authority deployment the client talks to.
///
/// Purely descriptive: the [`AuthorityTransport`] implementation decides how
/// to dial the named endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Integration test deployment.
    Test,
    /// Demo deployment with synthetic identities.
    Demo,
    /// Production deployment.
    Production,
}

impl Environment {
    /// Hostname of the authority endpoint for this deployment.
    #[must_use]
    pub const fn host(&self) -> &'static str {
        match self {
            Self::Test => "test-api.trustkit.dev",
            Self::Demo => "demo-api.trustkit.dev",
            Self::Production => "api.trustkit.dev",
        }
    }

    /// Port of the authority endpoint. All deployments listen on the same
    /// port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        1443
    }
}

mod error;
pub use error::*;

mod key_material;
pub use key_material::*;

mod certificate;
pub use certificate::*;

mod envelope;
pub use envelope::*;

mod messages;
pub use messages::*;

mod signer;
pub use signer::*;

mod cache;
pub use cache::*;

mod verifier;
pub use verifier::*;

mod session;
pub use session::*;

mod transport;
pub use transport::*;

mod client;
pub use client::*;
