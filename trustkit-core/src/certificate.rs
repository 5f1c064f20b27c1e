//! Authority certificate parsing and subject-attribute decoding.

use std::time::{SystemTime, UNIX_EPOCH};

use p256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::error::{TrustError, TrustResult};

/// Maximum accepted certificate size. 16KB is generous for a single
/// certificate and bounds parser input.
pub const MAX_CERT_SIZE: usize = 16 * 1024;

/// A parsed authority certificate.
///
/// Holds the raw DER bytes alongside the extracted P-256 public key and
/// validity end. Once constructed it is immutable: rotation replaces the
/// whole value, never mutates it in place.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct AuthorityCertificate {
    der: Vec<u8>,
    public_key: VerifyingKey,
    not_after: u64,
}

impl AuthorityCertificate {
    /// Parses a DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Security`] if the certificate exceeds
    /// [`MAX_CERT_SIZE`], is not valid DER, or does not carry a P-256 key.
    pub fn from_der(der: &[u8]) -> TrustResult<Self> {
        if der.len() > MAX_CERT_SIZE {
            return Err(TrustError::security(format!(
                "certificate too large: {} bytes (max {MAX_CERT_SIZE})",
                der.len()
            )));
        }

        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|err| TrustError::security(format!("certificate parse failed: {err}")))?;

        let spki = cert.public_key().subject_public_key.data.to_vec();
        let public_key = VerifyingKey::from_sec1_bytes(&spki).map_err(|err| {
            TrustError::security(format!("certificate key is not a P-256 point: {err}"))
        })?;

        let not_after = u64::try_from(cert.validity().not_after.timestamp())
            .map_err(|_| TrustError::security("certificate notAfter predates the epoch"))?;

        Ok(Self {
            der: der.to_vec(),
            public_key,
            not_after,
        })
    }

    /// The raw DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The certificate's P-256 public key.
    #[must_use]
    pub const fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// End of the validity window, as a Unix timestamp in seconds.
    #[must_use]
    pub const fn not_after(&self) -> u64 {
        self.not_after
    }

    /// Whether the certificate is expired at `now` (Unix seconds).
    #[must_use]
    pub const fn is_expired_at(&self, now: u64) -> bool {
        now > self.not_after
    }

    /// Hex-encoded SHA-256 fingerprint of the DER bytes.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }
}

/// Decodes a subject certificate's distinguished name into display pairs.
///
/// Known attribute OIDs map to their display labels; unknown OIDs carry
/// their dotted form. GeneralizedTime values (dates of birth and expiry)
/// render as timestamps; values that are neither strings nor times are
/// hex-encoded.
///
/// # Errors
///
/// Returns [`TrustError::Security`] if the certificate cannot be parsed.
pub fn subject_entries(der: &[u8]) -> TrustResult<Vec<(String, String)>> {
    if der.len() > MAX_CERT_SIZE {
        return Err(TrustError::security(format!(
            "certificate too large: {} bytes (max {MAX_CERT_SIZE})",
            der.len()
        )));
    }

    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|err| TrustError::security(format!("certificate parse failed: {err}")))?;

    let entries = cert
        .subject()
        .iter_attributes()
        .map(|attr| {
            let oid = attr.attr_type().to_id_string();
            let label = oid_display_name(&oid).map_or(oid, str::to_string);
            let value = attr
                .as_str()
                .map_or_else(|_| decode_binary_value(attr.attr_value()), str::to_string);
            (label, value)
        })
        .collect();

    Ok(entries)
}

/// Renders an attribute value that is not a directory string: times become
/// timestamps, anything else is hex-encoded.
fn decode_binary_value(value: &x509_parser::der_parser::asn1_rs::Any<'_>) -> String {
    if value.tag() == x509_parser::der_parser::asn1_rs::Tag::GeneralizedTime {
        if let Some(formatted) = format_generalized_time(value.data.as_ref()) {
            return formatted;
        }
    }
    hex::encode(value.data.as_ref())
}

/// Formats GeneralizedTime content (`YYYYMMDDHHMMSS[.fff]Z`) as an ISO 8601
/// timestamp.
fn format_generalized_time(content: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(content).ok()?;
    if text.len() < 14 || !text.as_bytes()[..14].iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(format!(
        "{}-{}-{}T{}:{}:{}Z",
        &text[..4],
        &text[4..6],
        &text[6..8],
        &text[8..10],
        &text[10..12],
        &text[12..14],
    ))
}

/// Display labels for the authority's subject attribute OIDs.
fn oid_display_name(oid: &str) -> Option<&'static str> {
    match oid {
        "1.3.6.1.4.1.50715.1.1" => Some("Id"),
        "1.3.6.1.4.1.50715.1.6" => Some("Portrait"),
        "1.3.6.1.4.1.50715.1.16" => Some("DocumentNumber"),
        "1.3.6.1.4.1.50715.1.17" => Some("PlaceOfBirth"),
        "1.3.6.1.4.1.50715.1.26" => Some("DateOfExpire"),
        "1.3.6.1.4.1.50715.1.27" => Some("DocumentClass"),
        "1.3.6.1.4.1.50715.1.28" => Some("DocumentCountry"),
        "1.3.6.1.4.1.50715.1.30" => Some("PersonalNumber"),
        "1.2.840.113549.1.9.1" => Some("EmailAddress"),
        "2.5.4.42" => Some("GivenName"),
        "2.5.4.4" => Some("Surname"),
        "1.3.6.1.5.5.7.9.1" => Some("DateOfBirth"),
        "1.3.6.1.5.5.7.9.3" => Some("Gender"),
        "1.3.6.1.5.5.7.9.4" => Some("CountryOfCitizenship"),
        _ => None,
    }
}

/// Current Unix timestamp in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
