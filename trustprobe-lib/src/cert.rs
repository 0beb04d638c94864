//! Owned X.509 certificates and certificate-stream parsing.
//!
//! `x509-parser` borrows from its input, so [`Certificate`] keeps the DER
//! bytes together with the handful of fields every other module needs and
//! re-parses on demand when a check needs the full structure.

use crate::oid;
use crate::util;
use crate::verify::ChainLink;
use crate::TrustprobeError;
use ::time::OffsetDateTime;
use x509_parser::prelude::*;

/// PEM labels accepted as certificates.
const CERTIFICATE_LABELS: &[&str] = &["CERTIFICATE", "TRUSTED CERTIFICATE", "X509 CERTIFICATE"];

/// A parsed X.509 certificate.
///
/// Two certificates are equal when their DER encodings are identical.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    serial: String,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    key_algorithm: String,
}

impl Certificate {
    /// Parse a single DER-encoded certificate. Trailing bytes are ignored.
    pub fn from_der(input: &[u8]) -> Result<Self, TrustprobeError> {
        let (remaining, x509) = X509Certificate::from_der(input)
            .map_err(|e| TrustprobeError::DerError(format!("{}", e)))?;
        let cert_len = input.len() - remaining.len();
        let der = input.get(..cert_len).unwrap_or(input);
        Ok(Self::from_parsed(&x509, der))
    }

    fn from_parsed(x509: &X509Certificate, der: &[u8]) -> Self {
        Certificate {
            der: der.to_vec(),
            subject: util::rfc2253(x509.subject()),
            issuer: util::rfc2253(x509.issuer()),
            subject_raw: x509.subject().as_raw().to_vec(),
            issuer_raw: x509.issuer().as_raw().to_vec(),
            serial: util::serial_hex(x509.raw_serial()),
            not_before: x509.validity().not_before.to_datetime(),
            not_after: x509.validity().not_after.to_datetime(),
            key_algorithm: oid::key_algorithm_name(
                &x509.public_key().algorithm.algorithm.to_id_string(),
            ),
        }
    }

    /// DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name (RFC 2253).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer distinguished name (RFC 2253).
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub(crate) fn subject_raw(&self) -> &[u8] {
        &self.subject_raw
    }

    pub(crate) fn issuer_raw(&self) -> &[u8] {
        &self.issuer_raw
    }

    /// Serial number as lowercase hex without leading zeros.
    pub fn serial_hex(&self) -> &str {
        &self.serial
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    /// Public key algorithm name: "RSA", "EC", "DSA", "Ed25519", ...
    pub fn key_algorithm(&self) -> &str {
        &self.key_algorithm
    }

    /// Whether subject and issuer names are identical.
    pub fn is_self_issued(&self) -> bool {
        self.subject_raw == self.issuer_raw
    }

    /// SHA-256 fingerprint as colon-separated uppercase hex.
    pub fn fingerprint_sha256(&self) -> String {
        use digest::Digest;
        util::hex_colon_upper(&sha2::Sha256::digest(&self.der))
    }

    /// Re-parse the DER for checks that need the full structure.
    pub(crate) fn parsed(&self) -> Result<X509Certificate<'_>, TrustprobeError> {
        X509Certificate::from_der(&self.der)
            .map(|(_, x509)| x509)
            .map_err(|e| TrustprobeError::DerError(format!("{}", e)))
    }

    /// Display projection used in validation outcomes.
    pub fn chain_link(&self) -> ChainLink {
        ChainLink {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            not_after: self.not_after,
        }
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .finish()
    }
}

/// Check whether the input carries a PEM block anywhere.
pub fn is_pem(input: &[u8]) -> bool {
    input.windows(11).any(|w| w == b"-----BEGIN ")
}

/// Parse every certificate from a PEM or DER stream.
///
/// PEM input may hold several `CERTIFICATE` blocks (other block types are
/// skipped). DER input may be several certificates concatenated back to
/// back. Fails when no certificate can be read.
pub fn parse_certificates(input: &[u8]) -> Result<Vec<Certificate>, TrustprobeError> {
    if input.is_empty() {
        return Err(TrustprobeError::ParseError("empty input".into()));
    }
    let certs = if is_pem(input) {
        parse_pem_stream(input)?
    } else {
        parse_der_stream(input)?
    };
    if certs.is_empty() {
        return Err(TrustprobeError::PemError(
            "no certificates found in PEM input".into(),
        ));
    }
    Ok(certs)
}

fn parse_pem_stream(input: &[u8]) -> Result<Vec<Certificate>, TrustprobeError> {
    let mut certs = Vec::new();
    for pem_result in Pem::iter_from_buffer(input) {
        match pem_result {
            Ok(pem) => {
                if CERTIFICATE_LABELS.contains(&pem.label.as_str()) {
                    certs.push(Certificate::from_der(&pem.contents)?);
                }
            }
            Err(e) => {
                // Trailing garbage after at least one block is tolerated.
                if !certs.is_empty() {
                    break;
                }
                return Err(TrustprobeError::PemError(format!(
                    "failed to parse PEM: {}",
                    e
                )));
            }
        }
    }
    Ok(certs)
}

fn parse_der_stream(input: &[u8]) -> Result<Vec<Certificate>, TrustprobeError> {
    let mut certs = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        match X509Certificate::from_der(rest) {
            Ok((remaining, x509)) => {
                let consumed = rest.len() - remaining.len();
                let der = rest.get(..consumed).unwrap_or(rest);
                certs.push(Certificate::from_parsed(&x509, der));
                rest = remaining;
            }
            Err(e) => {
                if certs.is_empty() {
                    return Err(TrustprobeError::DerError(format!("{}", e)));
                }
                break;
            }
        }
    }
    Ok(certs)
}
