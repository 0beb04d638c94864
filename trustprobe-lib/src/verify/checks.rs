//! Individual path-validation checks used by the anchor trust primitive.
//!
//! Each check appends human-readable failures to `errors` rather than
//! stopping at the first problem, so a rejection reports everything wrong
//! with the path at once.

use crate::cert::Certificate;
use crate::store::AnchorStore;
use x509_parser::prelude::*;

/// A certificate of the candidate path together with its parsed form.
pub(crate) type PathCert<'a> = (&'a Certificate, X509Certificate<'a>);

/// Where the candidate path meets the anchor store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Anchoring {
    /// `chain[depth]` is itself one of the anchors.
    InChain(usize),
    /// `chain[depth]` is signed by an anchor outside the chain.
    IssuedBy(usize),
}

impl Anchoring {
    pub(crate) fn depth(&self) -> usize {
        match self {
            Anchoring::InChain(depth) | Anchoring::IssuedBy(depth) => *depth,
        }
    }
}

/// Find the first position, walking up from the leaf, anchored by `anchors`.
pub(crate) fn find_anchoring(path: &[PathCert], anchors: &AnchorStore) -> Option<Anchoring> {
    for (depth, (cert, x509)) in path.iter().enumerate() {
        if anchors.contains_certificate(cert) {
            return Some(Anchoring::InChain(depth));
        }
        for anchor in anchors.find_by_subject_raw(cert.issuer_raw()) {
            let Ok(anchor_x509) = anchor.parsed() else {
                continue;
            };
            if x509.verify_signature(Some(anchor_x509.public_key())).is_ok() {
                return Some(Anchoring::IssuedBy(depth));
            }
        }
    }
    None
}

/// Check validity dates for every certificate of `path`.
pub(crate) fn check_time_validity(path: &[PathCert], now_ts: i64, errors: &mut Vec<String>) {
    for (i, (cert, x509)) in path.iter().enumerate() {
        if now_ts < x509.validity().not_before.timestamp() {
            errors.push(format!(
                "certificate at depth {} ({}) is not yet valid",
                i,
                cert.subject()
            ));
        }
        if now_ts > x509.validity().not_after.timestamp() {
            errors.push(format!(
                "certificate at depth {} ({}) has expired",
                i,
                cert.subject()
            ));
        }
    }
}

/// Verify signatures along `path` (each certificate signed by the next).
pub(crate) fn check_signatures(path: &[PathCert], errors: &mut Vec<String>) {
    for (i, (child, parent)) in path.iter().zip(path.iter().skip(1)).enumerate() {
        let ((child_cert, child_x509), (parent_cert, parent_x509)) = (child, parent);
        if let Err(e) = child_x509.verify_signature(Some(parent_x509.public_key())) {
            errors.push(format!(
                "signature verification failed at depth {} ({} -> {}): {}",
                i,
                child_cert.subject(),
                parent_cert.subject(),
                e
            ));
        }
    }
}

/// Every certificate of `path` except the leaf acts as an issuer and must
/// be a CA. Version 3 certificates without BasicConstraints are rejected.
pub(crate) fn check_issuers_are_ca(path: &[PathCert], errors: &mut Vec<String>) {
    for (i, (cert, x509)) in path.iter().enumerate().skip(1) {
        let is_ca = match x509.basic_constraints().ok().flatten() {
            Some(bc) => bc.value.ca,
            // v1/v2 certificates predate extensions.
            None => x509.version().0 < 2,
        };
        if !is_ca {
            errors.push(format!(
                "certificate at depth {} ({}) is not a CA but is used as issuer",
                i,
                cert.subject()
            ));
        }
    }
}

/// Key usage a TLS authentication type requires of the server certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequiredUsage {
    KeyEncipherment,
    KeyAgreement,
    DigitalSignature,
}

impl RequiredUsage {
    /// Map an authentication-type label; `None` for unknown labels.
    pub(crate) fn for_auth_type(auth_type: &str) -> Option<Self> {
        match auth_type {
            "RSA" => Some(RequiredUsage::KeyEncipherment),
            "ECDSA" | "DSA" | "UNKNOWN" => Some(RequiredUsage::DigitalSignature),
            a if a.starts_with("ECDHE_") || a.starts_with("DHE_") => {
                Some(RequiredUsage::DigitalSignature)
            }
            a if a.starts_with("ECDH_") || a.starts_with("DH_") => {
                Some(RequiredUsage::KeyAgreement)
            }
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            RequiredUsage::KeyEncipherment => "keyEncipherment",
            RequiredUsage::KeyAgreement => "keyAgreement",
            RequiredUsage::DigitalSignature => "digitalSignature",
        }
    }
}

/// Check KeyUsage and ExtendedKeyUsage of the leaf for a TLS server role.
/// Absent extensions impose no restriction.
pub(crate) fn check_leaf_usage(
    leaf: &PathCert,
    required: RequiredUsage,
    auth_type: &str,
    errors: &mut Vec<String>,
) {
    let (cert, x509) = leaf;
    if let Ok(Some(ku)) = x509.key_usage() {
        let allowed = match required {
            RequiredUsage::KeyEncipherment => ku.value.key_encipherment(),
            RequiredUsage::KeyAgreement => ku.value.key_agreement(),
            RequiredUsage::DigitalSignature => ku.value.digital_signature(),
        };
        if !allowed {
            errors.push(format!(
                "leaf certificate ({}) key usage does not permit {} for auth type {}",
                cert.subject(),
                required.name(),
                auth_type
            ));
        }
    }
    if let Ok(Some(eku)) = x509.extended_key_usage() {
        if !eku.value.any && !eku.value.server_auth {
            errors.push(format!(
                "leaf certificate ({}) extended key usage does not permit serverAuth",
                cert.subject()
            ));
        }
    }
}
