//! Trust evaluation with authentication-type hypotheses.
//!
//! A TLS trust decision depends on the key-exchange authentication type,
//! which an offline check does not know. [`evaluate`] therefore derives a
//! short ordered list of plausible types from the leaf's key algorithm and
//! accepts the chain if any of them is trusted.

use super::checks::{
    check_issuers_are_ca, check_leaf_usage, check_signatures, check_time_validity,
    find_anchoring, Anchoring, PathCert, RequiredUsage,
};
use crate::cert::Certificate;
use crate::store::AnchorStore;
use time::OffsetDateTime;
use tracing::debug;

/// Why a trust primitive refused a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustFailure {
    /// The chain does not lead to a trusted anchor, or a certificate on the
    /// path is unacceptable.
    #[error("{0}")]
    PathRejected(String),

    /// The chain or authentication type was not acceptable input.
    #[error("{0}")]
    InvalidArgument(String),

    /// Anything else. Stops hypothesis evaluation.
    #[error("{0}")]
    Unexpected(String),
}

impl TrustFailure {
    /// Whether the next authentication-type hypothesis should still be tried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrustFailure::PathRejected(_) | TrustFailure::InvalidArgument(_)
        )
    }
}

/// A server-trust decision for a chain under one authentication type.
pub trait TrustPrimitive {
    fn check_server_trusted(&self, chain: &[Certificate], auth_type: &str)
        -> Result<(), TrustFailure>;
}

/// Ordered, de-duplicated authentication-type hypotheses for a leaf key
/// algorithm. Always ends with `UNKNOWN`.
pub fn auth_hypotheses(key_algorithm: &str) -> Vec<String> {
    let upper = key_algorithm.trim().to_uppercase();
    let mut hypotheses: Vec<String> = Vec::new();
    let mut add = |label: &str| {
        if !hypotheses.iter().any(|h| h == label) {
            hypotheses.push(label.to_string());
        }
    };

    if !upper.is_empty() {
        add(&upper);
    }
    match upper.as_str() {
        "EC" | "ECDSA" => {
            add("ECDHE_ECDSA");
            add("ECDSA");
        }
        "RSA" => {
            add("ECDHE_RSA");
            add("RSA");
        }
        "DSA" => {
            add("DHE_DSS");
            add("DSA");
        }
        _ => {}
    }
    add("UNKNOWN");
    hypotheses
}

/// Try every hypothesis for the chain's leaf against `primitive`.
///
/// The first accepted hypothesis wins. Retryable failures are remembered and
/// the next hypothesis is tried; an unexpected failure is returned at once.
/// When every hypothesis is rejected the last failure is returned.
pub fn evaluate<P>(chain: &[Certificate], primitive: &P) -> Result<(), TrustFailure>
where
    P: TrustPrimitive + ?Sized,
{
    let key_algorithm = chain.first().map(Certificate::key_algorithm).unwrap_or("");
    let mut last_failure = None;
    for auth_type in auth_hypotheses(key_algorithm) {
        match primitive.check_server_trusted(chain, &auth_type) {
            Ok(()) => {
                debug!(%auth_type, "chain trusted");
                return Ok(());
            }
            Err(failure) if failure.is_retryable() => {
                debug!(%auth_type, reason = %failure, "hypothesis rejected");
                last_failure = Some(failure);
            }
            Err(failure) => return Err(failure),
        }
    }
    Err(last_failure
        .unwrap_or_else(|| TrustFailure::PathRejected("no authentication type accepted".into())))
}

/// [`evaluate`] with the default [`AnchorTrust`] primitive.
pub fn evaluate_chain(
    chain: &[Certificate],
    anchors: &AnchorStore,
    now: OffsetDateTime,
) -> Result<(), TrustFailure> {
    evaluate(chain, &AnchorTrust::new(anchors, now))
}

/// PKIX-style server trust over the anchors of an [`AnchorStore`].
#[derive(Debug, Clone, Copy)]
pub struct AnchorTrust<'a> {
    anchors: &'a AnchorStore,
    now: OffsetDateTime,
}

impl<'a> AnchorTrust<'a> {
    /// Evaluate at `now` against `anchors`.
    pub fn new(anchors: &'a AnchorStore, now: OffsetDateTime) -> Self {
        AnchorTrust { anchors, now }
    }
}

impl TrustPrimitive for AnchorTrust<'_> {
    fn check_server_trusted(
        &self,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), TrustFailure> {
        let Some(last) = chain.last() else {
            return Err(TrustFailure::InvalidArgument(
                "empty certificate chain".into(),
            ));
        };
        let required = RequiredUsage::for_auth_type(auth_type).ok_or_else(|| {
            TrustFailure::InvalidArgument(format!("unsupported authentication type: {}", auth_type))
        })?;

        let path: Vec<PathCert> = chain
            .iter()
            .map(|cert| cert.parsed().map(|x509| (cert, x509)))
            .collect::<Result<_, _>>()
            .map_err(|e| TrustFailure::Unexpected(e.to_string()))?;

        let anchoring = find_anchoring(&path, self.anchors).ok_or_else(|| {
            TrustFailure::PathRejected(format!(
                "no trust anchor found for issuer {}",
                last.issuer()
            ))
        })?;
        if let Anchoring::InChain(0) = anchoring {
            return Ok(());
        }

        // The part of the path validated here; an anchor inside the chain
        // is only used for its key.
        let depth = anchoring.depth();
        let below_anchor = match anchoring {
            Anchoring::InChain(_) => path.get(..depth),
            Anchoring::IssuedBy(..) => path.get(..=depth),
        }
        .unwrap_or_default();
        let through_anchor = path.get(..=depth).unwrap_or_default();

        let mut errors = Vec::new();
        check_time_validity(below_anchor, self.now.unix_timestamp(), &mut errors);
        check_signatures(through_anchor, &mut errors);
        check_issuers_are_ca(below_anchor, &mut errors);
        if let Some(leaf) = path.first() {
            check_leaf_usage(leaf, required, auth_type, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TrustFailure::PathRejected(errors.join("; ")))
        }
    }
}
