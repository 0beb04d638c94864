//! Candidate chain reconstruction from an unordered certificate bag.
//!
//! Issuers are matched by raw DER name equality only. The walk is greedy
//! and never backtracks: the first pool certificate whose subject matches
//! the current issuer is taken.

use crate::cert::Certificate;
use tracing::debug;

/// Build a candidate chain starting at `leaf`, drawing issuers from `pool`.
///
/// Stops when no issuer is found, when the issuer is already in the chain,
/// or right after appending a self-issued certificate. The result always
/// starts with `leaf`.
pub fn build_chain(leaf: &Certificate, pool: &[Certificate]) -> Vec<Certificate> {
    let mut chain = vec![leaf.clone()];
    let mut current = leaf;

    while let Some(issuer) = find_issuer(current, pool) {
        if chain.contains(issuer) {
            break;
        }
        chain.push(issuer.clone());
        if issuer.is_self_issued() {
            break;
        }
        current = issuer;
    }

    debug!(
        leaf = %leaf.subject(),
        length = chain.len(),
        "built candidate chain"
    );
    chain
}

/// First pool certificate, other than `cert` itself, whose subject is
/// `cert`'s issuer.
fn find_issuer<'a>(cert: &Certificate, pool: &'a [Certificate]) -> Option<&'a Certificate> {
    pool.iter()
        .filter(|candidate| *candidate != cert)
        .find(|candidate| candidate.subject_raw() == cert.issuer_raw())
}
