//! Chain reconstruction and trust evaluation.
//!
//! [`build_chain`] assembles a candidate path from an unordered bag of
//! certificates; [`evaluate`] decides whether a candidate path is trusted by
//! trying each TLS authentication-type hypothesis against a
//! [`TrustPrimitive`]. [`AnchorTrust`] is the default primitive over an
//! [`AnchorStore`](crate::AnchorStore).

mod chain;
mod checks;
mod evaluator;

use crate::PASSWORD_REQUIRED_PREFIX;
use serde::Serialize;
use time::OffsetDateTime;

pub use chain::build_chain;
pub use evaluator::{
    auth_hypotheses, evaluate, evaluate_chain, AnchorTrust, TrustFailure, TrustPrimitive,
};

/// Display projection of one certificate in a validated chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
}

/// Uniform result of a live or file validation.
///
/// Failures are expressed in `message`; only file-mode trust failures carry
/// the candidate chain that was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub message: String,
    pub chain: Vec<ChainLink>,
}

impl ValidationOutcome {
    pub fn success(message: impl Into<String>, chain: Vec<ChainLink>) -> Self {
        ValidationOutcome {
            success: true,
            message: message.into(),
            chain,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::failure_with_chain(message, Vec::new())
    }

    pub fn failure_with_chain(message: impl Into<String>, chain: Vec<ChainLink>) -> Self {
        ValidationOutcome {
            success: false,
            message: message.into(),
            chain,
        }
    }

    /// Whether the failure asks for a PKCS#12 password.
    pub fn is_password_required(&self) -> bool {
        self.message.starts_with(PASSWORD_REQUIRED_PREFIX)
    }
}
