//! trustprobe-lib: Library for checking TLS endpoints and certificate files
//! against a truststore.
//!
//! Loads PKCS#12 and JKS truststores, lists their certificates, validates a
//! live TLS handshake or an offline certificate file against the whole store
//! or a single alias, and scans a store alias by alias to find which anchors
//! a peer certificate matches.

mod archive;
mod catalog;
mod cert;
mod display;
pub mod engine;
mod oid;
mod scan;
pub mod store;
#[cfg(test)]
mod test_support;
mod util;
pub mod verify;

pub use archive::extract_single_file;
pub use catalog::{list, list_at, status_at, CertificateRecord, CertificateStatus};
pub use cert::{is_pem, parse_certificates, Certificate};
pub use display::{display_outcome, display_records, display_scan};
pub use engine::{ValidationOptions, Validator};
pub use scan::{scan_aliases, spawn_scan, ScanOutcome, ScanProgress, ScanTarget};
pub use store::{load, load_file, AnchorEntry, AnchorStore, EntryKind, StoreFormat};
pub use verify::{
    auth_hypotheses, build_chain, evaluate, evaluate_chain, AnchorTrust, ChainLink, TrustFailure,
    TrustPrimitive, ValidationOutcome,
};

/// Prefix of the outcome message signalling that a PKCS#12 certificate file
/// needs a password before it can be read.
pub const PASSWORD_REQUIRED_PREFIX: &str = "PKCS12_PASSWORD_REQUIRED:";

/// Errors returned by trustprobe-lib.
#[derive(Debug, thiserror::Error)]
pub enum TrustprobeError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to parse certificate: {0}")]
    ParseError(String),

    #[error("Invalid PEM format: {0}")]
    PemError(String),

    #[error("Invalid DER format: {0}")]
    DerError(String),

    #[error("Failed to load truststore. Check password and store format ({tried}). Details: {reason}")]
    UnsupportedFormat { tried: String, reason: String },

    #[error("JKS keystore error: {0}")]
    Jks(String),

    #[error("PKCS12 keystore error: {0}")]
    Pkcs12(String),

    #[error("PKCS12_PASSWORD_REQUIRED: PKCS12 container is detected. Enter password and retry.")]
    PasswordRequired,

    #[error("PKCS12 container is detected, but password is incorrect or file is corrupted.")]
    PasswordIncorrect,

    #[error("No X.509 certificates found in file: {0}")]
    NoCertificatesFound(String),

    #[error("{0}")]
    Archive(String),

    #[error("host is unreachable or DNS name is invalid ({0})")]
    UnknownHost(String),

    #[error("unable to reach {host}:{port} (connection refused/unreachable)")]
    Unreachable { host: String, port: u16 },

    #[error("network timeout while connecting or during TLS handshake to {host}:{port}")]
    Timeout { host: String, port: u16 },

    #[error("{0}")]
    TrustRejected(String),

    #[error("{0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unexpected(String),
}
