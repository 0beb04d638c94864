//! Offline validation of a certificate file.
//!
//! The file is read as a bag of certificates (PEM/DER stream, or a PKCS#12
//! or JKS container), and every certificate is tried as the leaf of a
//! candidate chain until one is trusted.

use super::{effective_store, trust_mode, ValidationOptions};
use crate::cert::{parse_certificates, Certificate};
use crate::store::{jks, pkcs12, AnchorStore};
use crate::util;
use crate::verify::{build_chain, evaluate_chain, ChainLink, TrustFailure, ValidationOutcome};
use crate::TrustprobeError;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PREFIX: &str = "Certificate validation failed: ";

/// Run a file validation and convert every failure into an outcome.
pub(crate) fn validate(
    options: &ValidationOptions,
    path: &Path,
    anchors: &AnchorStore,
    alias: Option<&str>,
    password: Option<&str>,
) -> ValidationOutcome {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return ValidationOutcome::failure("Certificate file path is required");
    }
    let path = PathBuf::from(raw.trim());

    let outcome = match check_file(options, &path, anchors, alias, password) {
        Ok(outcome) => outcome,
        Err(e) => ValidationOutcome::failure(failure_message(&e)),
    };
    info!(
        path = %path.display(),
        alias = alias.unwrap_or(""),
        success = outcome.success,
        message = %outcome.message,
        "file validation finished"
    );
    outcome
}

fn failure_message(err: &TrustprobeError) -> String {
    match err {
        TrustprobeError::PasswordRequired
        | TrustprobeError::NotFound(_)
        | TrustprobeError::NoCertificatesFound(_) => err.to_string(),
        TrustprobeError::InvalidInput(_) | TrustprobeError::PasswordIncorrect => {
            format!("{}{}", PREFIX, err)
        }
        other => format!("{}unexpected error ({})", PREFIX, other),
    }
}

fn links(chain: &[Certificate]) -> Vec<ChainLink> {
    chain.iter().map(Certificate::chain_link).collect()
}

fn check_file(
    options: &ValidationOptions,
    path: &Path,
    anchors: &AnchorStore,
    alias: Option<&str>,
    password: Option<&str>,
) -> Result<ValidationOutcome, TrustprobeError> {
    let effective = effective_store(anchors, alias)?;
    if !path.exists() {
        return Err(TrustprobeError::NotFound(format!(
            "Certificate file is not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(TrustprobeError::NotFound(format!(
            "Certificate path is not a file: {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    let bag = read_bag(options, &bytes, path, password)?;
    if bag.is_empty() {
        return Err(TrustprobeError::NoCertificatesFound(
            path.display().to_string(),
        ));
    }
    debug!(count = bag.len(), "read certificate bag");

    let now = options.now();
    // Every rejected candidate replaces the previous best attempt.
    let folded = bag
        .iter()
        .try_fold(None::<(Vec<Certificate>, TrustFailure)>, |_best, leaf| {
            let chain = build_chain(leaf, &bag);
            match evaluate_chain(&chain, &effective, now) {
                Ok(()) => ControlFlow::Break(ValidationOutcome::success(
                    format!(
                        "Certificate is trusted using {} (subject={})",
                        trust_mode(alias),
                        leaf.subject()
                    ),
                    links(&chain),
                )),
                Err(failure @ TrustFailure::PathRejected(_)) => {
                    debug!(leaf = %leaf.subject(), reason = %failure, "candidate rejected");
                    ControlFlow::Continue(Some((chain, failure)))
                }
                Err(failure) => ControlFlow::Break(ValidationOutcome::failure_with_chain(
                    format!("{}{}", PREFIX, failure),
                    links(&chain),
                )),
            }
        });

    Ok(match folded {
        ControlFlow::Break(outcome) => outcome,
        ControlFlow::Continue(Some((chain, failure))) => ValidationOutcome::failure_with_chain(
            format!("Certificate is not trusted ({})", failure),
            links(&chain),
        ),
        ControlFlow::Continue(None) => ValidationOutcome::failure_with_chain(
            "Certificate is not trusted: no valid validation attempt",
            links(&bag),
        ),
    })
}

/// Read every certificate from the file by ordered fallback: certificate
/// stream, then PKCS#12, then JKS.
fn read_bag(
    options: &ValidationOptions,
    bytes: &[u8],
    path: &Path,
    password: Option<&str>,
) -> Result<Vec<Certificate>, TrustprobeError> {
    match parse_certificates(bytes) {
        Ok(certs) if !certs.is_empty() => return Ok(certs),
        Ok(_) => {}
        Err(e) => debug!(error = %e, "not a certificate stream"),
    }

    let fallbacks: Vec<&str> = options.fallback_passwords.iter().map(String::as_str).collect();
    let pkcs12_passwords: Vec<&str> = match password {
        Some(pw) => vec![pw],
        None => fallbacks.clone(),
    };

    let mut last_error = None;
    for (slot, pw) in pkcs12_passwords.iter().enumerate() {
        match pkcs12::decode(bytes, pw) {
            Ok(store) => {
                let certs = store.all_certificates();
                if !certs.is_empty() {
                    return Ok(certs);
                }
                // An empty container is not a password problem.
                last_error = None;
                break;
            }
            Err(e) => {
                debug!(slot, error = %e, "PKCS12 attempt failed");
                last_error = Some(e);
            }
        }
    }
    if let Some(e) = &last_error {
        if looks_like_pkcs12(path, e, bytes) {
            return Err(match password {
                None => TrustprobeError::PasswordRequired,
                Some(_) => TrustprobeError::PasswordIncorrect,
            });
        }
    }

    // A supplied password is tried first, then the fallbacks.
    let jks_passwords = password.into_iter().chain(fallbacks);
    for (slot, pw) in jks_passwords.enumerate() {
        match jks::decode(bytes, pw) {
            Ok(store) => return Ok(store.all_certificates()),
            Err(e) => debug!(slot, error = %e, "JKS attempt failed"),
        }
    }
    Ok(Vec::new())
}

/// PKCS#12 decoder errors raised by a wrong password on a well-formed file.
const WRONG_PASSWORD_PHRASES: &[&str] = &[
    "mac tag mismatch",
    "mac verification failed",
    "invalid password",
    "incorrect password",
    "decryption failed",
    "unpad error",
];

/// Whether a failed PKCS#12 parse was most likely a real PKCS#12 file.
fn looks_like_pkcs12(path: &Path, error: &TrustprobeError, bytes: &[u8]) -> bool {
    let name = util::lowercase_file_name(path);
    if name.ends_with(".p12") || name.ends_with(".pfx") {
        return true;
    }
    if let TrustprobeError::Pkcs12(detail) = error {
        let detail = detail.to_lowercase();
        if WRONG_PASSWORD_PHRASES
            .iter()
            .any(|phrase| detail.contains(phrase))
        {
            return true;
        }
    }
    pkcs12::looks_like_pfx(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages() {
        assert_eq!(
            failure_message(&TrustprobeError::PasswordRequired),
            "PKCS12_PASSWORD_REQUIRED: PKCS12 container is detected. Enter password and retry."
        );
        assert_eq!(
            failure_message(&TrustprobeError::PasswordIncorrect),
            "Certificate validation failed: PKCS12 container is detected, but password is incorrect or file is corrupted."
        );
        assert_eq!(
            failure_message(&TrustprobeError::NoCertificatesFound("/tmp/x".into())),
            "No X.509 certificates found in file: /tmp/x"
        );
        assert_eq!(
            failure_message(&TrustprobeError::InvalidInput("Alias not found: a".into())),
            "Certificate validation failed: Alias not found: a"
        );
        assert!(failure_message(&TrustprobeError::Unexpected("x".into()))
            .starts_with("Certificate validation failed: unexpected error ("));
    }

    #[test]
    fn pkcs12_detection_by_name_and_message() {
        let parse_error = TrustprobeError::Pkcs12("bad structure".into());
        assert!(looks_like_pkcs12(Path::new("/a/B.P12"), &parse_error, b""));
        assert!(looks_like_pkcs12(Path::new("cert.pfx"), &parse_error, b""));
        assert!(!looks_like_pkcs12(Path::new("cert.bin"), &parse_error, b"xx"));

        let mac_error = TrustprobeError::Pkcs12("MAC verification failed".into());
        assert!(looks_like_pkcs12(Path::new("cert.bin"), &mac_error, b""));
        let mac_error = TrustprobeError::Pkcs12("MAC tag mismatch".into());
        assert!(looks_like_pkcs12(Path::new("cert.bin"), &mac_error, b""));
        let decrypt_error = TrustprobeError::Pkcs12("PKCS#5 decryption failed".into());
        assert!(looks_like_pkcs12(Path::new("cert.bin"), &decrypt_error, b""));
    }

    #[test]
    fn pkcs12_detection_ignores_loose_words() {
        let bin = Path::new("cert.bin");
        for detail in [
            "unexpected tag in machine field",
            "password field missing",
            "cannot decrypt RSA key",
        ] {
            let error = TrustprobeError::Pkcs12(detail.into());
            assert!(!looks_like_pkcs12(bin, &error, b"xx"), "{}", detail);
        }
        let other_variant = TrustprobeError::ParseError("MAC tag mismatch".into());
        assert!(!looks_like_pkcs12(bin, &other_variant, b"xx"));
    }

    #[test]
    fn blank_path_is_required() {
        let outcome = validate(
            &ValidationOptions::default(),
            Path::new("   "),
            &AnchorStore::new(),
            None,
            None,
        );
        assert_eq!(outcome.message, "Certificate file path is required");
        assert!(outcome.chain.is_empty());
    }

    #[test]
    fn missing_and_directory_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        let outcome = validate(
            &ValidationOptions::default(),
            &missing,
            &AnchorStore::new(),
            None,
            None,
        );
        assert_eq!(
            outcome.message,
            format!("Certificate file is not found: {}", missing.display())
        );

        let outcome = validate(
            &ValidationOptions::default(),
            dir.path(),
            &AnchorStore::new(),
            None,
            None,
        );
        assert_eq!(
            outcome.message,
            format!("Certificate path is not a file: {}", dir.path().display())
        );
    }
}
