//! Live and file validation against an anchor store.
//!
//! Both modes return a [`ValidationOutcome`] instead of an error: every
//! failure is caught at this boundary and turned into a message.

mod file;
mod live;

use crate::store::AnchorStore;
use crate::verify::ValidationOutcome;
use crate::TrustprobeError;
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;

/// Options controlling validation behavior.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Timeout for each TCP connection attempt.
    pub connect_timeout: Duration,
    /// Read/write timeout while the TLS handshake runs.
    pub handshake_timeout: Duration,
    /// Passwords tried, in order, when opening a PKCS#12 or JKS certificate
    /// file without a caller-supplied password.
    pub fallback_passwords: Vec<String>,
    /// Evaluate at a specific Unix timestamp instead of the current time.
    pub at_time: Option<i64>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            connect_timeout: Duration::from_millis(5000),
            handshake_timeout: Duration::from_millis(5000),
            fallback_passwords: vec![String::new(), "changeit".to_string()],
            at_time: None,
        }
    }
}

impl ValidationOptions {
    /// The evaluation time: `at_time` when set, otherwise now.
    pub(crate) fn now(&self) -> OffsetDateTime {
        self.at_time
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
            .unwrap_or_else(OffsetDateTime::now_utc)
    }
}

/// Validation entry point. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidationOptions,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Validator { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Connect to `host:port` and check the server's certificate chain
    /// against `anchors`, or only against the certificate stored under
    /// `alias`.
    pub fn validate_live(
        &self,
        host: &str,
        port: u16,
        anchors: &AnchorStore,
        alias: Option<&str>,
    ) -> ValidationOutcome {
        live::validate(&self.options, host, port, anchors, non_blank(alias))
    }

    /// Check the certificates in the file at `path` against `anchors`, or
    /// only against the certificate stored under `alias`. `password` opens a
    /// PKCS#12 file; without it the fallback passwords are tried.
    pub fn validate_file(
        &self,
        path: &Path,
        anchors: &AnchorStore,
        alias: Option<&str>,
        password: Option<&str>,
    ) -> ValidationOutcome {
        file::validate(&self.options, path, anchors, non_blank(alias), password)
    }
}

fn non_blank(alias: Option<&str>) -> Option<&str> {
    alias.filter(|a| !a.trim().is_empty())
}

/// The trust source for one validation: the whole store, or a fresh
/// single-entry store for `alias`.
pub(crate) fn effective_store<'a>(
    anchors: &'a AnchorStore,
    alias: Option<&str>,
) -> Result<Cow<'a, AnchorStore>, TrustprobeError> {
    match alias {
        Some(alias) => anchors.single_alias(alias).map(Cow::Owned),
        None => Ok(Cow::Borrowed(anchors)),
    }
}

/// Human-readable name of the trust source used.
pub(crate) fn trust_mode(alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("alias={}", alias),
        None => "full truststore".to_string(),
    }
}
