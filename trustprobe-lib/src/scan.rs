//! Alias scanning: validate a target once per trust anchor.
//!
//! Each alias is checked with a fresh single-entry store, so the result
//! tells which individual anchors a server or certificate file chains to.

use crate::engine::Validator;
use crate::store::AnchorStore;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// What each alias is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// A live TLS endpoint.
    Live { host: String, port: u16 },
    /// A certificate file, with an optional PKCS#12 password.
    File {
        path: PathBuf,
        password: Option<String>,
    },
}

/// Final scan counts. `checked` always equals `valid_aliases.len() + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    /// Aliases that validated, in store order.
    pub valid_aliases: Vec<String>,
    pub checked: usize,
    pub failed: usize,
    /// Set when the scan stopped early.
    pub error: Option<String>,
}

/// Progress after each checked alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub checked: usize,
    pub total: usize,
    pub current_alias: String,
    pub valid_so_far: usize,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "scan aborted by an unexpected failure".to_string()
    }
}

/// Validate `target` against every alias of `anchors` that holds a
/// certificate, in store order, reporting progress after each alias.
///
/// A panic raised by the validation or by the progress sink stops the scan;
/// the counts gathered so far are returned along with the error.
pub fn scan_aliases(
    validator: &Validator,
    target: &ScanTarget,
    anchors: &AnchorStore,
    mut progress: Option<&mut dyn FnMut(ScanProgress)>,
) -> ScanOutcome {
    let aliases: Vec<&str> = anchors
        .entries()
        .iter()
        .filter(|e| e.certificate().is_some())
        .map(|e| e.alias())
        .collect();
    let total = aliases.len();
    let mut outcome = ScanOutcome::default();

    for alias in aliases {
        let validated = panic::catch_unwind(AssertUnwindSafe(|| match target {
            ScanTarget::Live { host, port } => {
                validator.validate_live(host, *port, anchors, Some(alias))
            }
            ScanTarget::File { path, password } => {
                validator.validate_file(path, anchors, Some(alias), password.as_deref())
            }
        }));
        let result = match validated {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(alias, error = %message, "alias scan aborted");
                outcome.error = Some(message);
                return outcome;
            }
        };

        outcome.checked += 1;
        if result.success {
            outcome.valid_aliases.push(alias.to_string());
        } else {
            outcome.failed += 1;
        }
        debug!(alias, success = result.success, "alias checked");

        if let Some(sink) = progress.as_mut() {
            let update = ScanProgress {
                checked: outcome.checked,
                total,
                current_alias: alias.to_string(),
                valid_so_far: outcome.valid_aliases.len(),
            };
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink(update))) {
                let message = panic_message(payload.as_ref());
                warn!(alias, error = %message, "alias scan aborted");
                outcome.error = Some(message);
                return outcome;
            }
        }
    }
    outcome
}

/// Run [`scan_aliases`] on a worker thread.
///
/// Progress updates arrive on the returned receiver, which closes when the
/// scan ends; the join handle yields the final outcome.
pub fn spawn_scan(
    validator: Validator,
    target: ScanTarget,
    anchors: Arc<AnchorStore>,
) -> (Receiver<ScanProgress>, JoinHandle<ScanOutcome>) {
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let mut sink = |update: ScanProgress| {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(update);
        };
        scan_aliases(&validator, &target, &anchors, Some(&mut sink))
    });
    (rx, handle)
}
