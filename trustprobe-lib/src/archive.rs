//! Single-file `.tar.gz` extraction for archived truststores.

use crate::TrustprobeError;
use flate2::read::GzDecoder;
use std::io::Read;

const EXACTLY_ONE: &str = "tar.gz must contain exactly one file";

/// Decompress a gzip'd tar archive and return the contents of its only
/// regular file. Directories, links and other non-regular entries are
/// skipped; zero or several regular files is an error.
pub fn extract_single_file(bytes: &[u8]) -> Result<Vec<u8>, TrustprobeError> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut extracted: Option<Vec<u8>> = None;

    let entries = archive
        .entries()
        .map_err(|e| TrustprobeError::Archive(format!("failed to read tar.gz: {}", e)))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| TrustprobeError::Archive(format!("failed to read tar.gz: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if extracted.is_some() {
            return Err(TrustprobeError::Archive(EXACTLY_ONE.into()));
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        extracted = Some(contents);
    }

    extracted.ok_or_else(|| TrustprobeError::Archive(EXACTLY_ONE.into()))
}
