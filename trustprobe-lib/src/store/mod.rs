//! Truststore loading and the in-memory anchor collection.
//!
//! [`load`] tries each supported container format in turn (PKCS#12, then
//! JKS) and keeps the first that parses with the given password. Every entry
//! certificate of an [`AnchorStore`] is a trust anchor.

pub mod jks;
pub mod pkcs12;

use crate::archive;
use crate::cert::Certificate;
use crate::util;
use crate::TrustprobeError;
use std::path::Path;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Gzip stream magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Formats named in the aggregated load error.
const FORMATS_TRIED: &str = "JKS/PKCS12";

/// Container format a store was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StoreFormat {
    #[serde(rename = "PKCS12")]
    Pkcs12,
    #[serde(rename = "JKS")]
    Jks,
}

impl std::fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreFormat::Pkcs12 => write!(f, "PKCS12"),
            StoreFormat::Jks => write!(f, "JKS"),
        }
    }
}

/// Kind of a store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A trusted certificate without a key.
    TrustedCertificate,
    /// A private key with its certificate chain. The key bytes stay opaque.
    PrivateKey,
}

/// A named entry of an [`AnchorStore`].
#[derive(Debug, Clone)]
pub struct AnchorEntry {
    alias: String,
    kind: EntryKind,
    chain: Vec<Certificate>,
    key: Option<Vec<u8>>,
    created: Option<OffsetDateTime>,
}

impl AnchorEntry {
    /// A trusted-certificate entry.
    pub fn trusted(alias: impl Into<String>, cert: Certificate) -> Self {
        AnchorEntry {
            alias: alias.into(),
            kind: EntryKind::TrustedCertificate,
            chain: vec![cert],
            key: None,
            created: None,
        }
    }

    /// A key entry: opaque (possibly encrypted) key bytes plus the
    /// certificate chain, entry certificate first.
    pub fn private_key(alias: impl Into<String>, key: Vec<u8>, chain: Vec<Certificate>) -> Self {
        AnchorEntry {
            alias: alias.into(),
            kind: EntryKind::PrivateKey,
            chain,
            key: Some(key),
            created: None,
        }
    }

    /// Set the creation date recorded in the container.
    pub fn with_created(mut self, created: OffsetDateTime) -> Self {
        self.created = Some(created);
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The entry certificate, if the entry has one.
    pub fn certificate(&self) -> Option<&Certificate> {
        self.chain.first()
    }

    /// Every certificate of the entry, entry certificate first.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn created(&self) -> Option<OffsetDateTime> {
        self.created
    }
}

/// An ordered collection of named trust anchors.
///
/// Enumeration order is the container's order, or insertion order for a
/// store built in memory.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
    entries: Vec<AnchorEntry>,
    format: Option<StoreFormat>,
}

impl AnchorStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_format(format: StoreFormat) -> Self {
        AnchorStore {
            entries: Vec::new(),
            format: Some(format),
        }
    }

    /// Add an entry. An existing entry with the same alias is replaced in
    /// place, keeping its position.
    pub fn push(&mut self, entry: AnchorEntry) {
        match self.entries.iter_mut().find(|e| e.alias == entry.alias) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Add a trusted-certificate entry.
    pub fn add_trusted(&mut self, alias: impl Into<String>, cert: Certificate) {
        self.push(AnchorEntry::trusted(alias, cert));
    }

    pub fn entries(&self) -> &[AnchorEntry] {
        &self.entries
    }

    /// Aliases in enumeration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.alias.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Format the store was loaded from; `None` for in-memory stores.
    pub fn format(&self) -> Option<StoreFormat> {
        self.format
    }

    pub fn get(&self, alias: &str) -> Option<&AnchorEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    /// The entry certificate stored under `alias`.
    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        self.get(alias).and_then(AnchorEntry::certificate)
    }

    /// Every trust anchor, in enumeration order.
    pub fn anchors(&self) -> impl Iterator<Item = &Certificate> {
        self.entries.iter().filter_map(AnchorEntry::certificate)
    }

    /// Every certificate of every entry, including key-entry chains.
    pub fn all_certificates(&self) -> Vec<Certificate> {
        self.entries
            .iter()
            .flat_map(|e| e.chain.iter().cloned())
            .collect()
    }

    /// Whether `cert` is one of the trust anchors (DER equality).
    pub fn contains_certificate(&self, cert: &Certificate) -> bool {
        self.anchors().any(|a| a == cert)
    }

    /// Trust anchors whose raw DER subject equals `subject_raw`.
    pub fn find_by_subject_raw<'a, 'b>(
        &'a self,
        subject_raw: &'b [u8],
    ) -> impl Iterator<Item = &'a Certificate> + 'b
    where
        'a: 'b,
    {
        self.anchors().filter(move |a| a.subject_raw() == subject_raw)
    }

    /// A fresh store holding only the certificate stored under `alias`.
    pub fn single_alias(&self, alias: &str) -> Result<AnchorStore, TrustprobeError> {
        let entry = self
            .get(alias)
            .ok_or_else(|| TrustprobeError::InvalidInput(format!("Alias not found: {}", alias)))?;
        let cert = entry.certificate().ok_or_else(|| {
            TrustprobeError::InvalidInput(format!("No certificate found for alias: {}", alias))
        })?;
        let mut single = AnchorStore::new();
        single.add_trusted(alias, cert.clone());
        Ok(single)
    }
}

/// Load a truststore from raw container bytes.
///
/// Tries PKCS#12 then JKS with `password`. The first format that parses
/// wins; when none does, the error names the formats tried and the last
/// underlying reason.
pub fn load(bytes: &[u8], password: &str) -> Result<AnchorStore, TrustprobeError> {
    let attempts: [(StoreFormat, fn(&[u8], &str) -> Result<AnchorStore, TrustprobeError>); 2] = [
        (StoreFormat::Pkcs12, pkcs12::decode),
        (StoreFormat::Jks, jks::decode),
    ];

    let mut last_error: Option<TrustprobeError> = None;
    for (format, decode) in attempts {
        match decode(bytes, password) {
            Ok(store) => {
                info!(%format, entries = store.len(), "loaded truststore");
                return Ok(store);
            }
            Err(e) => {
                debug!(%format, error = %e, "truststore format did not parse");
                last_error = Some(e);
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown reason".to_string());
    Err(TrustprobeError::UnsupportedFormat {
        tried: FORMATS_TRIED.to_string(),
        reason,
    })
}

/// Load a truststore from a file.
///
/// A `.tar.gz`/`.tgz` file, or any gzip stream, is treated as an archive
/// holding exactly one store file.
pub fn load_file(path: &Path, password: &str) -> Result<AnchorStore, TrustprobeError> {
    let bytes = std::fs::read(path)?;
    let name = util::lowercase_file_name(path);
    let bytes = if name.ends_with(".tar.gz") || name.ends_with(".tgz") || bytes.starts_with(&GZIP_MAGIC)
    {
        debug!(path = %path.display(), "extracting truststore from archive");
        archive::extract_single_file(&bytes)?
    } else {
        bytes
    };
    load(&bytes, password)
}
