//! Java KeyStore (JKS) container codec.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! magic 0xFEEDFEED | version (1 or 2) | entry count
//! entry: tag (1 = private key, 2 = trusted certificate)
//!        alias (u16 length + UTF-8) | creation time (u64 ms)
//!        tag 1: u32 key length + key bytes | u32 chain length | certificates
//!        tag 2: certificate
//! certificate: [v2: u16 length + type string] u32 length + DER
//! trailer: SHA-1(UTF-16BE(password) || "Mighty Aphrodite" || everything above)
//! ```

use super::{AnchorEntry, AnchorStore, StoreFormat};
use crate::cert::Certificate;
use crate::TrustprobeError;
use digest::Digest;
use sha1::Sha1;
use time::OffsetDateTime;

const MAGIC: u32 = 0xFEED_FEED;
const VERSION_1: u32 = 1;
const VERSION_2: u32 = 2;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;
const CERT_TYPE_X509: &str = "X.509";

const TAMPERED: &str = "Keystore was tampered with, or password was incorrect";

/// Big-endian reader over a byte slice.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TrustprobeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| TrustprobeError::Jks("unexpected end of keystore data".into()))?;
        let bytes = self.buf.get(self.pos..end).unwrap_or_default();
        self.pos = end;
        Ok(bytes)
    }

    #[allow(clippy::indexing_slicing)] // take(2) returned exactly two bytes
    fn u16(&mut self) -> Result<u16, TrustprobeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    #[allow(clippy::indexing_slicing)] // take(4) returned exactly four bytes
    fn u32(&mut self) -> Result<u32, TrustprobeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, TrustprobeError> {
        let hi = u64::from(self.u32()?);
        let lo = u64::from(self.u32()?);
        Ok((hi << 32) | lo)
    }

    fn utf(&mut self) -> Result<String, TrustprobeError> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| TrustprobeError::Jks("alias is not valid UTF-8".into()))
    }

    fn blob(&mut self) -> Result<&'a [u8], TrustprobeError> {
        let len = self.u32()? as usize;
        self.take(len)
    }
}

/// Integrity digest over the keystore body.
fn integrity_digest(password: &str, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for unit in password.encode_utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(WHITENER);
    hasher.update(body);
    hasher.finalize().into()
}

fn read_certificate(reader: &mut Reader, version: u32) -> Result<Certificate, TrustprobeError> {
    if version == VERSION_2 {
        let cert_type = reader.utf()?;
        if cert_type != CERT_TYPE_X509 {
            return Err(TrustprobeError::Jks(format!(
                "unsupported certificate type: {}",
                cert_type
            )));
        }
    }
    let der = reader.blob()?;
    Certificate::from_der(der).map_err(|e| TrustprobeError::Jks(e.to_string()))
}

fn created_from_millis(millis: u64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Decode a JKS keystore, checking its integrity digest against `password`.
pub fn decode(bytes: &[u8], password: &str) -> Result<AnchorStore, TrustprobeError> {
    if bytes.len() < DIGEST_LEN {
        return Err(TrustprobeError::Jks("keystore data is too short".into()));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - DIGEST_LEN);

    let mut reader = Reader::new(body);
    if reader.u32()? != MAGIC {
        return Err(TrustprobeError::Jks("invalid keystore format".into()));
    }
    let version = reader.u32()?;
    if version != VERSION_1 && version != VERSION_2 {
        return Err(TrustprobeError::Jks(format!(
            "unsupported keystore version: {}",
            version
        )));
    }

    let count = reader.u32()?;
    let mut store = AnchorStore::with_format(StoreFormat::Jks);
    for _ in 0..count {
        let tag = reader.u32()?;
        let alias = reader.utf()?;
        let created = created_from_millis(reader.u64()?);
        let entry = match tag {
            TAG_PRIVATE_KEY => {
                let key = reader.blob()?.to_vec();
                let chain_len = reader.u32()?;
                let mut chain = Vec::new();
                for _ in 0..chain_len {
                    chain.push(read_certificate(&mut reader, version)?);
                }
                AnchorEntry::private_key(alias, key, chain)
            }
            TAG_TRUSTED_CERT => AnchorEntry::trusted(alias, read_certificate(&mut reader, version)?),
            other => {
                return Err(TrustprobeError::Jks(format!(
                    "unrecognized keystore entry tag: {}",
                    other
                )))
            }
        };
        store.push(match created {
            Some(ts) => entry.with_created(ts),
            None => entry,
        });
    }

    if reader.pos != body.len() {
        return Err(TrustprobeError::Jks(TAMPERED.into()));
    }
    if integrity_digest(password, body).as_slice() != trailer {
        return Err(TrustprobeError::Jks(TAMPERED.into()));
    }
    Ok(store)
}

/// Java modified UTF-8 carries a 16-bit length prefix.
fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<(), TrustprobeError> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| {
        TrustprobeError::Jks(format!(
            "string of {} bytes exceeds the 65535-byte limit",
            bytes.len()
        ))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_certificate(out: &mut Vec<u8>, cert: &Certificate) -> Result<(), TrustprobeError> {
    write_utf(out, CERT_TYPE_X509)?;
    write_blob(out, cert.der());
    Ok(())
}

/// Encode a store as a version 2 JKS keystore protected by `password`.
///
/// Fails when an alias does not fit the format's 65535-byte string limit.
pub fn encode(store: &AnchorStore, password: &str) -> Result<Vec<u8>, TrustprobeError> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&VERSION_2.to_be_bytes());
    let entries: Vec<&AnchorEntry> = store
        .entries()
        .iter()
        .filter(|e| e.key().is_some() || e.certificate().is_some())
        .collect();
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        let millis = entry
            .created()
            .map(|ts| (ts.unix_timestamp_nanos() / 1_000_000).max(0) as u64)
            .unwrap_or(0);
        match entry.key() {
            Some(key) => {
                out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
                write_utf(&mut out, entry.alias())?;
                out.extend_from_slice(&millis.to_be_bytes());
                write_blob(&mut out, key);
                out.extend_from_slice(&(entry.chain().len() as u32).to_be_bytes());
                for cert in entry.chain() {
                    write_certificate(&mut out, cert)?;
                }
            }
            None => {
                let Some(cert) = entry.certificate() else {
                    continue;
                };
                out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
                write_utf(&mut out, entry.alias())?;
                out.extend_from_slice(&millis.to_be_bytes());
                write_certificate(&mut out, cert)?;
            }
        }
    }

    let digest = integrity_digest(password, &out);
    out.extend_from_slice(&digest);
    Ok(out)
}
