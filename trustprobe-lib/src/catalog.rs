//! Display-ready listing of a truststore's certificates.

use crate::cert::Certificate;
use crate::store::AnchorStore;
use serde::Serialize;
use ::time::OffsetDateTime;
use x509_parser::prelude::*;

/// Days before expiry at which a certificate counts as expiring soon.
const EXPIRING_SOON_DAYS: i64 = 30;

/// Expiry status of a certificate relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateStatus {
    Valid,
    ExpiringSoon,
    Expired,
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateStatus::Valid => write!(f, "valid"),
            CertificateStatus::ExpiringSoon => write!(f, "expiringSoon"),
            CertificateStatus::Expired => write!(f, "expired"),
        }
    }
}

/// One listed certificate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub alias: String,
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    #[serde(with = "::time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "::time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub status: CertificateStatus,
    pub alt_names: Vec<String>,
    pub fingerprint: String,
}

/// Status of a certificate expiring at `not_after`, seen at `now`.
pub fn status_at(not_after: OffsetDateTime, now: OffsetDateTime) -> CertificateStatus {
    if not_after < now {
        return CertificateStatus::Expired;
    }
    if (not_after - now).whole_days() <= EXPIRING_SOON_DAYS {
        CertificateStatus::ExpiringSoon
    } else {
        CertificateStatus::Valid
    }
}

/// List every entry certificate of the store, soonest expiry first.
pub fn list(store: &AnchorStore) -> Vec<CertificateRecord> {
    list_at(store, OffsetDateTime::now_utc())
}

/// Like [`list`], with an explicit clock.
pub fn list_at(store: &AnchorStore, now: OffsetDateTime) -> Vec<CertificateRecord> {
    let mut records: Vec<CertificateRecord> = store
        .entries()
        .iter()
        .filter_map(|entry| {
            entry
                .certificate()
                .map(|cert| record(entry.alias(), cert, now))
        })
        .collect();
    // Stable: entries expiring together keep store order.
    records.sort_by_key(|r| r.not_after);
    records
}

fn record(alias: &str, cert: &Certificate, now: OffsetDateTime) -> CertificateRecord {
    CertificateRecord {
        alias: alias.to_string(),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: cert.serial_hex().to_string(),
        not_before: cert.not_before(),
        not_after: cert.not_after(),
        status: status_at(cert.not_after(), now),
        alt_names: alt_names(cert),
        fingerprint: cert.fingerprint_sha256(),
    }
}

/// Subject alternative names with type labels. Unreadable extensions yield
/// an empty list.
fn alt_names(cert: &Certificate) -> Vec<String> {
    let Ok(x509) = cert.parsed() else {
        return Vec::new();
    };
    match x509.subject_alternative_name() {
        Ok(Some(san)) => san.value.general_names.iter().map(format_general_name).collect(),
        _ => Vec::new(),
    }
}

fn format_general_name(gn: &GeneralName) -> String {
    match gn {
        GeneralName::DNSName(name) => format!("DNS:{}", name),
        GeneralName::RFC822Name(email) => format!("email:{}", email),
        GeneralName::IPAddress(ip) => format!("IP Address:{}", format_ip_bytes(ip)),
        GeneralName::URI(uri) => format!("URI:{}", uri),
        GeneralName::DirectoryName(dn) => format!("DirName:{}", crate::util::rfc2253(dn)),
        GeneralName::OtherName(oid, _) => format!("othername:{}", oid.to_id_string()),
        other => format!("other:{:?}", other),
    }
}

fn format_ip_bytes(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        std::net::Ipv4Addr::from(octets).to_string()
    } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        std::net::Ipv6Addr::from(octets).to_string()
    } else {
        hex::encode(bytes)
    }
}
