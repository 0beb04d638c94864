//! Centralized OID string constants used throughout trustprobe-lib.
//!
//! Object Identifiers are compared as dotted-decimal strings (via
//! `Oid::to_id_string`) so that the lookups below read as plain `match` arms.

// ── X.509 Distinguished Name attributes (RFC 4519 / X.520) ──────────────

pub const COMMON_NAME: &str = "2.5.4.3";
pub const SURNAME: &str = "2.5.4.4";
pub const SERIAL_NUMBER: &str = "2.5.4.5";
pub const COUNTRY: &str = "2.5.4.6";
pub const LOCALITY: &str = "2.5.4.7";
pub const STATE_OR_PROVINCE: &str = "2.5.4.8";
pub const STREET_ADDRESS: &str = "2.5.4.9";
pub const ORGANIZATION: &str = "2.5.4.10";
pub const ORGANIZATIONAL_UNIT: &str = "2.5.4.11";
pub const TITLE: &str = "2.5.4.12";
pub const POSTAL_CODE: &str = "2.5.4.17";
pub const GIVEN_NAME: &str = "2.5.4.42";
pub const EMAIL_ADDRESS: &str = "1.2.840.113549.1.9.1"; // PKCS#9
pub const DOMAIN_COMPONENT: &str = "0.9.2342.19200300.100.1.25";
pub const USER_ID: &str = "0.9.2342.19200300.100.1.1";

// ── Public key types ─────────────────────────────────────────────────────

pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const RSASSA_PSS: &str = "1.2.840.113549.1.1.10";
pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
pub const DSA: &str = "1.2.840.10040.4.1";
pub const ED25519: &str = "1.3.101.112";
pub const ED448: &str = "1.3.101.113";
pub const X25519: &str = "1.3.101.110";
pub const X448: &str = "1.3.101.111";

/// Map a SubjectPublicKeyInfo algorithm OID to the key algorithm name a
/// TLS trust check reasons about (`RSA`, `EC`, `DSA`, ...).
///
/// Unknown algorithms are returned as their dotted OID.
pub fn key_algorithm_name(oid: &str) -> String {
    match oid {
        RSA_ENCRYPTION => "RSA".into(),
        RSASSA_PSS => "RSASSA-PSS".into(),
        EC_PUBLIC_KEY => "EC".into(),
        DSA => "DSA".into(),
        ED25519 => "Ed25519".into(),
        ED448 => "Ed448".into(),
        X25519 => "X25519".into(),
        X448 => "X448".into(),
        other => other.to_string(),
    }
}

/// Short attribute name used when rendering distinguished names
/// (RFC 2253 keywords where one exists, otherwise the dotted OID).
pub fn attribute_short_name(oid: &str) -> String {
    match oid {
        COMMON_NAME => "CN".into(),
        SURNAME => "SURNAME".into(),
        SERIAL_NUMBER => "SERIALNUMBER".into(),
        COUNTRY => "C".into(),
        LOCALITY => "L".into(),
        STATE_OR_PROVINCE => "ST".into(),
        STREET_ADDRESS => "STREET".into(),
        ORGANIZATION => "O".into(),
        ORGANIZATIONAL_UNIT => "OU".into(),
        TITLE => "T".into(),
        POSTAL_CODE => "POSTALCODE".into(),
        GIVEN_NAME => "GIVENNAME".into(),
        EMAIL_ADDRESS => "EMAILADDRESS".into(),
        DOMAIN_COMPONENT => "DC".into(),
        USER_ID => "UID".into(),
        other => other.to_string(),
    }
}
