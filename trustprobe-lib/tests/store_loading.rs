#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Loading truststores from PKCS#12, JKS and tar.gz containers.

mod common;

use flate2::write::GzEncoder;
use flate2::Compression;
use trustprobe_lib::*;

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, bytes) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *bytes).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[test]
fn pkcs12_store_with_password() {
    let ca = common::root("p12-ca");
    let server = ca.leaf("p12-server", &["localhost"]);
    let bytes = common::p12_bytes(&server, "secret123");

    let store = load(&bytes, "secret123").unwrap();
    assert_eq!(store.format(), Some(StoreFormat::Pkcs12));
    assert_eq!(store.len(), 1);
    assert_eq!(store.entries()[0].kind(), EntryKind::PrivateKey);
    assert_eq!(store.entries()[0].certificate(), Some(&server.cert));
}

#[test]
fn pkcs12_store_with_wrong_password_names_formats_tried() {
    let server = common::root("p12-only");
    let bytes = common::p12_bytes(&server, "secret123");

    let err = load(&bytes, "wrong").unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Failed to load truststore. Check password and store format (JKS/PKCS12)."));
    assert!(message.contains("Details: "));
}

#[test]
fn pkcs12_truststore_of_trusted_certificates() {
    let a = common::root("anchor-a");
    let b = common::root("anchor-b");
    let bytes = common::p12_truststore_bytes(&[("a", &a.cert), ("b", &b.cert)], "changeit");

    let store = load(&bytes, "changeit").unwrap();
    assert_eq!(store.format(), Some(StoreFormat::Pkcs12));
    assert_eq!(store.aliases().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(store
        .entries()
        .iter()
        .all(|e| e.kind() == EntryKind::TrustedCertificate));
    assert_eq!(store.certificate("b"), Some(&b.cert));
    assert!(load(&bytes, "wrong").is_err());
}

#[test]
fn pkcs12_aliases_keep_container_order() {
    let zeta = common::root("zeta-ca");
    let alpha = common::root("alpha-ca");
    let bytes = common::p12_ordered_truststore_bytes(&[("zeta", &zeta.cert), ("alpha", &alpha.cert)]);

    let store = load(&bytes, "changeit").unwrap();
    assert_eq!(store.format(), Some(StoreFormat::Pkcs12));
    assert_eq!(store.aliases().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    assert_eq!(store.certificate("zeta"), Some(&zeta.cert));

    let records = list(&store);
    assert_eq!(records.len(), 2);
    let single = store.single_alias("alpha").unwrap();
    assert_eq!(single.aliases().collect::<Vec<_>>(), vec!["alpha"]);
}

#[test]
fn jks_store_from_file() {
    let a = common::root("anchor-a");
    let b = common::root("anchor-b");
    let original = common::store_of(&[("a", &a.cert), ("b", &b.cert)]);
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "trust.jks", common::jks_bytes(&original, "changeit"));

    let store = load_file(&path, "changeit").unwrap();
    assert_eq!(store.format(), Some(StoreFormat::Jks));
    assert_eq!(store.aliases().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(store.certificate("b"), Some(&b.cert));
    assert!(store
        .entries()
        .iter()
        .all(|e| e.kind() == EntryKind::TrustedCertificate));
}

#[test]
fn jks_store_with_wrong_password_fails() {
    let a = common::root("anchor-a");
    let bytes = common::jks_bytes(&common::store_of(&[("a", &a.cert)]), "changeit");
    let err = load(&bytes, "letmein").unwrap_err();
    assert!(err.to_string().contains("Keystore was tampered with, or password was incorrect"));
}

#[test]
fn store_inside_tar_gz() {
    let a = common::root("archived");
    let jks = common::jks_bytes(&common::store_of(&[("archived", &a.cert)]), "changeit");
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(dir.path(), "bundle.tgz", tar_gz(&[("trust.jks", &jks)]));

    let store = load_file(&path, "changeit").unwrap();
    assert_eq!(store.certificate("archived"), Some(&a.cert));
}

#[test]
fn archive_with_two_files_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write(
        dir.path(),
        "bundle.tar.gz",
        tar_gz(&[("one.jks", b"1"), ("two.jks", b"2")]),
    );
    let err = load_file(&path, "changeit").unwrap_err();
    assert_eq!(err.to_string(), "tar.gz must contain exactly one file");
}

#[test]
fn garbage_is_unsupported() {
    let err = load(b"definitely not a keystore", "changeit").unwrap_err();
    assert!(matches!(err, TrustprobeError::UnsupportedFormat { .. }));
}

#[test]
fn catalog_lists_store_by_expiry() {
    let a = common::root("anchor-a");
    let store = common::store_of(&[("a", &a.cert)]);
    let records = list(&store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].alias, "a");
    assert_eq!(records[0].subject, "CN=anchor-a");
    assert_eq!(records[0].status, CertificateStatus::Valid);
    assert_eq!(records[0].fingerprint, a.cert.fingerprint_sha256());
}
