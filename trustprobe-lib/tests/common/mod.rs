//! Shared fixtures for the integration tests: certificates generated with
//! `rcgen`, store containers and scratch files.

#![allow(dead_code)]

use cms::cert::x509::attr::Attribute;
use cms::content_info::ContentInfo;
use der::asn1::{BmpString, OctetString, SetOfVec};
use der::oid::ObjectIdentifier;
use der::{Any, Decode, Encode};
use pkcs12::cert_type::CertBag;
use pkcs12::pfx::{Pfx, Version};
use pkcs12::safe_bag::SafeBag;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use trustprobe_lib::store::jks;
use trustprobe_lib::{AnchorStore, Certificate};

/// A generated certificate with its PEM text and private key.
pub struct Issued {
    pub cert: Certificate,
    pub pem: String,
    pub key: KeyPair,
}

impl Issued {
    fn issuer(&self) -> Issuer<'static, KeyPair> {
        let key = KeyPair::from_pem(&self.key.serialize_pem()).unwrap();
        Issuer::from_ca_cert_pem(&self.pem, key).unwrap()
    }

    fn sign(&self, params: CertificateParams) -> Issued {
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.issuer()).unwrap();
        Issued {
            cert: Certificate::from_der(cert.der()).unwrap(),
            pem: cert.pem(),
            key,
        }
    }

    /// Server certificate for `cn`, valid for the given DNS/IP names.
    pub fn leaf(&self, cn: &str, names: &[&str]) -> Issued {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mut params = CertificateParams::new(names).unwrap();
        stamp(&mut params, cn);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.sign(params)
    }

    /// Intermediate CA under this CA.
    pub fn intermediate(&self, cn: &str) -> Issued {
        let mut params = CertificateParams::default();
        stamp(&mut params, cn);
        make_ca(&mut params);
        self.sign(params)
    }

    pub fn der_key(&self) -> Vec<u8> {
        self.key.serialize_der()
    }
}

fn stamp(params: &mut CertificateParams, cn: &str) {
    params.distinguished_name.push(DnType::CommonName, cn);
    let now = OffsetDateTime::now_utc();
    params.not_before = now - Duration::days(1);
    params.not_after = now + Duration::days(365);
}

fn make_ca(params: &mut CertificateParams) {
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
}

/// Self-signed CA certificate.
pub fn root(cn: &str) -> Issued {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    stamp(&mut params, cn);
    make_ca(&mut params);
    let cert = params.self_signed(&key).unwrap();
    Issued {
        cert: Certificate::from_der(cert.der()).unwrap(),
        pem: cert.pem(),
        key,
    }
}

/// Store holding the given certificates as trusted entries, in order.
pub fn store_of(entries: &[(&str, &Certificate)]) -> AnchorStore {
    let mut store = AnchorStore::new();
    for (alias, cert) in entries {
        store.add_trusted(*alias, (*cert).clone());
    }
    store
}

/// JKS container bytes for `store`.
pub fn jks_bytes(store: &AnchorStore, password: &str) -> Vec<u8> {
    jks::encode(store, password).unwrap()
}

/// PKCS#12 container holding `issued`'s key and certificate.
pub fn p12_bytes(issued: &Issued, password: &str) -> Vec<u8> {
    let cert = p12_keystore::Certificate::from_der(issued.cert.der()).unwrap();
    let chain = p12_keystore::PrivateKeyChain::new(&issued.der_key(), [], vec![cert]);
    let mut keystore = p12_keystore::KeyStore::new();
    keystore.add_entry("server", p12_keystore::KeyStoreEntry::PrivateKeyChain(chain));
    keystore.writer(password).write().unwrap()
}

/// PKCS#12 truststore of trusted-certificate entries only, written by
/// `p12-keystore` (encrypted bags, MAC-protected).
pub fn p12_truststore_bytes(entries: &[(&str, &Certificate)], password: &str) -> Vec<u8> {
    let mut keystore = p12_keystore::KeyStore::new();
    for (alias, cert) in entries {
        let cert = p12_keystore::Certificate::from_der(cert.der()).unwrap();
        keystore.add_entry(alias, p12_keystore::KeyStoreEntry::Certificate(cert));
    }
    keystore.writer(password).write().unwrap()
}

fn any(der: Vec<u8>) -> SetOfVec<Any> {
    SetOfVec::from_iter([Any::from_der(&der).unwrap()]).unwrap()
}

fn data_content(bytes: Vec<u8>) -> ContentInfo {
    ContentInfo {
        content_type: ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1"),
        content: Any::from_der(&OctetString::new(bytes).unwrap().to_der().unwrap()).unwrap(),
    }
}

/// PKCS#12 truststore whose trusted-certificate bags appear exactly in the
/// given order, in one unencrypted safe and without a MAC.
pub fn p12_ordered_truststore_bytes(entries: &[(&str, &Certificate)]) -> Vec<u8> {
    let bags: Vec<SafeBag> = entries
        .iter()
        .map(|(alias, cert)| {
            let mut attributes = SetOfVec::new();
            attributes
                .insert(Attribute {
                    oid: ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.20"),
                    values: any(BmpString::from_utf8(alias).unwrap().to_der().unwrap()),
                })
                .unwrap();
            // Java's trusted-certificate marker: anyExtendedKeyUsage.
            attributes
                .insert(Attribute {
                    oid: ObjectIdentifier::new_unwrap("2.16.840.1.113894.746875.1.1"),
                    values: any(ObjectIdentifier::new_unwrap("2.5.29.37.0").to_der().unwrap()),
                })
                .unwrap();
            let cert_bag = CertBag {
                cert_id: ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.22.1"),
                cert_value: OctetString::new(cert.der().to_vec()).unwrap(),
            };
            SafeBag {
                bag_id: ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.3"),
                bag_value: cert_bag.to_der().unwrap(),
                bag_attributes: Some(attributes),
            }
        })
        .collect();
    let safes = vec![data_content(bags.to_der().unwrap())];
    let pfx = Pfx {
        version: Version::V3,
        auth_safe: data_content(safes.to_der().unwrap()),
        mac_data: None,
    };
    pfx.to_der().unwrap()
}

/// Concatenated PEM text of several certificates.
pub fn pem_bundle(issued: &[&Issued]) -> String {
    issued.iter().map(|i| i.pem.as_str()).collect()
}

pub fn write(dir: &Path, name: &str, bytes: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
