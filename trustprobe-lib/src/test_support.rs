//! Certificate fixtures for unit tests, generated with `rcgen`.

#![allow(clippy::unwrap_used)]

use crate::cert::Certificate;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};

/// A generated certificate with its key, able to issue further certificates.
pub(crate) struct TestCa {
    pub cert: Certificate,
    pem: String,
    key: KeyPair,
}

fn params(cn: &str, ca: bool) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, cn);
    let now = OffsetDateTime::now_utc();
    params.not_before = now - Duration::days(1);
    params.not_after = now + Duration::days(365);
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    }
    params
}

impl TestCa {
    /// Self-signed CA certificate.
    pub fn root(cn: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let cert = params(cn, true).self_signed(&key).unwrap();
        TestCa {
            cert: Certificate::from_der(cert.der()).unwrap(),
            pem: cert.pem(),
            key,
        }
    }

    fn issuer(&self) -> Issuer<'static, KeyPair> {
        let key = KeyPair::from_pem(&self.key.serialize_pem()).unwrap();
        Issuer::from_ca_cert_pem(&self.pem, key).unwrap()
    }

    fn issue(&self, params: CertificateParams) -> (Certificate, String, KeyPair) {
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.issuer()).unwrap();
        (Certificate::from_der(cert.der()).unwrap(), cert.pem(), key)
    }

    /// CA certificate issued by this CA.
    pub fn intermediate(&self, cn: &str) -> TestCa {
        let (cert, pem, key) = self.issue(params(cn, true));
        TestCa { cert, pem, key }
    }

    /// Certificate without CA rights that is nevertheless used to sign.
    pub fn end_entity_issuer(&self, cn: &str) -> TestCa {
        let (cert, pem, key) = self.issue(params(cn, false));
        TestCa { cert, pem, key }
    }

    /// End-entity server certificate issued by this CA.
    pub fn leaf(&self, cn: &str) -> Certificate {
        let mut params = params(cn, false);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.issue(params).0
    }

    /// End-entity certificate built from caller-supplied parameters.
    pub fn leaf_with(&self, cn: &str, customize: impl FnOnce(&mut CertificateParams)) -> Certificate {
        let mut params = params(cn, false);
        customize(&mut params);
        self.issue(params).0
    }
}
