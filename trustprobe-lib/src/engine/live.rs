//! Live TLS handshake validation.
//!
//! The rustls client uses a custom certificate verifier that consults only
//! the effective anchor store through the trust evaluator. No system roots
//! are loaded and the server name is not checked against the certificate.

use super::{effective_store, trust_mode, ValidationOptions};
use crate::cert::Certificate;
use crate::store::AnchorStore;
use crate::verify::{evaluate_chain, ChainLink, ValidationOutcome};
use crate::TrustprobeError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, ClientConnection, DigitallySignedStruct, OtherError};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};

const PREFIX: &str = "TLS validation failed: ";

/// Run a live validation and convert every failure into an outcome.
pub(crate) fn validate(
    options: &ValidationOptions,
    host: &str,
    port: u16,
    anchors: &AnchorStore,
    alias: Option<&str>,
) -> ValidationOutcome {
    let outcome = match handshake(options, host, port, anchors, alias) {
        Ok(chain) => ValidationOutcome::success(
            format!("TLS validation succeeded using {}", trust_mode(alias)),
            chain,
        ),
        Err(e) => ValidationOutcome::failure(failure_message(&e)),
    };
    info!(
        host,
        port,
        alias = alias.unwrap_or(""),
        success = outcome.success,
        message = %outcome.message,
        "live validation finished"
    );
    outcome
}

fn failure_message(err: &TrustprobeError) -> String {
    match err {
        TrustprobeError::UnknownHost(_)
        | TrustprobeError::Unreachable { .. }
        | TrustprobeError::Timeout { .. }
        | TrustprobeError::InvalidInput(_)
        | TrustprobeError::NotFound(_) => format!("{}{}", PREFIX, err),
        TrustprobeError::TrustRejected(reason) => format!(
            "{}connected to server, but certificate validation failed ({})",
            PREFIX, reason
        ),
        TrustprobeError::Tls(reason) => format!(
            "{}connected to server, but TLS negotiation failed ({})",
            PREFIX, reason
        ),
        other => format!("{}unexpected error ({})", PREFIX, other),
    }
}

fn handshake(
    options: &ValidationOptions,
    host: &str,
    port: u16,
    anchors: &AnchorStore,
    alias: Option<&str>,
) -> Result<Vec<ChainLink>, TrustprobeError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(TrustprobeError::InvalidInput("host must not be empty".into()));
    }
    if port == 0 {
        return Err(TrustprobeError::InvalidInput(
            "port must be between 1 and 65535".into(),
        ));
    }
    if options.connect_timeout.is_zero() || options.handshake_timeout.is_zero() {
        return Err(TrustprobeError::InvalidInput(
            "timeouts must be greater than zero".into(),
        ));
    }
    let effective = effective_store(anchors, alias)?.into_owned();

    let mut sock = connect(options, host, port)?;
    sock.set_read_timeout(Some(options.handshake_timeout))?;
    sock.set_write_timeout(Some(options.handshake_timeout))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = AnchorVerifier {
        anchors: effective,
        at_time: options.at_time,
        provider: provider.clone(),
    };
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TrustprobeError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    let server_name = match ServerName::try_from(host.to_string()) {
        Ok(name) => name,
        // Not a valid DNS name: fall back to the peer address (no SNI).
        Err(_) => ServerName::IpAddress(sock.peer_addr()?.ip().into()),
    };
    let mut conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| TrustprobeError::Tls(e.to_string()))?;

    while conn.is_handshaking() {
        match conn.complete_io(&mut sock) {
            Ok((0, 0)) if conn.is_handshaking() => {
                return Err(TrustprobeError::Tls(
                    "connection closed during handshake".into(),
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(classify_handshake_error(e, host, port)),
        }
    }

    let chain: Vec<ChainLink> = conn
        .peer_certificates()
        .unwrap_or_default()
        .iter()
        .filter_map(|der| Certificate::from_der(der.as_ref()).ok())
        .map(|cert| cert.chain_link())
        .collect();

    conn.send_close_notify();
    let _ = conn.complete_io(&mut sock);
    Ok(chain)
}

/// Resolve `host` and connect to each address in turn.
fn connect(options: &ValidationOptions, host: &str, port: u16) -> Result<TcpStream, TrustprobeError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| TrustprobeError::UnknownHost(host.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(TrustprobeError::UnknownHost(host.to_string()));
    }

    let mut last_error = None;
    for addr in &addrs {
        debug!(%addr, "connecting");
        match TcpStream::connect_timeout(addr, options.connect_timeout) {
            Ok(sock) => return Ok(sock),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) if is_timeout(&e) => TrustprobeError::Timeout {
            host: host.to_string(),
            port,
        },
        _ => TrustprobeError::Unreachable {
            host: host.to_string(),
            port,
        },
    })
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Map an I/O error raised while handshaking.
fn classify_handshake_error(e: io::Error, host: &str, port: u16) -> TrustprobeError {
    if is_timeout(&e) {
        return TrustprobeError::Timeout {
            host: host.to_string(),
            port,
        };
    }
    match e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(rustls::Error::InvalidCertificate(CertificateError::Other(OtherError(reason)))) => {
            TrustprobeError::TrustRejected(reason.to_string())
        }
        Some(rustls::Error::InvalidCertificate(reason)) => {
            TrustprobeError::TrustRejected(format!("{:?}", reason))
        }
        Some(other) => TrustprobeError::Tls(other.to_string()),
        None => TrustprobeError::Tls(e.to_string()),
    }
}

/// Server certificate verifier backed by an anchor store.
#[derive(Debug)]
struct AnchorVerifier {
    anchors: AnchorStore,
    at_time: Option<i64>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AnchorVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = std::iter::once(end_entity)
            .chain(intermediates)
            .map(|der| Certificate::from_der(der.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| rustls::Error::InvalidCertificate(CertificateError::BadEncoding))?;

        let at = self
            .at_time
            .unwrap_or_else(|| i64::try_from(now.as_secs()).unwrap_or(i64::MAX));
        let at = OffsetDateTime::from_unix_timestamp(at).unwrap_or_else(|_| OffsetDateTime::now_utc());

        match evaluate_chain(&chain, &self.anchors, at) {
            Ok(()) => Ok(ServerCertVerified::assertion()),
            Err(failure) => {
                debug!(reason = %failure, "server certificate rejected");
                Err(rustls::Error::InvalidCertificate(CertificateError::Other(
                    OtherError(Arc::new(failure)),
                )))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
