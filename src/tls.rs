//! TLS identity handling for quicssh.
//!
//! This module provides:
//! - Ephemeral self-signed certificate generation (ECDSA P-256, serial 1)
//! - SHA-256 fingerprint computation for operator display
//! - rustls configuration builders for server and client modes
//!
//! Nothing here touches the filesystem. Every server run gets a fresh
//! identity, and the client accepts any server certificate: the tunnel is
//! encrypted but the server is not authenticated.

use rcgen::{CertificateParams, KeyPair, SerialNumber};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::{ClientConfig, ServerConfig};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Subject alternative name of the generated certificate.
const CERT_SUBJECT: &str = "localhost";

/// Serial number of every generated certificate.
const CERT_SERIAL: u64 = 1;

/// Error type for TLS operations.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate generation failed: {0}")]
    CertificateGeneration(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
}

/// Result type for TLS operations.
pub type TlsResult<T> = std::result::Result<T, TlsError>;

/// Certificate and key pair with computed fingerprint.
#[derive(Clone)]
pub struct CertKeyPair {
    /// Certificate chain in DER format (always a single self-signed entry).
    pub cert_der: Vec<Vec<u8>>,
    /// PKCS#8 private key in DER format.
    pub key_der: Vec<u8>,
    /// SHA-256 fingerprint of the certificate (colon-separated hex).
    pub fingerprint: String,
}

impl std::fmt::Debug for CertKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertKeyPair")
            .field("fingerprint", &self.fingerprint)
            .field("key_der", &"<redacted>")
            .finish()
    }
}

/// Installs ring as the process-wide rustls provider.
///
/// Safe to call more than once; later calls are ignored.
pub fn install_crypto_provider() {
    if CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Generates the server's ephemeral identity.
pub fn generate_self_signed_cert() -> TlsResult<CertKeyPair> {
    let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
        .map_err(|e| TlsError::CertificateGeneration(e.to_string()))?;

    let mut params = CertificateParams::new(vec![CERT_SUBJECT.to_string()])
        .map_err(|e| TlsError::CertificateGeneration(e.to_string()))?;
    params.serial_number = Some(SerialNumber::from(CERT_SERIAL));

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(365);

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| TlsError::CertificateGeneration(e.to_string()))?;

    let cert_der = cert.der().to_vec();
    let fingerprint = compute_fingerprint(&cert_der);

    Ok(CertKeyPair {
        cert_der: vec![cert_der],
        key_der: key_pair.serialize_der(),
        fingerprint,
    })
}

/// Computes the SHA-256 fingerprint of a DER-encoded certificate.
///
/// Returns the fingerprint in colon-separated lowercase hex format.
pub fn compute_fingerprint(cert_der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    let hash = hasher.finalize();
    format_fingerprint(&hash.into())
}

/// Formats a fingerprint as colon-separated lowercase hex.
pub fn format_fingerprint(bytes: &[u8; 32]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Builds a server TLS configuration.
pub fn build_server_config(cert_key: &CertKeyPair, alpn: &str) -> TlsResult<ServerConfig> {
    let certs: Vec<CertificateDer<'static>> = cert_key
        .cert_der
        .iter()
        .map(|c| CertificateDer::from(c.clone()))
        .collect();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert_key.key_der.clone()));

    let mut config = ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| TlsError::TlsConfig(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::TlsConfig(e.to_string()))?;

    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];

    Ok(config)
}

/// Builds a client TLS configuration that skips server certificate verification.
pub fn build_client_config_insecure(alpn: &str) -> TlsResult<ClientConfig> {
    tracing::debug!("server certificate verification is disabled");

    let mut config = ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| TlsError::TlsConfig(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
        .with_no_client_auth();

    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];

    Ok(config)
}

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still checked, so the peer must hold the key
/// matching the certificate it presents.
#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
