// src/network/tls.rs
//! TLS transport for pool connections
//!
//! Without a configured fingerprint the pool certificate is checked against
//! the bundled web PKI roots. With one, only the SHA-256 of the leaf
//! certificate is compared and the chain is not validated; handshake
//! signatures are still verified.

use crate::utils::error::MinerError;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{
    self, CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore,
    SignatureScheme,
};

/// Parses a 64-character hex SHA-256 fingerprint.
pub fn parse_fingerprint(fingerprint: &str) -> Result<[u8; 32], MinerError> {
    let bytes = hex::decode(fingerprint.trim())?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        MinerError::ConfigError(format!(
            "TLS fingerprint must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

/// Builds a connector, pinned to `fingerprint` when one is given.
pub fn connector(fingerprint: Option<&str>) -> Result<TlsConnector, MinerError> {
    let provider = Arc::new(crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| MinerError::ConnectionError(format!("TLS setup failed: {}", e)))?;

    let config = match fingerprint {
        Some(fingerprint) => {
            let verifier = FingerprintVerifier::new(parse_fingerprint(fingerprint)?, &provider);
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(verifier))
                .with_no_client_auth()
        }
        None => {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Runs the TLS handshake for `host` over an established TCP stream.
pub async fn handshake(
    connector: &TlsConnector,
    host: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>, MinerError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| MinerError::ConfigError(format!("Invalid TLS server name '{}': {}", host, e)))?;
    connector
        .connect(server_name, stream)
        .await
        .map_err(|e| MinerError::ConnectionError(format!("TLS handshake with {} failed: {}", host, e)))
}

/// Accepts exactly one leaf certificate, identified by its SHA-256
#[derive(Debug)]
struct FingerprintVerifier {
    expected: [u8; 32],
    algorithms: WebPkiSupportedAlgorithms,
}

impl FingerprintVerifier {
    fn new(expected: [u8; 32], provider: &CryptoProvider) -> Self {
        FingerprintVerifier {
            expected,
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let actual: [u8; 32] = Sha256::digest(end_entity.as_ref()).into();
        if actual == self.expected {
            Ok(ServerCertVerified::assertion())
        } else {
            log::warn!(
                "Pool certificate fingerprint mismatch: expected {}, got {}",
                hex::encode(self.expected),
                hex::encode(actual)
            );
            Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier_for(cert: &[u8]) -> FingerprintVerifier {
        let expected: [u8; 32] = Sha256::digest(cert).into();
        FingerprintVerifier::new(expected, &crypto::ring::default_provider())
    }

    fn check(verifier: &FingerprintVerifier, cert: &[u8]) -> Result<ServerCertVerified, TlsError> {
        let cert = CertificateDer::from(cert.to_vec());
        let name = ServerName::try_from("pool.example.com").unwrap();
        verifier.verify_server_cert(&cert, &[], &name, &[], UnixTime::now())
    }

    #[test]
    fn pinned_leaf_is_accepted() {
        let verifier = verifier_for(b"leaf certificate");
        assert!(check(&verifier, b"leaf certificate").is_ok());
    }

    #[test]
    fn other_leaf_is_rejected() {
        let verifier = verifier_for(b"leaf certificate");
        assert_eq!(
            check(&verifier, b"another certificate").unwrap_err(),
            TlsError::InvalidCertificate(CertificateError::ApplicationVerificationFailure)
        );
    }

    #[test]
    fn fingerprint_parsing() {
        let hex = "ab".repeat(32);
        assert_eq!(parse_fingerprint(&hex).unwrap(), [0xab; 32]);
        assert_eq!(parse_fingerprint(&hex.to_uppercase()).unwrap(), [0xab; 32]);
        assert!(matches!(parse_fingerprint("abcd"), Err(MinerError::ConfigError(_))));
        assert!(matches!(parse_fingerprint(&"zz".repeat(32)), Err(MinerError::InputError(_))));
    }

    #[test]
    fn connectors_build_in_both_modes() {
        assert!(connector(None).is_ok());
        assert!(connector(Some(&"01".repeat(32))).is_ok());
        assert!(connector(Some("not-hex")).is_err());
    }
}
