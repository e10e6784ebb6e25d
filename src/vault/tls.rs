//! Server certificate verification pinned to a private CA bundle.
//!
//! The presented chain must lead to the configured CA pool. The server name
//! is not checked. Handshake signatures are still verified.

use crate::utils::errors::{Result, VaultCliError};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use x509_parser::pem::Pem;

#[derive(Debug)]
pub struct CaPinnedVerifier {
    roots: Arc<RootCertStore>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl CaPinnedVerifier {
    pub fn new(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for CaPinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.algorithms.all,
        )?;
        tracing::trace!("Server certificate chains to pinned CA");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Read a PEM bundle into a root store. A file with no usable certificate is an error.
pub fn load_ca_roots(path: &Path) -> Result<RootCertStore> {
    let data = fs::read(path).map_err(|e| {
        VaultCliError::Tls(format!(
            "Error reading CA Certificate {}: {e}",
            path.display()
        ))
    })?;

    let mut ders = Vec::new();
    for pem in Pem::iter_from_buffer(&data) {
        let pem = pem.map_err(|e| {
            VaultCliError::Tls(format!("Invalid PEM in {}: {e}", path.display()))
        })?;
        if pem.label == "CERTIFICATE" {
            ders.push(CertificateDer::from(pem.contents));
        }
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(ders);
    tracing::debug!(
        "Loaded {added} CA certificate(s) from {} ({ignored} ignored)",
        path.display()
    );

    if added == 0 {
        return Err(VaultCliError::Tls(format!(
            "No valid CA certificate found in {}",
            path.display()
        )));
    }
    Ok(roots)
}

/// rustls client configuration trusting only the given roots, without hostname checks.
pub fn pinned_client_config(roots: RootCertStore) -> Result<ClientConfig> {
    let provider = rustls::crypto::ring::default_provider();
    let config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| VaultCliError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(CaPinnedVerifier::new(roots)))
        .with_no_client_auth();
    Ok(config)
}
