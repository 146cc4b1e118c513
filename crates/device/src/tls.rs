//! TLS settings for connections toward the device.
//!
//! Cameras ship with self-signed certificates, so deployments usually run
//! with validation disabled. Hostname and chain checks are skipped in that
//! mode but handshake signatures are still verified.

use std::sync::Arc;

use rustls::DigitallySignedStruct;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_tungstenite::Connector;

use crate::DeviceError;

/// Certificate validation mode for device connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Validate against the bundled web PKI roots.
    #[default]
    Verify,
    /// Accept any certificate the device presents.
    AcceptInvalidCerts,
}

impl TlsPolicy {
    pub fn from_flag(accept_invalid_certs: bool) -> Self {
        if accept_invalid_certs {
            Self::AcceptInvalidCerts
        } else {
            Self::Verify
        }
    }

    pub fn accepts_invalid_certs(self) -> bool {
        self == Self::AcceptInvalidCerts
    }

    /// Connector for WebSocket dials. `None` means the library default.
    pub(crate) fn connector(self) -> Result<Option<Connector>, DeviceError> {
        match self {
            Self::Verify => Ok(None),
            Self::AcceptInvalidCerts => {
                let provider = Arc::new(rustls::crypto::ring::default_provider());
                let config = rustls::ClientConfig::builder_with_provider(provider.clone())
                    .with_safe_default_protocol_versions()?
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
                    .with_no_client_auth();
                Ok(Some(Connector::Rustls(Arc::new(config))))
            }
        }
    }
}

#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
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
            &self.0.signature_verification_algorithms,
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
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
