//! Client certificate verifiers for the five request modes.
//!
//! Verifying modes use the webpki verifier over the configured client roots.
//! The "don't verify" modes accept any certificate chain but still check the
//! handshake signature, so the peer must hold the private key.

use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::{ClientCertVerifierBuilder, WebPkiClientVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, Error as TlsError, SignatureScheme};

use super::{ClientCertRequest, EngineError, parse_root_store};

/// Build the verifier implementing `request`.
///
/// # Errors
///
/// Verifying modes fail without client roots, or when the roots cannot be
/// parsed.
pub(crate) fn client_cert_verifier(
    request: ClientCertRequest,
    pem_client_root_certs: Option<&[u8]>,
    provider: &Arc<CryptoProvider>,
) -> Result<Arc<dyn ClientCertVerifier>, EngineError> {
    let verifier: Arc<dyn ClientCertVerifier> = match request {
        ClientCertRequest::DontRequest => WebPkiClientVerifier::no_client_auth(),
        ClientCertRequest::RequestButDontVerify => {
            Arc::new(UnverifiedClientCert::new(provider, false))
        }
        ClientCertRequest::RequireButDontVerify => {
            Arc::new(UnverifiedClientCert::new(provider, true))
        }
        ClientCertRequest::RequestAndVerify => {
            webpki_builder(pem_client_root_certs, provider)?
                .allow_unauthenticated()
                .build()?
        }
        ClientCertRequest::RequireAndVerify => {
            webpki_builder(pem_client_root_certs, provider)?.build()?
        }
    };
    Ok(verifier)
}

fn webpki_builder(
    pem_client_root_certs: Option<&[u8]>,
    provider: &Arc<CryptoProvider>,
) -> Result<ClientCertVerifierBuilder, EngineError> {
    let pem = pem_client_root_certs
        .filter(|pem| !pem.is_empty())
        .ok_or_else(|| {
            EngineError::InvalidArgument(
                "client certificate verification requires client root certificates".to_string(),
            )
        })?;
    let roots = parse_root_store(pem)?;
    Ok(WebPkiClientVerifier::builder_with_provider(
        Arc::new(roots),
        Arc::clone(provider),
    ))
}

/// Requests a client certificate without validating its chain.
#[derive(Debug)]
struct UnverifiedClientCert {
    algorithms: WebPkiSupportedAlgorithms,
    mandatory: bool,
}

impl UnverifiedClientCert {
    fn new(provider: &CryptoProvider, mandatory: bool) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
            mandatory,
        }
    }
}

impl ClientCertVerifier for UnverifiedClientCert {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, TlsError> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
