//! Handshaker factory construction.
//!
//! Assembles roots, key material, cipher policy, ALPN list and session cache
//! into engine options and builds client or server handshaker factories.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::alpn;
use crate::config::process_config;
use crate::engine::{
    self, ClientCertRequest, ClientHandshakerFactory, ClientHandshakerOptions,
    ServerHandshakerFactory, ServerHandshakerOptions,
};
use crate::roots::default_root_store;
use crate::session_cache::SessionCacheHandle;
use crate::{Error, Result};

pub use crate::engine::PemKeyCertPair;

/// Whether and how a server asks clients for a certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCertificateRequestType {
    /// Never ask.
    #[default]
    DontRequestClientCertificate,
    /// Ask; accept any certificate or none.
    RequestClientCertificateButDontVerify,
    /// Ask; verify a presented certificate, allow none.
    RequestClientCertificateAndVerify,
    /// Require a certificate; accept any.
    RequestAndRequireClientCertificateButDontVerify,
    /// Require a certificate and verify it.
    RequestAndRequireClientCertificateAndVerify,
}

impl ClientCertificateRequestType {
    /// Every request type, in wire value order.
    pub const ALL: [Self; 5] = [
        Self::DontRequestClientCertificate,
        Self::RequestClientCertificateButDontVerify,
        Self::RequestClientCertificateAndVerify,
        Self::RequestAndRequireClientCertificateButDontVerify,
        Self::RequestAndRequireClientCertificateAndVerify,
    ];

    /// Request type for a wire value.  Unknown values mean "don't request".
    #[must_use]
    pub fn from_raw(value: i32) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or_default()
    }

    /// Wire value.
    #[must_use]
    pub fn as_raw(self) -> i32 {
        match self {
            Self::DontRequestClientCertificate => 0,
            Self::RequestClientCertificateButDontVerify => 1,
            Self::RequestClientCertificateAndVerify => 2,
            Self::RequestAndRequireClientCertificateButDontVerify => 3,
            Self::RequestAndRequireClientCertificateAndVerify => 4,
        }
    }

    /// Request type for a configuration name.  Unknown names mean
    /// "don't request".
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "request_client_certificate_but_dont_verify" | "request" => {
                Self::RequestClientCertificateButDontVerify
            }
            "request_client_certificate_and_verify" | "request_and_verify" => {
                Self::RequestClientCertificateAndVerify
            }
            "request_and_require_client_certificate_but_dont_verify" | "require" => {
                Self::RequestAndRequireClientCertificateButDontVerify
            }
            "request_and_require_client_certificate_and_verify" | "require_and_verify" => {
                Self::RequestAndRequireClientCertificateAndVerify
            }
            _ => Self::DontRequestClientCertificate,
        }
    }

    /// Engine mode implementing this request type.
    #[must_use]
    pub fn to_engine_request_type(self) -> ClientCertRequest {
        match self {
            Self::DontRequestClientCertificate => ClientCertRequest::DontRequest,
            Self::RequestClientCertificateButDontVerify => ClientCertRequest::RequestButDontVerify,
            Self::RequestClientCertificateAndVerify => ClientCertRequest::RequestAndVerify,
            Self::RequestAndRequireClientCertificateButDontVerify => {
                ClientCertRequest::RequireButDontVerify
            }
            Self::RequestAndRequireClientCertificateAndVerify => {
                ClientCertRequest::RequireAndVerify
            }
        }
    }
}

impl From<i32> for ClientCertificateRequestType {
    fn from(value: i32) -> Self {
        Self::from_raw(value)
    }
}

/// Process-wide cipher policy, read from configuration on first use.
pub fn ssl_cipher_suites() -> &'static str {
    static CIPHER_SUITES: OnceLock<String> = OnceLock::new();
    CIPHER_SUITES.get_or_init(|| {
        let suites = process_config().cipher_suites.clone();
        debug!(cipher_suites = %suites, "Cipher policy initialised");
        suites
    })
}

/// Build a client handshaker factory.
///
/// Without `pem_root_certs` the process default roots are used.  The key/cert
/// pair is only attached when both halves are present.
///
/// # Errors
///
/// - `Error::DefaultRootsUnavailable` if no roots were given and the process
///   has none
/// - `Error::RootStore` if the default roots are malformed
/// - `Error::HandshakerFactory` if the engine refuses the options
pub fn client_handshaker_factory_init(
    pem_key_cert_pair: Option<&PemKeyCertPair>,
    pem_root_certs: Option<&[u8]>,
    session_cache: Option<&SessionCacheHandle>,
) -> Result<ClientHandshakerFactory> {
    let (pem_root_certs, root_store) = match pem_root_certs {
        Some(pem) => (pem, None),
        None => {
            let defaults = default_root_store()?;
            match (defaults.pem_root_certs(), defaults.root_store()) {
                (Some(pem), Some(store)) => (pem, Some(Arc::clone(store))),
                _ => {
                    error!("Could not get default pem root certs");
                    return Err(Error::DefaultRootsUnavailable);
                }
            }
        }
    };

    let options = ClientHandshakerOptions {
        pem_root_certs,
        root_store,
        pem_key_cert_pair: pem_key_cert_pair.filter(|pair| pair.is_complete()),
        cipher_suites: ssl_cipher_suites(),
        alpn_protocols: alpn::fill_protocol_strings(),
        session_cache,
    };

    engine::create_client_handshaker_factory(options).map_err(|e| {
        error!(error = %e, "Client handshaker factory creation failed");
        Error::HandshakerFactory(e.to_string())
    })
}

/// Build a server handshaker factory.
///
/// The first key/cert pair serves clients whose SNI matches no pair.
///
/// # Errors
///
/// Returns `Error::HandshakerFactory` if the engine refuses the options,
/// including when `pem_key_cert_pairs` is empty.
pub fn server_handshaker_factory_init(
    pem_key_cert_pairs: &[PemKeyCertPair],
    pem_root_certs: Option<&[u8]>,
    client_certificate_request: ClientCertificateRequestType,
    session_cache: Option<&SessionCacheHandle>,
) -> Result<ServerHandshakerFactory> {
    let options = ServerHandshakerOptions {
        pem_key_cert_pairs,
        pem_client_root_certs: pem_root_certs,
        client_certificate_request: client_certificate_request.to_engine_request_type(),
        cipher_suites: ssl_cipher_suites(),
        alpn_protocols: alpn::fill_protocol_strings(),
        session_cache,
    };

    engine::create_server_handshaker_factory(options).map_err(|e| {
        error!(error = %e, "Server handshaker factory creation failed");
        Error::HandshakerFactory(e.to_string())
    })
}
