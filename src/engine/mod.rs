//! TLS engine interface, backed by `rustls`.
//!
//! This is the only module that touches the engine.  It provides:
//!
//! - [`peer_matches_name`]: structural SAN / CN / wildcard matching
//! - [`parse_root_store`]: PEM bundle to `RootCertStore`
//! - [`create_client_handshaker_factory`] / [`create_server_handshaker_factory`]
//!   build `rustls` client and server configs wrapped as handshaker factories
//!
//! Failures are reported as [`EngineError`], whose `Display` is the engine's
//! own description of the failure.

pub mod cipher;
mod matching;
mod resolver;
mod verifier;

use std::fmt;
use std::sync::Arc;

use rustls::client::Resumption;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, ServerConfig, ServerConnection};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session_cache::SessionCacheHandle;

pub use matching::peer_matches_name;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Engine failure.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller supplied unusable material or options
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `rustls` rejected the configuration
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Client certificate verifier could not be built
    #[error("client verifier error: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// PEM-encoded private key and certificate chain.
#[derive(Clone, PartialEq, Eq)]
pub struct PemKeyCertPair {
    /// PEM private key (PKCS#8, PKCS#1 or SEC1).
    pub private_key: String,
    /// PEM certificate chain, leaf first.
    pub cert_chain: String,
}

impl PemKeyCertPair {
    /// Pair from PEM text.
    pub fn new(private_key: impl Into<String>, cert_chain: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            cert_chain: cert_chain.into(),
        }
    }

    /// Whether both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.private_key.is_empty() && !self.cert_chain.is_empty()
    }
}

impl fmt::Debug for PemKeyCertPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemKeyCertPair")
            .field("private_key", &"<redacted>")
            .field("cert_chain_len", &self.cert_chain.len())
            .finish()
    }
}

/// Engine-side client certificate request modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCertRequest {
    /// Never ask for a client certificate.
    DontRequest,
    /// Ask, accept any certificate, allow none.
    RequestButDontVerify,
    /// Ask, verify a presented certificate, allow none.
    RequestAndVerify,
    /// Require a certificate, accept any.
    RequireButDontVerify,
    /// Require a certificate and verify it.
    RequireAndVerify,
}

/// Inputs to [`create_client_handshaker_factory`].
#[derive(Debug)]
pub struct ClientHandshakerOptions<'a> {
    /// PEM roots to trust; ignored when `root_store` is set.
    pub pem_root_certs: &'a [u8],
    /// Pre-parsed roots.
    pub root_store: Option<Arc<RootCertStore>>,
    /// Client identity for mutual TLS.
    pub pem_key_cert_pair: Option<&'a PemKeyCertPair>,
    /// Colon separated cipher policy.
    pub cipher_suites: &'a str,
    /// ALPN protocols, most preferred first.
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Session resumption cache.
    pub session_cache: Option<&'a SessionCacheHandle>,
}

/// Inputs to [`create_server_handshaker_factory`].
#[derive(Debug)]
pub struct ServerHandshakerOptions<'a> {
    /// Server identities; the first one is the default.
    pub pem_key_cert_pairs: &'a [PemKeyCertPair],
    /// PEM roots used to verify client certificates.
    pub pem_client_root_certs: Option<&'a [u8]>,
    /// Client certificate request mode.
    pub client_certificate_request: ClientCertRequest,
    /// Colon separated cipher policy.
    pub cipher_suites: &'a str,
    /// ALPN protocols, most preferred first.
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Session resumption cache.
    pub session_cache: Option<&'a SessionCacheHandle>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Factories
// ─────────────────────────────────────────────────────────────────────────────

/// Produces client handshakes sharing one configuration.
#[derive(Debug, Clone)]
pub struct ClientHandshakerFactory {
    config: Arc<ClientConfig>,
}

impl ClientHandshakerFactory {
    /// Underlying `rustls` configuration.
    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    /// Start a client handshake towards `server_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `server_name` is not a valid DNS name or IP address.
    pub fn create_handshaker(&self, server_name: &str) -> Result<ClientConnection, EngineError> {
        let name = ServerName::try_from(server_name.to_owned()).map_err(|e| {
            EngineError::InvalidArgument(format!("invalid server name '{server_name}': {e}"))
        })?;
        Ok(ClientConnection::new(Arc::clone(&self.config), name)?)
    }
}

/// Produces server handshakes sharing one configuration.
#[derive(Debug, Clone)]
pub struct ServerHandshakerFactory {
    config: Arc<ServerConfig>,
}

impl ServerHandshakerFactory {
    /// Underlying `rustls` configuration.
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Start a server handshake.
    ///
    /// # Errors
    ///
    /// Propagates `rustls` connection setup failures.
    pub fn create_handshaker(&self) -> Result<ServerConnection, EngineError> {
        Ok(ServerConnection::new(Arc::clone(&self.config))?)
    }
}

/// Build a client handshaker factory.
///
/// # Errors
///
/// Fails on an unusable cipher policy, unparsable roots or key material, or
/// when `rustls` rejects the resulting configuration.
pub fn create_client_handshaker_factory(
    options: ClientHandshakerOptions<'_>,
) -> Result<ClientHandshakerFactory, EngineError> {
    let provider = cipher::provider_for_policy(options.cipher_suites)?;
    let roots = match options.root_store {
        Some(store) => store,
        None => Arc::new(parse_root_store(options.pem_root_certs)?),
    };

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots);
    let mut config = match options.pem_key_cert_pair {
        Some(pair) => {
            let (chain, key) = load_key_cert_pair(pair)?;
            builder.with_client_auth_cert(chain, key)?
        }
        None => builder.with_no_client_auth(),
    };

    config.alpn_protocols = options.alpn_protocols;
    if let Some(cache) = options.session_cache {
        config.resumption = Resumption::store(cache.client_store());
    }

    debug!(
        alpn = config.alpn_protocols.len(),
        client_auth = options.pem_key_cert_pair.is_some(),
        session_cache = options.session_cache.is_some(),
        "Client handshaker factory created"
    );
    Ok(ClientHandshakerFactory {
        config: Arc::new(config),
    })
}

/// Build a server handshaker factory.
///
/// # Errors
///
/// Fails without key/cert pairs, on an unusable cipher policy, on unparsable
/// key material or client roots, or when `rustls` rejects the configuration.
pub fn create_server_handshaker_factory(
    options: ServerHandshakerOptions<'_>,
) -> Result<ServerHandshakerFactory, EngineError> {
    if options.pem_key_cert_pairs.is_empty() {
        return Err(EngineError::InvalidArgument(
            "at least one key/cert pair is required".to_string(),
        ));
    }

    let provider = cipher::provider_for_policy(options.cipher_suites)?;
    let client_verifier = verifier::client_cert_verifier(
        options.client_certificate_request,
        options.pem_client_root_certs,
        &provider,
    )?;

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(client_verifier);
    let mut config = if let [pair] = options.pem_key_cert_pairs {
        let (chain, key) = load_key_cert_pair(pair)?;
        builder.with_single_cert(chain, key)?
    } else {
        let resolver = resolver::SniCertResolver::new(options.pem_key_cert_pairs, &provider)?;
        builder.with_cert_resolver(Arc::new(resolver))
    };

    config.alpn_protocols = options.alpn_protocols;
    if let Some(cache) = options.session_cache {
        config.session_storage = cache.server_store();
    }

    debug!(
        key_cert_pairs = options.pem_key_cert_pairs.len(),
        client_certificate_request = ?options.client_certificate_request,
        "Server handshaker factory created"
    );
    Ok(ServerHandshakerFactory {
        config: Arc::new(config),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// PEM material
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a PEM bundle into a root store.
///
/// Certificates that are not usable trust anchors are skipped; the bundle is
/// only rejected when none of them is.
///
/// # Errors
///
/// Fails on malformed PEM, or when the bundle yields no trust anchor.
pub fn parse_root_store(pem: &[u8]) -> Result<RootCertStore, EngineError> {
    let certs = parse_certificates(pem)?;
    if certs.is_empty() {
        return Err(EngineError::InvalidArgument(
            "no root certificates found in PEM".to_string(),
        ));
    }

    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs);
    if ignored > 0 {
        warn!(added, ignored, "Ignored unparsable root certificates");
    }
    if added == 0 {
        return Err(EngineError::InvalidArgument(format!(
            "none of the {ignored} root certificates could be parsed"
        )));
    }
    Ok(store)
}

fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, EngineError> {
    let mut reader = pem;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::InvalidArgument(format!("malformed PEM certificate: {e}")))
}

pub(crate) fn load_key_cert_pair(
    pair: &PemKeyCertPair,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), EngineError> {
    let chain = parse_certificates(pair.cert_chain.as_bytes())?;
    if chain.is_empty() {
        return Err(EngineError::InvalidArgument(
            "no certificate found in key/cert pair".to_string(),
        ));
    }

    let mut reader = pair.private_key.as_bytes();
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| EngineError::InvalidArgument(format!("malformed PEM private key: {e}")))?
        .ok_or_else(|| {
            EngineError::InvalidArgument("no private key found in key/cert pair".to_string())
        })?;

    Ok((chain, key))
}
