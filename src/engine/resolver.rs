//! Server certificate selection across several key/cert pairs.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use tracing::trace;

use super::matching::peer_matches_name;
use super::{EngineError, PemKeyCertPair, load_key_cert_pair};
use crate::peer::Peer;

/// Picks the pair whose leaf certificate names the requested SNI host.
///
/// The first pair serves clients that send no SNI or an unknown name.
#[derive(Debug)]
pub(crate) struct SniCertResolver {
    entries: Vec<(Peer<'static>, Arc<CertifiedKey>)>,
}

impl SniCertResolver {
    pub(crate) fn new(
        pairs: &[PemKeyCertPair],
        provider: &CryptoProvider,
    ) -> Result<Self, EngineError> {
        let mut entries = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (chain, key) = load_key_cert_pair(pair)?;
            let names = Peer::from_certificate_der(&chain[0], false)
                .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
            let signing_key = provider.key_provider.load_private_key(key)?;
            entries.push((names, Arc::new(CertifiedKey::new(chain, signing_key))));
        }
        Ok(Self { entries })
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        if let Some(sni) = client_hello.server_name() {
            if let Some((_, key)) = self
                .entries
                .iter()
                .find(|(names, _)| peer_matches_name(names, sni))
            {
                return Some(Arc::clone(key));
            }
            trace!(sni, "No certificate names the requested host, using default");
        }
        self.entries.first().map(|(_, key)| Arc::clone(key))
    }
}
