//! SSL trust subsystem
//!
//! Policy and data-shape layer around a TLS engine (`rustls`):
//!
//! - **Default roots**: process-wide, lazily resolved trusted roots with an
//!   ordered fallback chain (configured file, override callback, OS trust
//!   store, installed bundle)
//! - **Peer identity**: converts a verified peer into an [`AuthContext`] with
//!   a designated identity property, and back into a borrowed peer view
//! - **Name matching**: host/port splitting, zone-id stripping, call-host
//!   authorisation
//! - **Handshake options**: ALPN list, cipher policy, client certificate
//!   request mode and session resumption cache for client and server
//!   handshaker factories
//!
//! The engine itself (X.509 parsing, chain validation, record layer) is not
//! reimplemented here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alpn;
pub mod auth_context;
pub mod channel_args;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod name_matcher;
pub mod peer;
pub mod roots;
pub mod session_cache;

pub use auth_context::{AuthContext, AuthProperty};
pub use error::{Error, Result};
pub use handshake::{ClientCertificateRequestType, PemKeyCertPair};
pub use identity::{build_auth_context, to_shallow_peer};
pub use peer::{Peer, PeerProperty};
pub use roots::{RootStore, RootsOverride, set_roots_override_callback};
pub use session_cache::SessionCacheHandle;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
