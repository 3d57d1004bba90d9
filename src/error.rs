//! Error types for the trust subsystem

use std::io;

use thiserror::Error;

/// Result type alias for the trust subsystem
pub type Result<T> = std::result::Result<T, Error>;

/// Trust subsystem errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No roots were supplied and the process has no default roots
    #[error("Could not get default pem root certs")]
    DefaultRootsUnavailable,

    /// Default root material was found but could not be parsed
    #[error("Root store error: {0}")]
    RootStore(String),

    /// The engine refused to build a handshaker factory
    #[error("Handshaker factory creation failed with {0}")]
    HandshakerFactory(String),

    /// The expected peer name is absent from the peer certificate
    #[error("Peer name {0} is not in peer certificate")]
    PeerNameMismatch(String),

    /// The call host is not covered by the authenticated server name
    #[error("call host does not match SSL server name")]
    CallHostMismatch,

    /// The peer negotiated an application protocol we do not speak
    #[error("Unsupported ALPN protocol selected by peer: {0}")]
    UnsupportedAlpn(String),

    /// Certificate could not be parsed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error comes from the environment rather than from
    /// the caller's inputs.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DefaultRootsUnavailable | Self::RootStore(_)
        )
    }
}
