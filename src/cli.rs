//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::auth_context::AuthContext;
use crate::identity::build_auth_context;
use crate::peer::Peer;
use crate::roots::RootStore;
use crate::{Error, Result};

/// Inspect default trust roots and certificate identities
#[derive(Parser, Debug)]
#[command(name = "ssl-trust")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "SSL_TRUST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "SSL_TRUST_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "SSL_TRUST_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text
    Text,
    /// JSON document
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the default root certificates
    Roots {
        /// Print the PEM bundle instead of a summary
        #[arg(long)]
        pem: bool,
    },

    /// Show the identity a peer certificate would authenticate as
    Identity {
        /// PEM certificate file (leaf first)
        #[arg(required = true)]
        cert: PathBuf,
    },

    /// Check whether a call host is covered by a server certificate
    CheckHost {
        /// PEM server certificate file (leaf first)
        #[arg(required = true)]
        cert: PathBuf,

        /// Call host, port allowed
        #[arg(required = true)]
        host: String,

        /// Channel target name (defaults to the call host)
        #[arg(long)]
        target_name: Option<String>,

        /// Overridden target name
        #[arg(long, default_value = "")]
        override_name: String,
    },
}

/// Summary of the default roots.
#[derive(Debug, Serialize)]
pub struct RootsReport {
    /// Number of trust anchors.
    pub anchors: usize,
    /// Size of the PEM bundle in bytes.
    pub pem_bytes: usize,
}

impl From<&RootStore> for RootsReport {
    fn from(store: &RootStore) -> Self {
        Self {
            anchors: store.len(),
            pem_bytes: store.pem().len(),
        }
    }
}

/// Authentication context rendered for display.
#[derive(Debug, Serialize)]
pub struct IdentityReport {
    /// Property naming the peer identity.
    pub identity_property: Option<String>,
    /// Identity values.
    pub identity: Vec<String>,
    /// Every property, in insertion order.
    pub properties: Vec<(String, String)>,
}

impl From<&AuthContext> for IdentityReport {
    fn from(ctx: &AuthContext) -> Self {
        let lossy = |v: &[u8]| String::from_utf8_lossy(v).into_owned();
        Self {
            identity_property: ctx.peer_identity_property_name().map(str::to_owned),
            identity: ctx.peer_identity().map(|p| lossy(p.value())).collect(),
            properties: ctx
                .properties()
                .map(|p| (p.name().to_owned(), lossy(p.value())))
                .collect(),
        }
    }
}

/// Build the authentication context of the leaf certificate in `pem`.
///
/// # Errors
///
/// Returns `Error::Certificate` if `pem` holds no parsable certificate.
pub fn auth_context_from_pem(pem: &[u8]) -> Result<std::sync::Arc<AuthContext>> {
    let mut reader = pem;
    let leaf = rustls_pemfile::certs(&mut reader)
        .next()
        .ok_or_else(|| Error::Certificate("no certificate found in PEM".to_string()))?
        .map_err(|e| Error::Certificate(e.to_string()))?;
    let peer = Peer::from_certificate_der(&leaf, false)?;
    Ok(build_auth_context(&peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    #[test]
    fn identity_report_lists_sans() {
        // GIVEN: a certificate with two DNS SANs
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["a.test".to_string(), "b.test".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();

        // WHEN: rendering its identity
        let ctx = auth_context_from_pem(cert.pem().as_bytes()).unwrap();
        let report = IdentityReport::from(&*ctx);

        // THEN: SANs are the identity
        assert_eq!(
            report.identity_property.as_deref(),
            Some(crate::auth_context::X509_SAN_PROPERTY_NAME)
        );
        assert_eq!(report.identity, vec!["a.test", "b.test"]);
        assert_eq!(report.properties[0], ("transport_security_type".into(), "ssl".into()));
    }

    #[test]
    fn non_certificate_input_is_rejected() {
        let err = auth_context_from_pem(b"hello").unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn cli_parses_check_host() {
        let cli = Cli::parse_from([
            "ssl-trust",
            "--format",
            "json",
            "check-host",
            "server.pem",
            "foo.test:443",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::CheckHost {
                host,
                target_name,
                override_name,
                ..
            } => {
                assert_eq!(host, "foo.test:443");
                assert!(target_name.is_none());
                assert!(override_name.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
