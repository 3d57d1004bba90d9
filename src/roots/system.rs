//! Operating system trust store.
//!
//! The platform store is read through `rustls-native-certs`, which honours
//! `SSL_CERT_FILE` and `SSL_CERT_DIR` and uses the native stores on macOS and
//! Windows.  A configured roots directory replaces the platform store.
//! Either way the certificates come back re-armoured as one PEM bundle.

use std::fs;
use std::path::{Path, PathBuf};

use rustls::pki_types::CertificateDer;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::peer::der_to_pem;

/// Source of OS root certificates in PEM form.
///
/// Empty bytes mean the OS has no roots to offer.
pub trait SystemRootsSource: Send + Sync {
    /// Load the PEM bundle.
    fn load(&self) -> Vec<u8>;
}

impl<F> SystemRootsSource for F
where
    F: Fn() -> Vec<u8> + Send + Sync,
{
    fn load(&self) -> Vec<u8> {
        self()
    }
}

/// The host's trust store.
#[derive(Debug, Clone, Default)]
pub struct OsTrustStore {
    roots_dir: Option<PathBuf>,
}

impl OsTrustStore {
    /// Store backed by the platform trust store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store reading the certificate files of `dir` instead of the platform
    /// store.  An empty path means unset.
    #[must_use]
    pub fn with_roots_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            roots_dir: (!dir.as_os_str().is_empty()).then_some(dir),
        }
    }
}

impl SystemRootsSource for OsTrustStore {
    fn load(&self) -> Vec<u8> {
        let certs = match &self.roots_dir {
            Some(dir) => load_directory(dir),
            None => load_native(),
        };
        to_pem_bundle(&certs)
    }
}

fn load_native() -> Vec<CertificateDer<'static>> {
    let result = rustls_native_certs::load_native_certs();
    for error in &result.errors {
        warn!(error = %error, "Error loading native root certificates");
    }
    debug!(certs = result.certs.len(), "Loaded native root certificates");
    result.certs
}

/// Whether `path` looks like a certificate file (`.pem`, `.crt`, `.cer`, or
/// an OpenSSL hash link such as `5ad8a5d6.0`).
fn is_cert_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(ext, "pem" | "crt" | "cer")
        || (ext.len() == 1 && ext.bytes().all(|b| b.is_ascii_digit()))
}

/// Certificates of every certificate file directly inside `dir`.
///
/// Files are visited in name order.  Unreadable or malformed files are
/// skipped.
pub fn load_directory(dir: &Path) -> Vec<CertificateDer<'static>> {
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut certs = Vec::new();
    for entry in entries.into_iter().filter_map(std::result::Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_cert_file(path) {
            trace!(path = %path.display(), "Skipping non-certificate entry");
            continue;
        }
        let pem = match fs::read(path) {
            Ok(pem) => pem,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable certificate file");
                continue;
            }
        };
        match rustls_pemfile::certs(&mut pem.as_slice()).collect::<Result<Vec<_>, _>>() {
            Ok(found) => certs.extend(found),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed certificate file"),
        }
    }

    debug!(dir = %dir.display(), certs = certs.len(), "Loaded root certificate directory");
    certs
}

fn to_pem_bundle(certs: &[CertificateDer<'_>]) -> Vec<u8> {
    certs
        .iter()
        .flat_map(|cert| der_to_pem(cert).into_bytes())
        .collect()
}
