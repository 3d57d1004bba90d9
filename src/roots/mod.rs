//! Default root certificates.
//!
//! The process-wide default roots are resolved once, on first use, through
//! an ordered fallback chain:
//!
//! 1. the configured `default_roots_file_path`
//! 2. the registered override callback
//! 3. the OS trust store, unless `not_use_system_roots` is set
//! 4. the installed roots file, unless the override callback answered
//!    [`RootsOverride::FailPermanently`]
//!
//! Each step runs only if the previous ones produced no bytes.  Ending with
//! no bytes is not an error here; callers that need roots report it.  Once
//! resolved the result never changes for the life of the process.

pub mod system;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use parking_lot::RwLock;
use rustls::RootCertStore;
use tracing::{debug, info, warn};

use crate::config::{TrustConfig, process_config};
use crate::engine::parse_root_store;
use crate::{Error, Result};

pub use system::{OsTrustStore, SystemRootsSource};

/// Installed fallback bundle.
pub const INSTALLED_ROOTS_PATH: &str = "/usr/share/ssl-trust/roots.pem";

/// Answer of a roots override callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootsOverride {
    /// Use these PEM bytes.
    Ok(Vec<u8>),
    /// No override; continue with the OS trust store.
    Unavailable,
    /// No override, and never fall back to the installed roots file.
    FailPermanently,
}

/// Application-supplied provider of default roots.
pub type RootsOverrideCallback = Arc<dyn Fn() -> RootsOverride + Send + Sync>;

static OVERRIDE_CALLBACK: RwLock<Option<RootsOverrideCallback>> = parking_lot::const_rwlock(None);

/// Register the roots override callback.
///
/// Only effective before the default roots are first used.
pub fn set_roots_override_callback<F>(callback: F)
where
    F: Fn() -> RootsOverride + Send + Sync + 'static,
{
    *OVERRIDE_CALLBACK.write() = Some(Arc::new(callback));
}

fn registered_override_callback() -> Option<RootsOverrideCallback> {
    OVERRIDE_CALLBACK.read().clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Root store
// ─────────────────────────────────────────────────────────────────────────────

/// Resolved default roots.
#[derive(Debug, Clone, Default)]
pub struct RootStore {
    pem: Bytes,
    store: Option<Arc<RootCertStore>>,
}

impl RootStore {
    /// PEM bytes of the roots, `None` when no roots were found.
    pub fn pem_root_certs(&self) -> Option<&[u8]> {
        (!self.pem.is_empty()).then_some(&self.pem[..])
    }

    /// Raw PEM bytes, possibly empty.
    pub fn pem(&self) -> &Bytes {
        &self.pem
    }

    /// Parsed store, `None` when no roots were found.
    pub fn root_store(&self) -> Option<&Arc<RootCertStore>> {
        self.store.as_ref()
    }

    /// Number of trust anchors.
    pub fn len(&self) -> usize {
        self.store.as_ref().map_or(0, |s| s.len())
    }

    /// Whether no roots were found.
    pub fn is_empty(&self) -> bool {
        self.store.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the fallback chain.
pub struct RootStoreResolver {
    roots_file_path: Option<PathBuf>,
    override_callback: Option<RootsOverrideCallback>,
    use_system_roots: bool,
    system_roots: Arc<dyn SystemRootsSource>,
    installed_roots_path: PathBuf,
}

impl std::fmt::Debug for RootStoreResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootStoreResolver")
            .field("roots_file_path", &self.roots_file_path)
            .field("override_callback", &self.override_callback.is_some())
            .field("use_system_roots", &self.use_system_roots)
            .field("installed_roots_path", &self.installed_roots_path)
            .finish_non_exhaustive()
    }
}

impl RootStoreResolver {
    /// Resolver for `config` with the registered override callback.
    #[must_use]
    pub fn from_config(config: &TrustConfig) -> Self {
        let roots_file_path = (!config.default_roots_file_path.is_empty())
            .then(|| PathBuf::from(&config.default_roots_file_path));
        Self {
            roots_file_path,
            override_callback: registered_override_callback(),
            use_system_roots: config.use_system_roots(),
            system_roots: Arc::new(OsTrustStore::with_roots_dir(&config.system_roots_dir)),
            installed_roots_path: PathBuf::from(INSTALLED_ROOTS_PATH),
        }
    }

    /// Replace the override callback.
    #[must_use]
    pub fn with_override_callback(mut self, callback: Option<RootsOverrideCallback>) -> Self {
        self.override_callback = callback;
        self
    }

    /// Replace the OS trust store.
    #[must_use]
    pub fn with_system_roots(mut self, source: impl SystemRootsSource + 'static) -> Self {
        self.system_roots = Arc::new(source);
        self
    }

    /// Replace the installed roots file.
    #[must_use]
    pub fn with_installed_roots_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.installed_roots_path = path.into();
        self
    }

    /// Run the fallback chain and return the PEM bytes, possibly empty.
    pub fn compute_pem_root_certs(&self) -> Bytes {
        if let Some(path) = &self.roots_file_path {
            let pem = load_roots_file(path);
            if !pem.is_empty() {
                debug!(path = %path.display(), "Default roots loaded from configured file");
                return pem;
            }
        }

        let mut fail_permanently = false;
        if let Some(callback) = &self.override_callback {
            match callback() {
                RootsOverride::Ok(pem) if !pem.is_empty() => {
                    debug!("Default roots supplied by override callback");
                    return Bytes::from(pem);
                }
                RootsOverride::Ok(_) | RootsOverride::Unavailable => {}
                RootsOverride::FailPermanently => fail_permanently = true,
            }
        }

        if self.use_system_roots {
            let pem = self.system_roots.load();
            if !pem.is_empty() {
                debug!("Default roots loaded from OS trust store");
                return Bytes::from(pem);
            }
        }

        if !fail_permanently {
            let pem = load_roots_file(&self.installed_roots_path);
            if !pem.is_empty() {
                debug!(path = %self.installed_roots_path.display(), "Default roots loaded from installed file");
                return pem;
            }
        }

        Bytes::new()
    }

    /// Compute the bytes and parse them.
    ///
    /// # Errors
    ///
    /// Returns `Error::RootStore` if non-empty bytes are malformed PEM or hold
    /// no usable trust anchor.
    pub fn resolve(&self) -> Result<RootStore> {
        let pem = self.compute_pem_root_certs();
        if pem.is_empty() {
            info!("No default root certificates available");
            return Ok(RootStore::default());
        }

        let store = parse_root_store(&pem).map_err(|e| Error::RootStore(e.to_string()))?;
        debug!(roots = store.len(), "Default root store parsed");
        Ok(RootStore {
            pem,
            store: Some(Arc::new(store)),
        })
    }
}

fn load_roots_file(path: &Path) -> Bytes {
    match fs::read(path) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not load root certificates file");
            Bytes::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exactly-once cell
// ─────────────────────────────────────────────────────────────────────────────

/// Write-once slot for a resolved [`RootStore`].
///
/// Concurrent first callers block until one of them has resolved the store;
/// everyone then sees the same result.  A parse failure is kept and returned
/// to every later caller.
#[derive(Debug, Default)]
pub struct RootStoreCell {
    inner: OnceLock<std::result::Result<RootStore, String>>,
}

impl RootStoreCell {
    /// Unresolved cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// The resolved store, running `resolver` on first use only.
    ///
    /// # Errors
    ///
    /// Returns `Error::RootStore` if resolution failed, now or earlier.
    pub fn get_or_resolve<F>(&self, resolver: F) -> Result<&RootStore>
    where
        F: FnOnce() -> RootStoreResolver,
    {
        self.inner
            .get_or_init(|| {
                resolver().resolve().map_err(|e| {
                    warn!(error = %e, "Default root store resolution failed");
                    e.to_string()
                })
            })
            .as_ref()
            .map_err(|e| Error::RootStore(e.clone()))
    }

    /// Whether resolution already happened.
    pub fn is_resolved(&self) -> bool {
        self.inner.get().is_some()
    }
}

static DEFAULT_ROOTS: RootStoreCell = RootStoreCell::new();

/// Process-wide default roots.
///
/// # Errors
///
/// Returns `Error::RootStore` if the default roots are malformed.
pub fn default_root_store() -> Result<&'static RootStore> {
    DEFAULT_ROOTS.get_or_resolve(|| RootStoreResolver::from_config(process_config()))
}

/// Process-wide default PEM roots, `None` if there are none.
///
/// # Errors
///
/// Returns `Error::RootStore` if the default roots are malformed.
pub fn default_pem_root_certs() -> Result<Option<&'static [u8]>> {
    Ok(default_root_store()?.pem_root_certs())
}
