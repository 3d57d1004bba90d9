//! Configuration management
//!
//! Process-wide settings consulted when the default root store is resolved
//! and when handshaker factories are built.  Values come from an optional
//! YAML file merged with `SSL_TRUST_`-prefixed environment variables:
//!
//! | Variable                            | Field                     |
//! |-------------------------------------|---------------------------|
//! | `SSL_TRUST_DEFAULT_ROOTS_FILE_PATH` | `default_roots_file_path` |
//! | `SSL_TRUST_NOT_USE_SYSTEM_ROOTS`    | `not_use_system_roots`    |
//! | `SSL_TRUST_SYSTEM_ROOTS_DIR`        | `system_roots_dir`        |
//! | `SSL_TRUST_CIPHER_SUITES`           | `cipher_suites`           |

use std::path::Path;
use std::sync::OnceLock;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "SSL_TRUST_";

/// Cipher suites used when none are configured.
///
/// All of them are compliant with HTTP/2.
pub const DEFAULT_CIPHER_SUITES: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:\
ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-RSA-AES256-GCM-SHA384";

/// Trust subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Path to a PEM bundle with the default roots.  Empty means unset.
    pub default_roots_file_path: String,

    /// Disable loading root certificates from the OS trust store.
    pub not_use_system_roots: bool,

    /// Directory whose certificate files replace the platform trust store.
    /// Empty means unset.
    pub system_roots_dir: String,

    /// Colon separated list of cipher suites (OpenSSL names).
    pub cipher_suites: String,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            default_roots_file_path: String::new(),
            not_use_system_roots: false,
            system_roots_dir: String::new(),
            cipher_suites: DEFAULT_CIPHER_SUITES.to_string(),
        }
    }
}

impl TrustConfig {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(config)
    }

    /// Whether the OS trust store may be consulted.
    #[must_use]
    pub fn use_system_roots(&self) -> bool {
        !self.not_use_system_roots
    }
}

static PROCESS_CONFIG: OnceLock<TrustConfig> = OnceLock::new();

/// Process-wide configuration.
///
/// Loaded from the environment on first use unless [`install_process_config`]
/// ran earlier.  A malformed environment is logged and the defaults are used.
pub fn process_config() -> &'static TrustConfig {
    PROCESS_CONFIG.get_or_init(|| {
        TrustConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid trust configuration in environment, using defaults");
            TrustConfig::default()
        })
    })
}

/// Install the process-wide configuration.
///
/// # Errors
///
/// Returns `Error::Config` if the configuration was already read.
pub fn install_process_config(config: TrustConfig) -> Result<()> {
    PROCESS_CONFIG
        .set(config)
        .map_err(|_| Error::Config("process configuration already initialised".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = TrustConfig::default();
        assert!(cfg.default_roots_file_path.is_empty());
        assert!(!cfg.not_use_system_roots);
        assert!(cfg.use_system_roots());
        assert_eq!(cfg.cipher_suites, DEFAULT_CIPHER_SUITES);
    }

    #[test]
    fn default_cipher_suites_are_four_colon_separated_names() {
        let names: Vec<&str> = DEFAULT_CIPHER_SUITES.split(':').collect();
        assert_eq!(
            names,
            vec![
                "ECDHE-ECDSA-AES128-GCM-SHA256",
                "ECDHE-ECDSA-AES256-GCM-SHA384",
                "ECDHE-RSA-AES128-GCM-SHA256",
                "ECDHE-RSA-AES256-GCM-SHA384",
            ]
        );
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        // GIVEN: only the roots path is set
        let yaml = "default_roots_file_path: /etc/roots.pem";
        let cfg: TrustConfig = serde_yaml::from_str(yaml).unwrap();
        // THEN: the rest keeps its defaults
        assert_eq!(cfg.default_roots_file_path, "/etc/roots.pem");
        assert_eq!(cfg.cipher_suites, DEFAULT_CIPHER_SUITES);
    }

    #[test]
    fn load_reads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not_use_system_roots: true").unwrap();
        writeln!(file, "system_roots_dir: /opt/certs").unwrap();

        let cfg = TrustConfig::load(Some(file.path())).unwrap();
        assert!(cfg.not_use_system_roots);
        assert_eq!(cfg.system_roots_dir, "/opt/certs");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = TrustConfig::load(Some(Path::new("/nonexistent/ssl-trust.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
