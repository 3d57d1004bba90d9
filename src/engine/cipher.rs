//! Cipher suite policy translation.
//!
//! Policies are colon separated OpenSSL cipher names.  They select the
//! TLS 1.2 suites offered by the provider; TLS 1.3 suites are always kept.

use std::sync::Arc;

use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls::{CipherSuite, SupportedCipherSuite};
use tracing::debug;

use super::EngineError;

/// OpenSSL names understood in a cipher policy.
const OPENSSL_CIPHER_NAMES: &[(&str, CipherSuite)] = &[
    (
        "ECDHE-ECDSA-AES128-GCM-SHA256",
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    ),
    (
        "ECDHE-ECDSA-AES256-GCM-SHA384",
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    ),
    (
        "ECDHE-RSA-AES128-GCM-SHA256",
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ),
    (
        "ECDHE-RSA-AES256-GCM-SHA384",
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    ),
    (
        "ECDHE-ECDSA-CHACHA20-POLY1305",
        CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    ),
    (
        "ECDHE-RSA-CHACHA20-POLY1305",
        CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ),
];

/// TLS 1.2 suites selected by `policy`, in policy order.
///
/// Unknown names are skipped.
///
/// # Errors
///
/// Returns `EngineError::InvalidArgument` when no name in the policy is known.
pub fn tls12_suites_for_policy(policy: &str) -> Result<Vec<CipherSuite>, EngineError> {
    let mut suites = Vec::new();
    for name in policy.split(':').map(str::trim).filter(|n| !n.is_empty()) {
        match OPENSSL_CIPHER_NAMES.iter().find(|(known, _)| *known == name) {
            Some((_, suite)) if !suites.contains(suite) => suites.push(*suite),
            Some(_) => {}
            None => debug!(cipher = name, "Ignoring unsupported cipher suite"),
        }
    }

    if suites.is_empty() {
        return Err(EngineError::InvalidArgument(format!(
            "no supported cipher suite in policy '{policy}'"
        )));
    }
    Ok(suites)
}

/// Crypto provider restricted to `policy`.
///
/// # Errors
///
/// Returns `EngineError::InvalidArgument` when no name in the policy is known.
pub fn provider_for_policy(policy: &str) -> Result<Arc<CryptoProvider>, EngineError> {
    let wanted = tls12_suites_for_policy(policy)?;
    let mut provider = aws_lc_rs::default_provider();
    provider.cipher_suites.retain(|suite| {
        matches!(suite, SupportedCipherSuite::Tls13(_)) || wanted.contains(&suite.suite())
    });
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_skipped() {
        let suites =
            tls12_suites_for_policy("RC4-MD5:ECDHE-RSA-AES128-GCM-SHA256:bogus").unwrap();
        assert_eq!(suites, vec![CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256]);
    }

    #[test]
    fn policy_without_known_suites_is_rejected() {
        assert!(tls12_suites_for_policy("RC4-MD5:DES-CBC3-SHA").is_err());
        assert!(tls12_suites_for_policy("").is_err());
    }

    #[test]
    fn duplicates_are_collapsed() {
        let suites = tls12_suites_for_policy(
            "ECDHE-RSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384",
        )
        .unwrap();
        assert_eq!(suites.len(), 1);
    }

    #[test]
    fn provider_keeps_tls13_and_selected_tls12_suites() {
        let provider = provider_for_policy("ECDHE-ECDSA-AES128-GCM-SHA256").unwrap();
        let tls12: Vec<CipherSuite> = provider
            .cipher_suites
            .iter()
            .filter(|s| !matches!(s, SupportedCipherSuite::Tls13(_)))
            .map(SupportedCipherSuite::suite)
            .collect();
        assert_eq!(tls12, vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256]);
        assert!(
            provider
                .cipher_suites
                .iter()
                .any(|s| matches!(s, SupportedCipherSuite::Tls13(_)))
        );
    }
}
