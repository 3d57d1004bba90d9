//! Host name checks against authenticated peers.
//!
//! Requested names arrive as `host[:port]` authorities.  The port and any
//! IPv6 zone id are removed before the host is handed to the engine's
//! structural matcher (SAN / CN / wildcard rules).

use std::cmp::Ordering;

use tracing::debug;

use crate::alpn;
use crate::auth_context::AuthContext;
use crate::engine;
use crate::identity::to_shallow_peer;
use crate::peer::{Peer, SSL_ALPN_SELECTED_PROTOCOL};
use crate::{Error, Result};

/// Split `host[:port]` or `[v6-host]:port` into host and port.
///
/// Never fails: a malformed authority comes back whole as the host with an
/// empty port.  An unbracketed name with more than one colon is treated as
/// a bare IPv6 literal without port.
#[must_use]
pub fn split_host_port(name: &str) -> (&str, &str) {
    try_split_host_port(name).unwrap_or((name, ""))
}

fn try_split_host_port(name: &str) -> Option<(&str, &str)> {
    if let Some(rest) = name.strip_prefix('[') {
        let rbracket = rest.find(']')?;
        let host = &rest[..rbracket];
        let after = &rest[rbracket + 1..];
        let port = if after.is_empty() {
            ""
        } else {
            after.strip_prefix(':')?
        };
        // Brackets are only valid around IPv6 literals.
        if !host.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    match name.split_once(':') {
        Some((host, port)) if !port.contains(':') => Some((host, port)),
        _ => Some((name, "")),
    }
}

/// Drop an IPv6 zone id (`%eth0`) and everything after it.
#[must_use]
pub fn strip_zone_id(host: &str) -> &str {
    host.find('%').map_or(host, |idx| &host[..idx])
}

/// Whether `requested_name` (an authority, port allowed) names `peer`.
#[must_use]
pub fn host_matches_peer_name(peer: &Peer<'_>, requested_name: &str) -> bool {
    let (host, _port) = split_host_port(requested_name);
    let host = strip_zone_id(host);
    if host.is_empty() {
        return false;
    }
    engine::peer_matches_name(peer, host)
}

/// Order two `(target, override)` pairs lexicographically.
///
/// Two call configurations address the same logical endpoint only when this
/// returns `Ordering::Equal`.
#[must_use]
pub fn compare_target_identity(
    target_a: &str,
    override_a: &str,
    target_b: &str,
    override_b: &str,
) -> Ordering {
    target_a
        .cmp(target_b)
        .then_with(|| override_a.cmp(override_b))
}

/// Check that `peer` is the expected server.
///
/// An empty `peer_name` disables the check.
pub fn check_peer_name(peer_name: &str, peer: &Peer<'_>) -> Result<()> {
    if !peer_name.is_empty() && !host_matches_peer_name(peer, peer_name) {
        return Err(Error::PeerNameMismatch(peer_name.to_owned()));
    }
    Ok(())
}

/// Authorise a call to `host` over a channel authenticated as `auth_context`.
///
/// Passes when the host matches the peer certificate, or when the target
/// name was overridden and the call host is the original target.
pub fn check_call_host(
    host: &str,
    target_name: &str,
    overridden_target_name: &str,
    auth_context: &AuthContext,
) -> Result<()> {
    let peer = to_shallow_peer(auth_context);
    if host_matches_peer_name(&peer, host) {
        return Ok(());
    }
    if !overridden_target_name.is_empty() && host == target_name {
        debug!(host, overridden_target_name, "Call host accepted via target name override");
        return Ok(());
    }
    Err(Error::CallHostMismatch)
}

/// Check the application protocol selected during the handshake.
///
/// Peers that did not negotiate ALPN pass.
pub fn check_alpn(peer: &Peer<'_>) -> Result<()> {
    match peer.find_property(SSL_ALPN_SELECTED_PROTOCOL) {
        Some(prop) if !alpn::is_protocol_supported(prop.value()) => Err(Error::UnsupportedAlpn(
            String::from_utf8_lossy(prop.value()).into_owned(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_context::{X509_CN_PROPERTY_NAME, X509_SAN_PROPERTY_NAME};
    use crate::peer::{PeerProperty, X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY};

    fn san_peer(sans: &[&str]) -> Peer<'static> {
        Peer::from_properties(
            sans.iter()
                .map(|s| PeerProperty::from_str_value(X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY, s))
                .collect(),
        )
    }

    // ── split_host_port ──────────────────────────────────────────────────────

    #[test]
    fn split_strips_trailing_port() {
        assert_eq!(split_host_port("foo.example.com:443"), ("foo.example.com", "443"));
        assert_eq!(split_host_port("foo.example.com"), ("foo.example.com", ""));
        assert_eq!(split_host_port("foo:"), ("foo", ""));
    }

    #[test]
    fn split_handles_bracketed_ipv6() {
        assert_eq!(split_host_port("[::1]:443"), ("::1", "443"));
        assert_eq!(split_host_port("[::1]"), ("::1", ""));
        assert_eq!(split_host_port("[::1%eth0]:443"), ("::1%eth0", "443"));
    }

    #[test]
    fn split_treats_bare_ipv6_as_host() {
        assert_eq!(split_host_port("::1"), ("::1", ""));
        assert_eq!(split_host_port("fe80::1:2"), ("fe80::1:2", ""));
    }

    #[test]
    fn split_returns_malformed_input_whole() {
        assert_eq!(split_host_port("[::1"), ("[::1", ""));
        assert_eq!(split_host_port("[::1]x"), ("[::1]x", ""));
        assert_eq!(split_host_port("[foo]:80"), ("[foo]:80", ""));
    }

    // ── strip_zone_id ────────────────────────────────────────────────────────

    #[test]
    fn zone_id_is_removed_from_first_percent() {
        assert_eq!(strip_zone_id("fe80::1%eth0"), "fe80::1");
        assert_eq!(strip_zone_id("fe80::1%eth0%x"), "fe80::1");
        assert_eq!(strip_zone_id("example.com"), "example.com");
    }

    // ── host_matches_peer_name ───────────────────────────────────────────────

    #[test]
    fn ipv6_with_zone_and_port_matches_on_address_only() {
        let peer = san_peer(&["::1"]);
        assert!(host_matches_peer_name(&peer, "[::1%eth0]:443"));
    }

    #[test]
    fn empty_host_never_matches() {
        let peer = san_peer(&[""]);
        assert!(!host_matches_peer_name(&peer, ":443"));
        assert!(!host_matches_peer_name(&peer, ""));
    }

    #[test]
    fn port_is_ignored_when_matching() {
        let peer = san_peer(&["foo.test.google.fr"]);
        assert!(host_matches_peer_name(&peer, "foo.test.google.fr:1234"));
        assert!(!host_matches_peer_name(&peer, "bar.test.google.fr:1234"));
    }

    // ── compare_target_identity ──────────────────────────────────────────────

    #[test]
    fn override_distinguishes_equal_targets() {
        assert_ne!(compare_target_identity("a.com", "", "a.com", "x"), Ordering::Equal);
        assert_eq!(compare_target_identity("a.com", "x", "a.com", "x"), Ordering::Equal);
        assert_eq!(compare_target_identity("a.com", "z", "b.com", "a"), Ordering::Less);
    }

    // ── checks ───────────────────────────────────────────────────────────────

    #[test]
    fn check_peer_name_empty_name_passes() {
        assert!(check_peer_name("", &Peer::new()).is_ok());
    }

    #[test]
    fn check_peer_name_reports_missing_name() {
        let peer = san_peer(&["good.example.com"]);
        assert!(check_peer_name("good.example.com:443", &peer).is_ok());
        let err = check_peer_name("evil.example.com", &peer).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Peer name evil.example.com is not in peer certificate"
        );
    }

    #[test]
    fn call_host_matching_certificate_passes() {
        let mut ctx = AuthContext::new();
        ctx.add_cstring_property(X509_SAN_PROPERTY_NAME, "*.example.com");
        assert!(check_call_host("api.example.com:443", "api.example.com", "", &ctx).is_ok());
    }

    #[test]
    fn call_host_override_accepts_original_target() {
        let mut ctx = AuthContext::new();
        ctx.add_cstring_property(X509_CN_PROPERTY_NAME, "test.server");
        // Host is the target name, which was overridden for TLS purposes.
        assert!(check_call_host("localhost:50051", "localhost:50051", "test.server", &ctx).is_ok());
        // Without override the mismatch is reported.
        let err = check_call_host("localhost:50051", "localhost:50051", "", &ctx).unwrap_err();
        assert!(matches!(err, Error::CallHostMismatch));
    }

    #[test]
    fn call_host_mismatch_is_an_error() {
        let mut ctx = AuthContext::new();
        ctx.add_cstring_property(X509_SAN_PROPERTY_NAME, "a.example.com");
        let err = check_call_host("b.example.com", "a.example.com", "over", &ctx).unwrap_err();
        assert!(matches!(err, Error::CallHostMismatch));
    }

    #[test]
    fn alpn_check_accepts_supported_or_absent_protocol() {
        assert!(check_alpn(&Peer::new()).is_ok());
        let h2 = Peer::from_properties(vec![PeerProperty::from_str_value(SSL_ALPN_SELECTED_PROTOCOL, "h2")]);
        assert!(check_alpn(&h2).is_ok());
        let h1 = Peer::from_properties(vec![PeerProperty::from_str_value(
            SSL_ALPN_SELECTED_PROTOCOL,
            "http/1.1",
        )]);
        assert!(matches!(check_alpn(&h1), Err(Error::UnsupportedAlpn(p)) if p == "http/1.1"));
    }
}
