//! Structural peer name matching (SAN / CN / wildcard rules).

use std::net::IpAddr;

use crate::peer::{
    Peer, PeerProperty, X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY,
    X509_SUBJECT_COMMON_NAME_PEER_PROPERTY,
};

/// Whether `peer` is authenticated for `name`.
///
/// `name` is a bare host (no port, no zone id).  IP literals match SAN IP
/// entries only.  Host names match SAN entries, falling back to the CN only
/// when the peer has no SAN at all.
pub fn peer_matches_name(peer: &Peer<'_>, name: &str) -> bool {
    let ip = name.parse::<IpAddr>().ok();
    let mut san_count = 0usize;

    for value in peer.values_of(X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY) {
        san_count += 1;
        let Ok(entry) = std::str::from_utf8(value) else {
            continue;
        };
        let matched = match ip {
            Some(ip) => entry.parse::<IpAddr>().is_ok_and(|candidate| candidate == ip),
            None => entry_matches_name(entry, name),
        };
        if matched {
            return true;
        }
    }

    if san_count == 0 && ip.is_none() {
        return peer
            .find_property(X509_SUBJECT_COMMON_NAME_PEER_PROPERTY)
            .and_then(PeerProperty::value_str)
            .is_some_and(|cn| entry_matches_name(cn, name));
    }

    false
}

/// Match one certificate name entry against a host name.
///
/// Comparison is ASCII case-insensitive and ignores one trailing dot on
/// either side.  A `*.` prefix matches exactly one non-empty leftmost label
/// and is refused directly under a top-level domain (`*.com`).
pub(crate) fn entry_matches_name(entry: &str, name: &str) -> bool {
    let entry = entry.strip_suffix('.').unwrap_or(entry);
    let name = name.strip_suffix('.').unwrap_or(name);
    if entry.is_empty() || name.is_empty() {
        return false;
    }
    if entry.eq_ignore_ascii_case(name) {
        return true;
    }

    let Some(suffix) = entry.strip_prefix("*.") else {
        return false;
    };
    match suffix.find('.') {
        Some(dot) if dot > 0 && dot + 1 < suffix.len() => {}
        _ => return false,
    }

    let Some((label, name_subdomain)) = name.split_once('.') else {
        return false;
    };
    if label.is_empty() || name_subdomain.len() < 2 {
        return false;
    }
    name_subdomain.eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(cn: Option<&str>, sans: &[&str]) -> Peer<'static> {
        let mut peer = Peer::new();
        if let Some(cn) = cn {
            peer.push(PeerProperty::from_str_value(
                X509_SUBJECT_COMMON_NAME_PEER_PROPERTY,
                cn,
            ));
        }
        for san in sans {
            peer.push(PeerProperty::from_str_value(
                X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY,
                san,
            ));
        }
        peer
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        assert!(entry_matches_name("Foo.Example.COM", "foo.example.com"));
        assert!(entry_matches_name("foo.example.com.", "foo.example.com"));
        assert!(entry_matches_name("foo.example.com", "foo.example.com."));
    }

    #[test]
    fn wildcard_covers_exactly_one_label() {
        assert!(entry_matches_name("*.example.com", "api.example.com"));
        assert!(!entry_matches_name("*.example.com", "a.b.example.com"));
        assert!(!entry_matches_name("*.example.com", "example.com"));
        assert!(!entry_matches_name("*.example.com", ".example.com"));
    }

    #[test]
    fn wildcard_under_tld_is_refused() {
        assert!(!entry_matches_name("*.com", "example.com"));
        assert!(!entry_matches_name("*.", "a.b"));
        assert!(!entry_matches_name("*", "example"));
    }

    #[test]
    fn cn_is_used_only_without_san() {
        let cn_only = peer(Some("foo.example.com"), &[]);
        assert!(peer_matches_name(&cn_only, "foo.example.com"));

        let with_san = peer(Some("foo.example.com"), &["bar.example.com"]);
        assert!(!peer_matches_name(&with_san, "foo.example.com"));
        assert!(peer_matches_name(&with_san, "bar.example.com"));
    }

    #[test]
    fn ip_names_match_ip_sans_only() {
        let p = peer(Some("10.0.0.1"), &["192.168.1.1", "2001:db8::1"]);
        assert!(peer_matches_name(&p, "192.168.1.1"));
        assert!(peer_matches_name(&p, "2001:0db8:0:0:0:0:0:1"));
        assert!(!peer_matches_name(&p, "10.0.0.1"));

        let cn_ip = peer(Some("10.0.0.1"), &[]);
        assert!(!peer_matches_name(&cn_ip, "10.0.0.1"));
    }

    #[test]
    fn ip_san_does_not_match_host_names() {
        let p = peer(None, &["127.0.0.1"]);
        assert!(!peer_matches_name(&p, "localhost"));
    }
}
