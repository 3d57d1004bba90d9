//! Application-Layer Protocol Negotiation list.
//!
//! Protocols are listed in preference order; the list is offered by both
//! client and server handshaker factories.

/// Supported ALPN protocol identifiers, most preferred first.
pub const SUPPORTED_VERSIONS: [&str; 2] = ["grpc-exp", "h2"];

/// Number of supported ALPN versions.
#[must_use]
pub const fn num_versions() -> usize {
    SUPPORTED_VERSIONS.len()
}

/// ALPN version at `index`, if any.
#[must_use]
pub fn version_at(index: usize) -> Option<&'static str> {
    SUPPORTED_VERSIONS.get(index).copied()
}

/// Whether `protocol` is one we can speak.
#[must_use]
pub fn is_protocol_supported(protocol: &[u8]) -> bool {
    SUPPORTED_VERSIONS
        .iter()
        .any(|v| v.as_bytes() == protocol)
}

/// Build a fresh protocol list in the wire form the engine expects.
///
/// Each call allocates a new list; the engine takes ownership of it.
#[must_use]
pub fn fill_protocol_strings() -> Vec<Vec<u8>> {
    (0..num_versions())
        .filter_map(version_at)
        .map(|v| v.as_bytes().to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h2_is_supported() {
        assert!(is_protocol_supported(b"h2"));
        assert!(is_protocol_supported(b"grpc-exp"));
        assert!(!is_protocol_supported(b"http/1.1"));
        assert!(!is_protocol_supported(b""));
    }

    #[test]
    fn filled_list_preserves_preference_order() {
        let list = fill_protocol_strings();
        assert_eq!(list, vec![b"grpc-exp".to_vec(), b"h2".to_vec()]);
    }

    #[test]
    fn version_at_out_of_range_is_none() {
        assert_eq!(version_at(num_versions()), None);
    }
}
