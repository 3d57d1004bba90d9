//! Peer property lists as produced by the TLS engine.
//!
//! A [`Peer`] is an ordered list of `(name, value)` pairs describing the
//! authenticated remote end of a handshake.  Values are `Cow` so the same
//! type serves owned peers (built from a certificate) and borrowed views
//! over an [`AuthContext`](crate::AuthContext).

use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

use crate::{Error, Result};

/// Certificate type of the peer.
pub const CERTIFICATE_TYPE_PEER_PROPERTY: &str = "certificate_type";
/// Value of [`CERTIFICATE_TYPE_PEER_PROPERTY`] for X.509 peers.
pub const X509_CERTIFICATE_TYPE: &str = "X509";
/// Subject Common Name.
pub const X509_SUBJECT_COMMON_NAME_PEER_PROPERTY: &str = "x509_subject_common_name";
/// One Subject Alternative Name entry (one property per entry).
pub const X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY: &str = "x509_subject_alternative_name";
/// PEM encoding of the leaf certificate.
pub const X509_PEM_CERT_PROPERTY: &str = "x509_pem_cert";
/// `"true"` when the handshake resumed an earlier session.
pub const SSL_SESSION_REUSED_PEER_PROPERTY: &str = "ssl_session_reused";
/// Application protocol selected during the handshake.
pub const SSL_ALPN_SELECTED_PROTOCOL: &str = "ssl_alpn_selected_protocol";

// ─────────────────────────────────────────────────────────────────────────────
// Property
// ─────────────────────────────────────────────────────────────────────────────

/// A single named peer property.
///
/// The name is optional: engines may emit unnamed entries, which consumers
/// skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerProperty<'a> {
    /// Property name.
    pub name: Option<Cow<'a, str>>,
    /// Raw property value.
    pub value: Cow<'a, [u8]>,
}

impl<'a> PeerProperty<'a> {
    /// Create a named property.
    pub fn new(name: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    /// Create a named property holding a string value.
    pub fn from_str_value(name: impl Into<Cow<'a, str>>, value: &str) -> Self {
        Self::new(name, value.as_bytes().to_vec())
    }

    /// Create an unnamed property.
    pub fn unnamed(value: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    /// Property name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Property value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Property value as UTF-8, if valid.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Whether the value aliases memory owned elsewhere.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.value, Cow::Borrowed(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Peer
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered property list describing an authenticated peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer<'a> {
    properties: Vec<PeerProperty<'a>>,
}

impl<'a> Peer<'a> {
    /// Empty peer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty peer with room for exactly `capacity` properties.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            properties: Vec::with_capacity(capacity),
        }
    }

    /// Peer from an existing property list.
    #[must_use]
    pub fn from_properties(properties: Vec<PeerProperty<'a>>) -> Self {
        Self { properties }
    }

    /// Append a property.
    pub fn push(&mut self, property: PeerProperty<'a>) {
        self.properties.push(property);
    }

    /// All properties in order.
    pub fn properties(&self) -> &[PeerProperty<'a>] {
        &self.properties
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the peer has no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Allocated slots in the property list.
    pub fn capacity(&self) -> usize {
        self.properties.capacity()
    }

    /// First property called `name`.
    pub fn find_property(&self, name: &str) -> Option<&PeerProperty<'a>> {
        self.properties.iter().find(|p| p.name() == Some(name))
    }

    /// Values of every property called `name`, in order.
    pub fn values_of<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s [u8]> {
        self.properties
            .iter()
            .filter(move |p| p.name() == Some(name))
            .map(PeerProperty::value)
    }
}

impl Peer<'static> {
    /// Build the peer for a verified DER-encoded leaf certificate.
    ///
    /// Emits, in order: the certificate type, the subject CN (if any), the
    /// PEM encoding of the certificate, one property per SAN entry (DNS,
    /// URI, e-mail, IP address) and the session-reused flag.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if the certificate cannot be parsed.
    pub fn from_certificate_der(der: &[u8], session_reused: bool) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("Failed to parse peer certificate: {e}")))?;

        let mut peer = Peer::new();
        peer.push(PeerProperty::from_str_value(
            CERTIFICATE_TYPE_PEER_PROPERTY,
            X509_CERTIFICATE_TYPE,
        ));
        if let Some(cn) = extract_cn(&cert) {
            peer.push(PeerProperty::from_str_value(
                X509_SUBJECT_COMMON_NAME_PEER_PROPERTY,
                &cn,
            ));
        }
        peer.push(PeerProperty::new(
            X509_PEM_CERT_PROPERTY,
            der_to_pem(der).into_bytes(),
        ));
        for san in extract_sans(&cert) {
            peer.push(PeerProperty::from_str_value(
                X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY,
                &san,
            ));
        }
        peer.push(PeerProperty::from_str_value(
            SSL_SESSION_REUSED_PEER_PROPERTY,
            if session_reused { "true" } else { "false" },
        ));
        Ok(peer)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extract the CN attribute from the subject DN.
fn extract_cn(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
}

/// Extract every SAN entry the name matcher understands, as strings.
fn extract_sans(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push((*dns).to_owned()),
                GeneralName::URI(uri) => sans.push((*uri).to_owned()),
                GeneralName::RFC822Name(email) => sans.push((*email).to_owned()),
                GeneralName::IPAddress(raw) => {
                    if let Some(ip) = ip_from_octets(raw) {
                        sans.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    sans
}

fn ip_from_octets(raw: &[u8]) -> Option<IpAddr> {
    match raw.len() {
        4 => {
            let octets: [u8; 4] = raw.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = raw.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// PEM-armour a DER certificate (64 column base64 body).
pub(crate) fn der_to_pem(der: &[u8]) -> String {
    const LINE: usize = 64;
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / LINE + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    let mut rest = body.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(LINE));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
