//! Authentication context exposed to applications after a handshake.
//!
//! An [`AuthContext`] owns an ordered list of properties and, optionally,
//! the name of the property that identifies the peer.  Contexts are shared
//! through `Arc` and are immutable once handed out.

/// Transport security type of the context.
pub const TRANSPORT_SECURITY_TYPE_PROPERTY_NAME: &str = "transport_security_type";
/// Value of [`TRANSPORT_SECURITY_TYPE_PROPERTY_NAME`] for TLS peers.
pub const SSL_TRANSPORT_SECURITY_TYPE: &str = "ssl";
/// Subject Common Name of the peer certificate.
pub const X509_CN_PROPERTY_NAME: &str = "x509_common_name";
/// One Subject Alternative Name of the peer certificate.
pub const X509_SAN_PROPERTY_NAME: &str = "x509_subject_alternative_name";
/// PEM encoding of the peer certificate.
pub const X509_PEM_CERT_PROPERTY_NAME: &str = "x509_pem_cert";
/// Whether the session was resumed.
pub const SSL_SESSION_REUSED_PROPERTY: &str = "ssl_session_reused";

/// A single `(name, value)` property of an [`AuthContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProperty {
    name: String,
    value: Vec<u8>,
}

impl AuthProperty {
    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Property value as UTF-8, if valid.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Authenticated peer description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    properties: Vec<AuthProperty>,
    peer_identity_property_name: Option<String>,
}

impl AuthContext {
    /// Empty, unauthenticated context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property with a raw value.
    pub fn add_property(&mut self, name: &str, value: &[u8]) {
        self.properties.push(AuthProperty {
            name: name.to_owned(),
            value: value.to_vec(),
        });
    }

    /// Append a property with a string value.
    pub fn add_cstring_property(&mut self, name: &str, value: &str) {
        self.add_property(name, value.as_bytes());
    }

    /// Designate the property that identifies the peer.
    ///
    /// Returns `false`, leaving the context unchanged, when no property with
    /// that name exists.
    pub fn set_peer_identity_property_name(&mut self, name: &str) -> bool {
        if self.find_properties_by_name(name).next().is_none() {
            return false;
        }
        self.peer_identity_property_name = Some(name.to_owned());
        true
    }

    /// Name of the identity property, if designated.
    pub fn peer_identity_property_name(&self) -> Option<&str> {
        self.peer_identity_property_name.as_deref()
    }

    /// Whether a peer identity has been designated.
    pub fn is_peer_authenticated(&self) -> bool {
        self.peer_identity_property_name.is_some()
    }

    /// All properties in insertion order.
    pub fn properties(&self) -> impl Iterator<Item = &AuthProperty> {
        self.properties.iter()
    }

    /// Number of properties.
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Properties called `name`, in insertion order.
    pub fn find_properties_by_name<'s>(
        &'s self,
        name: &'s str,
    ) -> impl Iterator<Item = &'s AuthProperty> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    /// Properties that make up the peer identity.
    ///
    /// Empty when the peer is not authenticated.
    pub fn peer_identity(&self) -> impl Iterator<Item = &AuthProperty> {
        let name = self.peer_identity_property_name.as_deref();
        self.properties
            .iter()
            .filter(move |p| Some(p.name.as_str()) == name)
    }
}
