//! Conversion between engine peers and authentication contexts.
//!
//! [`build_auth_context`] turns a verified [`Peer`] into an owned
//! [`AuthContext`]; [`to_shallow_peer`] goes the other way, producing a
//! peer view that borrows its values from the context so it can be
//! re-matched against host names without copying certificate bytes.

use std::sync::Arc;

use tracing::trace;

use crate::auth_context::{
    AuthContext, SSL_SESSION_REUSED_PROPERTY, SSL_TRANSPORT_SECURITY_TYPE,
    TRANSPORT_SECURITY_TYPE_PROPERTY_NAME, X509_CN_PROPERTY_NAME, X509_PEM_CERT_PROPERTY_NAME,
    X509_SAN_PROPERTY_NAME,
};
use crate::peer::{
    Peer, PeerProperty, SSL_SESSION_REUSED_PEER_PROPERTY, X509_PEM_CERT_PROPERTY,
    X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY, X509_SUBJECT_COMMON_NAME_PEER_PROPERTY,
};

/// Build the authentication context for a verified peer.
///
/// A SAN always becomes the peer identity; the CN is the identity only when
/// the peer has no SAN.  Session reuse and the PEM certificate are recorded
/// but never identify the peer.
///
/// # Panics
///
/// Panics if `peer` has no properties; callers check the certificate type
/// property first.
#[must_use]
pub fn build_auth_context(peer: &Peer<'_>) -> Arc<AuthContext> {
    assert!(
        !peer.is_empty(),
        "peer must carry at least its certificate type property"
    );

    let mut ctx = AuthContext::new();
    ctx.add_cstring_property(
        TRANSPORT_SECURITY_TYPE_PROPERTY_NAME,
        SSL_TRANSPORT_SECURITY_TYPE,
    );

    let mut identity_name: Option<&'static str> = None;
    for prop in peer.properties() {
        let Some(name) = prop.name() else { continue };
        match name {
            X509_SUBJECT_COMMON_NAME_PEER_PROPERTY => {
                if identity_name.is_none() {
                    identity_name = Some(X509_CN_PROPERTY_NAME);
                }
                ctx.add_property(X509_CN_PROPERTY_NAME, prop.value());
            }
            X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY => {
                identity_name = Some(X509_SAN_PROPERTY_NAME);
                ctx.add_property(X509_SAN_PROPERTY_NAME, prop.value());
            }
            X509_PEM_CERT_PROPERTY => {
                ctx.add_property(X509_PEM_CERT_PROPERTY_NAME, prop.value());
            }
            SSL_SESSION_REUSED_PEER_PROPERTY => {
                ctx.add_property(SSL_SESSION_REUSED_PROPERTY, prop.value());
            }
            other => trace!(property = other, "Skipping peer property"),
        }
    }

    if let Some(name) = identity_name {
        assert!(
            ctx.set_peer_identity_property_name(name),
            "identity property {name} was added but cannot be designated"
        );
    }

    Arc::new(ctx)
}

/// Borrowed peer view over an authentication context.
///
/// Only SAN, CN and PEM-certificate properties are mapped back; the
/// session-reused flag is not part of the view.  The returned peer cannot
/// outlive `ctx`, and dropping it releases only the property list.
#[must_use]
pub fn to_shallow_peer(ctx: &AuthContext) -> Peer<'_> {
    let max_props = ctx.property_count();
    let mut peer = Peer::with_capacity(max_props);
    if max_props == 0 {
        return peer;
    }

    for prop in ctx.properties() {
        let peer_name = match prop.name() {
            X509_SAN_PROPERTY_NAME => X509_SUBJECT_ALTERNATIVE_NAME_PEER_PROPERTY,
            X509_CN_PROPERTY_NAME => X509_SUBJECT_COMMON_NAME_PEER_PROPERTY,
            X509_PEM_CERT_PROPERTY_NAME => X509_PEM_CERT_PROPERTY,
            _ => continue,
        };
        peer.push(PeerProperty::new(peer_name, prop.value()));
    }
    peer
}
