//! End-to-end handshake tests
//!
//! Drives client and server handshakers built by the factory helpers over an
//! in-memory transport and checks:
//! - ALPN negotiation over the shared protocol list
//! - Client certificate request modes
//! - Peer identity and call-host authorisation from the handshake result
//! - Session resumption through the shared cache

use pretty_assertions::assert_eq;
use rcgen::{CertificateParams, KeyPair};
use rustls::{ClientConnection, HandshakeKind, ServerConnection};

use ssl_trust::alpn;
use ssl_trust::auth_context::X509_SAN_PROPERTY_NAME;
use ssl_trust::handshake::{client_handshaker_factory_init, server_handshaker_factory_init};
use ssl_trust::name_matcher::{check_alpn, check_call_host, check_peer_name};
use ssl_trust::peer::SSL_ALPN_SELECTED_PROTOCOL;
use ssl_trust::{
    ClientCertificateRequestType, Error, PemKeyCertPair, Peer, PeerProperty, SessionCacheHandle,
    build_auth_context, to_shallow_peer,
};

fn identity(names: &[&str]) -> PemKeyCertPair {
    let params =
        CertificateParams::new(names.iter().map(|n| (*n).to_string()).collect::<Vec<_>>())
            .unwrap();
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    PemKeyCertPair::new(key.serialize_pem(), cert.pem())
}

/// Move records between the two ends until neither has anything to send.
fn pump(client: &mut ClientConnection, server: &mut ServerConnection) -> Result<(), rustls::Error> {
    loop {
        let mut progressed = false;

        while client.wants_write() {
            let mut buf = Vec::new();
            client.write_tls(&mut buf).unwrap();
            let mut rd = &buf[..];
            while !rd.is_empty() {
                server.read_tls(&mut rd).unwrap();
            }
            server.process_new_packets()?;
            progressed = true;
        }

        while server.wants_write() {
            let mut buf = Vec::new();
            server.write_tls(&mut buf).unwrap();
            let mut rd = &buf[..];
            while !rd.is_empty() {
                client.read_tls(&mut rd).unwrap();
            }
            client.process_new_packets()?;
            progressed = true;
        }

        if !progressed {
            return Ok(());
        }
    }
}

#[test]
fn test_handshake_negotiates_preferred_alpn() {
    let server_id = identity(&["server.test"]);
    let server = server_handshaker_factory_init(
        std::slice::from_ref(&server_id),
        None,
        ClientCertificateRequestType::DontRequestClientCertificate,
        None,
    )
    .unwrap();
    let client =
        client_handshaker_factory_init(None, Some(server_id.cert_chain.as_bytes()), None).unwrap();

    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    pump(&mut c, &mut s).unwrap();

    assert!(!c.is_handshaking());
    assert!(!s.is_handshaking());
    let selected = c.alpn_protocol().unwrap().to_vec();
    assert_eq!(selected, alpn::SUPPORTED_VERSIONS[0].as_bytes().to_vec());
    assert_eq!(s.alpn_protocol(), Some(&selected[..]));

    let peer = Peer::from_properties(vec![PeerProperty::new(SSL_ALPN_SELECTED_PROTOCOL, selected)]);
    assert!(check_alpn(&peer).is_ok());
}

#[test]
fn test_server_identity_authorises_call_host() {
    // GIVEN: a completed handshake with a server certificate for two names
    let server_id = identity(&["server.test", "*.alt.test"]);
    let server = server_handshaker_factory_init(
        std::slice::from_ref(&server_id),
        None,
        ClientCertificateRequestType::DontRequestClientCertificate,
        None,
    )
    .unwrap();
    let client =
        client_handshaker_factory_init(None, Some(server_id.cert_chain.as_bytes()), None).unwrap();
    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    pump(&mut c, &mut s).unwrap();

    // WHEN: the client builds the server's auth context
    let leaf = &c.peer_certificates().unwrap()[0];
    let peer = Peer::from_certificate_der(leaf, c.handshake_kind() == Some(HandshakeKind::Resumed))
        .unwrap();
    let ctx = build_auth_context(&peer);

    // THEN: SANs identify the server
    assert_eq!(ctx.peer_identity_property_name(), Some(X509_SAN_PROPERTY_NAME));
    assert!(check_peer_name("server.test", &peer).is_ok());
    assert!(check_peer_name("", &peer).is_ok());
    assert!(matches!(
        check_peer_name("other.test", &peer),
        Err(Error::PeerNameMismatch(name)) if name == "other.test"
    ));

    // AND: call hosts are authorised against those names
    assert!(check_call_host("server.test:443", "server.test", "", &ctx).is_ok());
    assert!(check_call_host("api.alt.test", "server.test", "", &ctx).is_ok());
    assert!(matches!(
        check_call_host("evil.test", "server.test", "", &ctx),
        Err(Error::CallHostMismatch)
    ));
    assert!(check_call_host("server.test", "server.test", "other.test", &ctx).is_ok());

    // AND: the shallow peer sees the same names
    let shallow = to_shallow_peer(&ctx);
    assert!(check_peer_name("server.test", &shallow).is_ok());
}

#[test]
fn test_required_client_certificate_is_enforced() {
    let server_id = identity(&["server.test"]);
    let server = server_handshaker_factory_init(
        std::slice::from_ref(&server_id),
        None,
        ClientCertificateRequestType::RequestAndRequireClientCertificateButDontVerify,
        None,
    )
    .unwrap();
    let client =
        client_handshaker_factory_init(None, Some(server_id.cert_chain.as_bytes()), None).unwrap();

    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    assert!(pump(&mut c, &mut s).is_err());
}

#[test]
fn test_verified_client_certificate_identifies_client() {
    // GIVEN: a server that requires and verifies client certificates
    let server_id = identity(&["server.test"]);
    let client_id = identity(&["client.test"]);
    let server = server_handshaker_factory_init(
        std::slice::from_ref(&server_id),
        Some(client_id.cert_chain.as_bytes()),
        ClientCertificateRequestType::RequestAndRequireClientCertificateAndVerify,
        None,
    )
    .unwrap();
    let client = client_handshaker_factory_init(
        Some(&client_id),
        Some(server_id.cert_chain.as_bytes()),
        None,
    )
    .unwrap();

    // WHEN: the handshake completes
    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    pump(&mut c, &mut s).unwrap();

    // THEN: the server sees the client's SAN as its identity
    let leaf = &s.peer_certificates().unwrap()[0];
    let ctx = build_auth_context(&Peer::from_certificate_der(leaf, false).unwrap());
    let ids: Vec<&str> = ctx.peer_identity().filter_map(|p| p.value_str()).collect();
    assert_eq!(ids, vec!["client.test"]);
}

#[test]
fn test_untrusted_client_certificate_is_rejected() {
    let server_id = identity(&["server.test"]);
    let trusted = identity(&["client.test"]);
    let stranger = identity(&["client.test"]);
    let server = server_handshaker_factory_init(
        std::slice::from_ref(&server_id),
        Some(trusted.cert_chain.as_bytes()),
        ClientCertificateRequestType::RequestAndRequireClientCertificateAndVerify,
        None,
    )
    .unwrap();
    let client = client_handshaker_factory_init(
        Some(&stranger),
        Some(server_id.cert_chain.as_bytes()),
        None,
    )
    .unwrap();

    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    assert!(pump(&mut c, &mut s).is_err());
}

#[test]
fn test_server_selects_certificate_by_sni() {
    let a = identity(&["a.test"]);
    let b = identity(&["b.test"]);
    let server = server_handshaker_factory_init(
        &[a.clone(), b.clone()],
        None,
        ClientCertificateRequestType::DontRequestClientCertificate,
        None,
    )
    .unwrap();
    let roots = format!("{}{}", a.cert_chain, b.cert_chain);
    let client = client_handshaker_factory_init(None, Some(roots.as_bytes()), None).unwrap();

    for name in ["a.test", "b.test"] {
        let mut c = client.create_handshaker(name).unwrap();
        let mut s = server.create_handshaker().unwrap();
        pump(&mut c, &mut s).unwrap();

        let peer = Peer::from_certificate_der(&c.peer_certificates().unwrap()[0], false).unwrap();
        assert!(check_peer_name(name, &peer).is_ok(), "wrong certificate for {name}");
    }
}

#[test]
fn test_session_cache_enables_resumption() {
    // GIVEN: client and server factories sharing their own caches
    let server_id = identity(&["server.test"]);
    let server_cache = SessionCacheHandle::create_lru(16);
    let client_cache = SessionCacheHandle::create_lru(16);
    let server = server_handshaker_factory_init(
        std::slice::from_ref(&server_id),
        None,
        ClientCertificateRequestType::DontRequestClientCertificate,
        Some(&server_cache),
    )
    .unwrap();
    let client = client_handshaker_factory_init(
        None,
        Some(server_id.cert_chain.as_bytes()),
        Some(&client_cache),
    )
    .unwrap();

    // WHEN: connecting twice
    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    pump(&mut c, &mut s).unwrap();
    assert_eq!(c.handshake_kind(), Some(HandshakeKind::Full));
    assert!(server_cache.server_session_count() > 0);

    let mut c = client.create_handshaker("server.test").unwrap();
    let mut s = server.create_handshaker().unwrap();
    pump(&mut c, &mut s).unwrap();

    // THEN: the second handshake resumes
    assert_eq!(c.handshake_kind(), Some(HandshakeKind::Resumed));
}
