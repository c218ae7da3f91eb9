//! End-to-end handshake tests against a scripted server.
//!
//! These run the real client over real sockets: a listener thread plays
//! the server side of the connection phase and reports what it saw, so
//! the tests can assert on actual wire bytes, packet ordering and the
//! sequence counter across the TLS upgrade.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use myconn::{AuthPlugin, CapabilityFlags, ClientConfig, Conn, ConnError, TlsOptions};

const SCRAMBLE_PART_1: &[u8; 8] = b"abcdefgh";
const SCRAMBLE_PART_2: &[u8; 12] = b"ijklmnopqrst";

fn frame(seq: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes()[..3]);
    out.push(seq);
    out.extend_from_slice(payload);
    out
}

fn read_frame(stream: &mut impl Read) -> (u8, Vec<u8>) {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).unwrap();
    (header[3], payload)
}

/// HandshakeV10 payload with a 20-byte scramble and the given flags.
fn greeting_payload(caps: u32, plugin: &str) -> Vec<u8> {
    let mut out = vec![10];
    out.extend_from_slice(b"8.0.32\0");
    out.extend_from_slice(&42u32.to_le_bytes());
    out.extend_from_slice(SCRAMBLE_PART_1);
    out.push(0);
    out.extend_from_slice(&(caps as u16).to_le_bytes());
    out.push(45);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
    out.push(21); // auth plugin data length
    out.extend_from_slice(&[0u8; 10]);
    out.extend_from_slice(SCRAMBLE_PART_2);
    out.push(0);
    out.extend_from_slice(plugin.as_bytes());
    out.push(0);
    out
}

fn base_caps() -> u32 {
    CapabilityFlags::PROTOCOL_41
        | CapabilityFlags::SECURE_CONNECTION
        | CapabilityFlags::PLUGIN_AUTH
}

#[test]
fn test_plain_handshake_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .write_all(&frame(
                0,
                &greeting_payload(base_caps(), "mysql_native_password"),
            ))
            .unwrap();
        tx.send(read_frame(&mut stream)).unwrap();
    });

    let config = ClientConfig::new("app", "secret")
        .with_database("orders")
        .with_attribute("_client_name", "myconn");
    let conn = Conn::establish(TcpStream::connect(addr).unwrap(), config).unwrap();

    assert_eq!(conn.server_version(), "8.0.32");
    assert_eq!(conn.connection_id(), 42);
    assert_eq!(conn.auth_plugin(), "mysql_native_password");
    assert_eq!(conn.status_flags(), Some(2));
    assert!(!conn.is_tls());

    let (seq, payload) = rx.recv().unwrap();
    server.join().unwrap();

    // The response is the second packet of the exchange.
    assert_eq!(seq, 1);

    // Capability flags the client answered with.
    let caps = CapabilityFlags::from_bits(u32::from_le_bytes(payload[..4].try_into().unwrap()));
    assert_eq!(caps, conn.capability());
    assert!(caps.has(CapabilityFlags::CONNECT_WITH_DB));
    assert!(caps.has(CapabilityFlags::CONNECT_ATTRS));
    assert!(!caps.has(CapabilityFlags::SSL));

    // Username starts right after the 32-byte prefix.
    assert_eq!(&payload[32..36], b"app\0");

    // The auth field is the native hash of the full 20-byte scramble.
    let mut scramble = SCRAMBLE_PART_1.to_vec();
    scramble.extend_from_slice(SCRAMBLE_PART_2);
    let expected = AuthPlugin::Native
        .generate(&scramble, "secret", false, false)
        .unwrap();
    assert_eq!(payload[36] as usize, expected.data.len());
    assert_eq!(&payload[37..57], &expected.data[..]);

    // Database follows, then the plugin name.
    assert_eq!(&payload[57..64], b"orders\0");
    assert_eq!(&payload[64..86], b"mysql_native_password\0");
}

#[test]
fn test_err_packet_instead_of_greeting() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut payload = vec![0xff, 0x10, 0x04];
        payload.extend_from_slice(b"Too many connections");
        stream.write_all(&frame(0, &payload)).unwrap();
    });

    let err = Conn::establish(
        TcpStream::connect(addr).unwrap(),
        ClientConfig::new("app", "secret"),
    )
    .unwrap_err();
    server.join().unwrap();

    match err {
        ConnError::ServerError { code, message, .. } => {
            assert_eq!(code, 1040);
            assert_eq!(message, "Too many connections");
        }
        other => panic!("expected ServerError, got {other:?}"),
    }
}

#[test]
fn test_tls_upgrade_preserves_sequence() {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = cert.serialize_der().unwrap();
    let key_der = cert.serialize_private_key_der();

    let server_config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(
            vec![rustls::Certificate(cert_der)],
            rustls::PrivateKey(key_der),
        )
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .write_all(&frame(
                0,
                &greeting_payload(
                    base_caps() | CapabilityFlags::SSL,
                    "caching_sha2_password",
                ),
            ))
            .unwrap();

        // SSLRequest arrives on the plain stream before any TLS bytes.
        let (ssl_seq, ssl_payload) = read_frame(&mut stream);

        // Only then does the TLS handshake run on the raw socket.
        let mut tls_conn = rustls::ServerConnection::new(Arc::new(server_config)).unwrap();
        while tls_conn.is_handshaking() {
            tls_conn.complete_io(&mut stream).unwrap();
        }
        let mut tls = rustls::StreamOwned::new(tls_conn, stream);

        // The full response continues the same packet sequence.
        let (resp_seq, resp_payload) = read_frame(&mut tls);
        tx.send((ssl_seq, ssl_payload, resp_seq, resp_payload))
            .unwrap();
    });

    let config =
        ClientConfig::new("app", "secret").with_tls(TlsOptions::insecure("localhost"));
    let conn = Conn::establish(TcpStream::connect(addr).unwrap(), config).unwrap();
    assert!(conn.is_tls());

    let (ssl_seq, ssl_payload, resp_seq, resp_payload) = rx.recv().unwrap();
    server.join().unwrap();

    // The SSLRequest is the fixed prefix only.
    assert_eq!(ssl_seq, 1);
    assert_eq!(ssl_payload.len(), 32);
    let ssl_caps =
        CapabilityFlags::from_bits(u32::from_le_bytes(ssl_payload[..4].try_into().unwrap()));
    assert!(ssl_caps.has(CapabilityFlags::SSL));

    // Exactly one sequence step between the SSLRequest and the response.
    assert_eq!(resp_seq, ssl_seq + 1);

    // The response repeats the prefix and carries the credentials.
    assert_eq!(&resp_payload[..32], &ssl_payload[..]);
    assert_eq!(&resp_payload[32..36], b"app\0");

    // Under caching_sha2 the auth field hashes the full scramble.
    let mut scramble = SCRAMBLE_PART_1.to_vec();
    scramble.extend_from_slice(SCRAMBLE_PART_2);
    let expected = AuthPlugin::CachingSha2
        .generate(&scramble, "secret", true, false)
        .unwrap();
    assert_eq!(resp_payload[36] as usize, expected.data.len());
    assert_eq!(&resp_payload[37..69], &expected.data[..]);
}

#[test]
fn test_tls_refused_when_server_lacks_ssl() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .write_all(&frame(
                0,
                &greeting_payload(base_caps(), "mysql_native_password"),
            ))
            .unwrap();
    });

    let config =
        ClientConfig::new("app", "secret").with_tls(TlsOptions::insecure("localhost"));
    let err = Conn::establish(TcpStream::connect(addr).unwrap(), config).unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, ConnError::TlsUnsupportedByServer));
}
