//! Alert and malformed input tests
//!
//! A real connection talks to a scripted peer that writes raw bytes:
//! - corrupted handshake and record lengths fail fast instead of hanging
//! - every local failure sends the matching fatal alert
//! - a peer that hangs up mid-handshake gives ConnectionClosed

mod common;

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use common::*;
use weft_core::{AlertDescription, Connection, Error, Result};

const ALERT: u8 = 21;
const HANDSHAKE: u8 = 22;

fn read_raw_record(stream: &mut UnixStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).expect("record header");
    let len = u16::from_be_bytes([header[3], header[4]]) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).expect("record body");
    (header[0], body)
}

/// Client against a peer that answers the ClientHello with `reply`, then
/// reports the alert it got back.
fn client_against_script(reply: &'static [u8]) -> (Result<()>, Option<u8>) {
    let client = build(client_config());
    run_pair(
        move |stream| {
            let mut conn = Connection::client(client, stream);
            conn.connect()
        },
        move |mut stream| {
            let (typ, body) = read_raw_record(&mut stream);
            assert_eq!(typ, HANDSHAKE);
            assert_eq!(body[0], 1, "ClientHello expected");
            stream.write_all(reply).expect("scripted reply");
            let (typ, body) = read_raw_record(&mut stream);
            assert_eq!(typ, ALERT);
            assert_eq!(body[0], 2, "fatal level");
            Some(body[1])
        },
    )
}

#[test]
fn test_truncated_server_hello_is_decode_error() {
    // ServerHello claiming a two byte body: no room for the random.
    let reply: &[u8] = &[HANDSHAKE, 3, 3, 0, 6, 2, 0, 0, 2, 3, 3];
    let (client, alert) = client_against_script(reply);
    assert!(matches!(client, Err(Error::Decode(_))), "client: {:?}", client);
    assert_eq!(alert, Some(AlertDescription::DecodeError as u8));
}

#[test]
fn test_oversized_handshake_length_is_decode_error() {
    // A 16 MiB ServerHello would otherwise be waited for forever.
    let reply: &[u8] = &[HANDSHAKE, 3, 3, 0, 4, 2, 0xff, 0xff, 0xff];
    let (client, alert) = client_against_script(reply);
    assert!(matches!(client, Err(Error::Decode(_))), "client: {:?}", client);
    assert_eq!(alert, Some(AlertDescription::DecodeError as u8));
}

#[test]
fn test_oversized_record_length_is_record_overflow() {
    let reply: &[u8] = &[HANDSHAKE, 3, 3, 0xff, 0xff];
    let (client, alert) = client_against_script(reply);
    assert!(matches!(client, Err(Error::RecordOverflow(0xffff))), "client: {:?}", client);
    assert_eq!(alert, Some(AlertDescription::RecordOverflow as u8));
}

#[test]
fn test_empty_handshake_record_is_decode_error() {
    let reply: &[u8] = &[HANDSHAKE, 3, 3, 0, 0];
    let (client, alert) = client_against_script(reply);
    assert!(matches!(client, Err(Error::Decode(_))), "client: {:?}", client);
    assert_eq!(alert, Some(AlertDescription::DecodeError as u8));
}

#[test]
fn test_unknown_content_type_is_decode_error() {
    let reply: &[u8] = &[99, 3, 3, 0, 1, 0];
    let (client, alert) = client_against_script(reply);
    assert!(matches!(client, Err(Error::Decode(_))), "client: {:?}", client);
    assert_eq!(alert, Some(AlertDescription::DecodeError as u8));
}

#[test]
fn test_fatal_alert_from_server() {
    let client = build(client_config());
    let (c, _) = run_pair(
        move |stream| {
            let mut conn = Connection::client(client, stream);
            let result = conn.connect();
            // The failure sticks.
            assert!(conn.write_application_data(b"x").is_err());
            result
        },
        |mut stream| {
            read_raw_record(&mut stream);
            stream
                .write_all(&[ALERT, 3, 3, 0, 2, 2, AlertDescription::HandshakeFailure as u8])
                .expect("alert");
        },
    );
    assert!(
        matches!(c, Err(Error::AlertReceived(AlertDescription::HandshakeFailure))),
        "client: {:?}",
        c
    );
}

#[test]
fn test_peer_hangs_up_mid_handshake() {
    let client = build(client_config());
    let (c, _) = run_pair(
        move |stream| {
            let mut conn = Connection::client(client, stream);
            conn.connect()
        },
        |mut stream| {
            read_raw_record(&mut stream);
            drop(stream);
        },
    );
    assert!(matches!(c, Err(Error::ConnectionClosed)), "client: {:?}", c);
}

#[test]
fn test_server_rejects_garbage_client_hello() {
    let server = build(server_config(ED25519_PEM));
    let (alert, s) = run_pair(
        |mut stream| {
            // ClientHello with a body too short for its version and random.
            stream
                .write_all(&[HANDSHAKE, 3, 1, 0, 6, 1, 0, 0, 2, 3, 3])
                .expect("garbage");
            let (typ, body) = read_raw_record(&mut stream);
            assert_eq!(typ, ALERT);
            body[1]
        },
        move |stream| {
            let mut conn = Connection::server(server, stream);
            conn.accept()
        },
    );
    assert!(matches!(s, Err(Error::Decode(_))), "server: {:?}", s);
    assert_eq!(alert, AlertDescription::DecodeError as u8);
}

#[test]
fn test_server_rejects_client_without_common_version() {
    let server = build(server_config(ED25519_PEM));
    let (alert, s) = run_pair(
        |mut stream| {
            // A TLS 1.0 ClientHello: legacy_version 3.1, no supported_versions.
            let mut hello = vec![3, 1];
            hello.extend_from_slice(&[0x11; 32]);
            hello.push(0); // session id
            hello.extend_from_slice(&[0, 2, 0x00, 0x2f]); // one suite
            hello.extend_from_slice(&[1, 0]); // null compression
            let mut message = vec![1, 0, 0, hello.len() as u8];
            message.extend_from_slice(&hello);
            let mut record = vec![HANDSHAKE, 3, 1, 0, message.len() as u8];
            record.extend_from_slice(&message);
            stream.write_all(&record).expect("hello");
            let (typ, body) = read_raw_record(&mut stream);
            assert_eq!(typ, ALERT);
            body[1]
        },
        move |stream| {
            let mut conn = Connection::server(server, stream);
            conn.accept()
        },
    );
    assert!(matches!(s, Err(Error::ProtocolVersion(_))), "server: {:?}", s);
    assert_eq!(alert, AlertDescription::ProtocolVersion as u8);
}
