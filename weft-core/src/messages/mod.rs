//! Handshake message catalog.
//!
//! Every handshake message is a case of [`HandshakeMessage`]. Encoding
//! always produces the 4-byte handshake header followed by the body;
//! decoding takes the raw bytes of one framed message, as yielded by
//! [`HandshakeFrame`], and a [`DecodeContext`] describing what has been
//! negotiated so far, since several bodies change layout with the version
//! or key exchange.

pub mod certificate;
pub mod certificate_request;
pub mod client_hello;
pub mod key_exchange;
pub mod new_session_ticket;
pub mod server_hello;

pub use certificate::{Certificate, CertificateEntry};
pub use certificate_request::CertificateRequest;
pub use client_hello::ClientHello;
pub use key_exchange::{ClientKeyExchange, ServerKeyExchange, ServerKeyExchangeParams};
pub use new_session_ticket::{NewSessionTicket, MAX_TICKET_LIFETIME};
pub use server_hello::{HelloRetryRequest, ServerHello, ServerHelloKind};

use bytes::{Buf, BufMut, BytesMut};

use crate::cipher::KeyExchangeMethod;
use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionContext, Extensions};
use crate::protocol::{HandshakeType, SignatureScheme};

/// Largest handshake message accepted from a peer.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize = 1 << 17;

/// What the decoder needs to know about the negotiation so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeContext {
    /// TLS 1.3 has been negotiated
    pub tls13: bool,

    /// Key exchange of the negotiated TLS 1.2 suite
    pub key_exchange: Option<KeyExchangeMethod>,
}

/// A decoded handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    /// HelloRequest (TLS 1.2 renegotiation trigger)
    HelloRequest,
    /// ClientHello
    ClientHello(ClientHello),
    /// ServerHello
    ServerHello(ServerHello),
    /// HelloRetryRequest (wire type ServerHello)
    HelloRetryRequest(HelloRetryRequest),
    /// NewSessionTicket (TLS 1.3)
    NewSessionTicket(NewSessionTicket),
    /// EndOfEarlyData (TLS 1.3)
    EndOfEarlyData,
    /// EncryptedExtensions (TLS 1.3)
    EncryptedExtensions(Extensions),
    /// Certificate
    Certificate(Certificate),
    /// ServerKeyExchange (TLS 1.2)
    ServerKeyExchange(ServerKeyExchange),
    /// CertificateRequest
    CertificateRequest(CertificateRequest),
    /// ServerHelloDone (TLS 1.2)
    ServerHelloDone,
    /// CertificateVerify
    CertificateVerify {
        /// Signature scheme
        scheme: SignatureScheme,
        /// Signature over the transcript
        signature: Vec<u8>,
    },
    /// ClientKeyExchange (TLS 1.2)
    ClientKeyExchange(ClientKeyExchange),
    /// Finished
    Finished(Vec<u8>),
    /// KeyUpdate (TLS 1.3)
    KeyUpdate {
        /// Peer must answer with its own KeyUpdate
        update_requested: bool,
    },
}

impl HandshakeMessage {
    /// Wire type of this message.
    pub fn typ(&self) -> HandshakeType {
        match self {
            HandshakeMessage::HelloRequest => HandshakeType::HelloRequest,
            HandshakeMessage::ClientHello(_) => HandshakeType::ClientHello,
            HandshakeMessage::ServerHello(_) | HandshakeMessage::HelloRetryRequest(_) => {
                HandshakeType::ServerHello
            },
            HandshakeMessage::NewSessionTicket(_) => HandshakeType::NewSessionTicket,
            HandshakeMessage::EndOfEarlyData => HandshakeType::EndOfEarlyData,
            HandshakeMessage::EncryptedExtensions(_) => HandshakeType::EncryptedExtensions,
            HandshakeMessage::Certificate(_) => HandshakeType::Certificate,
            HandshakeMessage::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            HandshakeMessage::CertificateRequest(_) => HandshakeType::CertificateRequest,
            HandshakeMessage::ServerHelloDone => HandshakeType::ServerHelloDone,
            HandshakeMessage::CertificateVerify { .. } => HandshakeType::CertificateVerify,
            HandshakeMessage::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            HandshakeMessage::Finished(_) => HandshakeType::Finished,
            HandshakeMessage::KeyUpdate { .. } => HandshakeType::KeyUpdate,
        }
    }

    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            HandshakeMessage::HelloRetryRequest(_) => "HelloRetryRequest",
            other => type_name(other.typ()),
        }
    }

    /// Header and body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_u8(self.typ().to_u8());
        buf.put_nested_u24(|b| self.encode_body(b));
        buf.to_vec()
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            HandshakeMessage::HelloRequest
            | HandshakeMessage::EndOfEarlyData
            | HandshakeMessage::ServerHelloDone => {},
            HandshakeMessage::ClientHello(m) => m.encode(buf),
            HandshakeMessage::ServerHello(m) => m.encode(buf),
            HandshakeMessage::HelloRetryRequest(m) => m.encode(buf),
            HandshakeMessage::NewSessionTicket(m) => m.encode(buf),
            HandshakeMessage::EncryptedExtensions(exts) => exts.encode(buf),
            HandshakeMessage::Certificate(m) => m.encode(buf),
            HandshakeMessage::ServerKeyExchange(m) => m.encode(buf),
            HandshakeMessage::CertificateRequest(m) => m.encode(buf),
            HandshakeMessage::CertificateVerify { scheme, signature } => {
                buf.put_u16(scheme.to_u16());
                buf.put_vec_u16(signature);
            },
            HandshakeMessage::ClientKeyExchange(m) => m.encode(buf),
            HandshakeMessage::Finished(verify_data) => buf.put_slice(verify_data),
            HandshakeMessage::KeyUpdate { update_requested } => {
                buf.put_u8(u8::from(*update_requested))
            },
        }
    }

    /// Decode one framed message (header included).
    pub fn decode(raw: &[u8], ctx: &DecodeContext) -> Result<Self> {
        let mut r = Reader::new(raw);
        let typ_byte = r.u8()?;
        let body = r.vec_u24()?;
        r.expect_end("handshake message")?;

        let typ = HandshakeType::from_u8(typ_byte).ok_or_else(|| {
            Error::UnexpectedMessage(format!("unknown handshake type {}", typ_byte))
        })?;

        let message = match typ {
            HandshakeType::HelloRequest => {
                expect_empty(body, "HelloRequest")?;
                HandshakeMessage::HelloRequest
            },
            HandshakeType::ClientHello => HandshakeMessage::ClientHello(ClientHello::decode(body)?),
            HandshakeType::ServerHello => match server_hello::decode(body)? {
                ServerHelloKind::Hello(m) => HandshakeMessage::ServerHello(m),
                ServerHelloKind::Retry(m) => HandshakeMessage::HelloRetryRequest(m),
            },
            HandshakeType::NewSessionTicket => {
                if !ctx.tls13 {
                    return Err(Error::UnexpectedMessage(
                        "NewSessionTicket outside TLS 1.3".into(),
                    ));
                }
                HandshakeMessage::NewSessionTicket(NewSessionTicket::decode(body)?)
            },
            HandshakeType::EndOfEarlyData => {
                expect_empty(body, "EndOfEarlyData")?;
                HandshakeMessage::EndOfEarlyData
            },
            HandshakeType::EncryptedExtensions => {
                let mut r = Reader::new(body);
                let exts = Extensions::decode(&mut r, ExtensionContext::EncryptedExtensions)?;
                r.expect_end("EncryptedExtensions")?;
                HandshakeMessage::EncryptedExtensions(exts)
            },
            HandshakeType::Certificate => {
                HandshakeMessage::Certificate(Certificate::decode(body, ctx.tls13)?)
            },
            HandshakeType::ServerKeyExchange => {
                let method = ctx.key_exchange.ok_or_else(|| {
                    Error::UnexpectedMessage("ServerKeyExchange before ServerHello".into())
                })?;
                HandshakeMessage::ServerKeyExchange(ServerKeyExchange::decode(body, method)?)
            },
            HandshakeType::CertificateRequest => HandshakeMessage::CertificateRequest(
                CertificateRequest::decode(body, ctx.tls13)?,
            ),
            HandshakeType::ServerHelloDone => {
                expect_empty(body, "ServerHelloDone")?;
                HandshakeMessage::ServerHelloDone
            },
            HandshakeType::CertificateVerify => {
                let mut r = Reader::new(body);
                let scheme = SignatureScheme::from_u16(r.u16()?);
                let signature = r.vec_u16()?.to_vec();
                r.expect_end("CertificateVerify")?;
                HandshakeMessage::CertificateVerify { scheme, signature }
            },
            HandshakeType::ClientKeyExchange => {
                let method = ctx.key_exchange.ok_or_else(|| {
                    Error::UnexpectedMessage("ClientKeyExchange before ServerHello".into())
                })?;
                HandshakeMessage::ClientKeyExchange(ClientKeyExchange::decode(body, method)?)
            },
            HandshakeType::Finished => {
                if body.is_empty() {
                    return Err(Error::decode("empty Finished"));
                }
                HandshakeMessage::Finished(body.to_vec())
            },
            HandshakeType::KeyUpdate => match body {
                [0] => HandshakeMessage::KeyUpdate {
                    update_requested: false,
                },
                [1] => HandshakeMessage::KeyUpdate {
                    update_requested: true,
                },
                [_] => {
                    return Err(Error::IllegalParameter(
                        "invalid KeyUpdateRequest".into(),
                    ))
                },
                _ => return Err(Error::decode("KeyUpdate must be one byte")),
            },
            HandshakeType::MessageHash => {
                return Err(Error::UnexpectedMessage("message_hash on the wire".into()))
            },
        };
        Ok(message)
    }
}

fn expect_empty(body: &[u8], what: &str) -> Result<()> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(Error::decode(format!("{} must be empty", what)))
    }
}

/// Name of a handshake type.
pub fn type_name(typ: HandshakeType) -> &'static str {
    match typ {
        HandshakeType::HelloRequest => "HelloRequest",
        HandshakeType::ClientHello => "ClientHello",
        HandshakeType::ServerHello => "ServerHello",
        HandshakeType::NewSessionTicket => "NewSessionTicket",
        HandshakeType::EndOfEarlyData => "EndOfEarlyData",
        HandshakeType::EncryptedExtensions => "EncryptedExtensions",
        HandshakeType::Certificate => "Certificate",
        HandshakeType::ServerKeyExchange => "ServerKeyExchange",
        HandshakeType::CertificateRequest => "CertificateRequest",
        HandshakeType::ServerHelloDone => "ServerHelloDone",
        HandshakeType::CertificateVerify => "CertificateVerify",
        HandshakeType::ClientKeyExchange => "ClientKeyExchange",
        HandshakeType::Finished => "Finished",
        HandshakeType::KeyUpdate => "KeyUpdate",
        HandshakeType::MessageHash => "message_hash",
    }
}

/// Reassembles handshake messages from the handshake record stream.
///
/// Records and messages are independent: one record may carry several
/// messages and one message may span several records. Complete messages
/// are returned with their header so the transcript sees the exact bytes.
#[derive(Debug, Default)]
pub struct HandshakeFrame {
    buf: BytesMut,
}

impl HandshakeFrame {
    /// Create an empty deframer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the plaintext of one handshake record.
    pub fn push(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    /// Pop the next complete message, if one is buffered.
    pub fn pop(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([0, self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_HANDSHAKE_MESSAGE_LEN {
            return Err(Error::decode(format!(
                "handshake message of {} bytes exceeds limit",
                len
            )));
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }
        let raw = self.buf.split_to(4 + len).to_vec();
        Ok(Some(raw))
    }

    /// True when no partial message is buffered.
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Drop any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherSuite;
    use crate::protocol::ProtocolVersion;

    fn round_trip(message: HandshakeMessage, ctx: DecodeContext) {
        let raw = message.encode();
        let decoded = HandshakeMessage::decode(&raw, &ctx).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.encode(), raw);
    }

    #[test]
    fn test_simple_messages_round_trip() {
        let tls13 = DecodeContext {
            tls13: true,
            key_exchange: None,
        };
        round_trip(HandshakeMessage::HelloRequest, DecodeContext::default());
        round_trip(HandshakeMessage::ServerHelloDone, DecodeContext::default());
        round_trip(HandshakeMessage::EndOfEarlyData, tls13);
        round_trip(HandshakeMessage::Finished(vec![0x5a; 12]), DecodeContext::default());
        round_trip(
            HandshakeMessage::KeyUpdate {
                update_requested: true,
            },
            tls13,
        );
        round_trip(HandshakeMessage::EncryptedExtensions(Extensions::new()), tls13);
        round_trip(
            HandshakeMessage::CertificateVerify {
                scheme: SignatureScheme::Ed25519,
                signature: vec![3; 64],
            },
            tls13,
        );
        round_trip(
            HandshakeMessage::ClientKeyExchange(ClientKeyExchange::Dhe(vec![1; 256])),
            DecodeContext {
                tls13: false,
                key_exchange: Some(KeyExchangeMethod::Dhe),
            },
        );
    }

    #[test]
    fn test_header_encoding() {
        let raw = HandshakeMessage::Finished(vec![1; 12]).encode();
        assert_eq!(&raw[..4], &[20, 0, 0, 12]);
        assert_eq!(HandshakeMessage::ServerHelloDone.encode(), vec![14, 0, 0, 0]);
    }

    #[test]
    fn test_hello_with_empty_session_id() {
        let hello = ServerHello::new(
            ProtocolVersion::Tls12,
            [8; 32],
            Vec::new(),
            CipherSuite::RsaWithAes256CbcSha256,
        );
        round_trip(HandshakeMessage::ServerHello(hello), DecodeContext::default());
    }

    #[test]
    fn test_decode_rejections() {
        let ctx = DecodeContext::default();
        // length field disagrees with the body
        assert!(matches!(
            HandshakeMessage::decode(&[20, 0, 0, 12, 1, 2], &ctx),
            Err(Error::Decode(_))
        ));
        // unknown type
        assert!(matches!(
            HandshakeMessage::decode(&[99, 0, 0, 0], &ctx),
            Err(Error::UnexpectedMessage(_))
        ));
        // key exchange messages need a negotiated suite
        assert!(matches!(
            HandshakeMessage::decode(&[16, 0, 0, 1, 0], &ctx),
            Err(Error::UnexpectedMessage(_))
        ));
        assert!(matches!(
            HandshakeMessage::decode(&[24, 0, 0, 1, 2], &ctx),
            Err(Error::IllegalParameter(_))
        ));
        assert!(matches!(
            HandshakeMessage::decode(&[14, 0, 0, 1, 0], &ctx),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_frame_reassembles_split_and_coalesced_messages() {
        let first = HandshakeMessage::Finished(vec![7; 12]).encode();
        let second = HandshakeMessage::ServerHelloDone.encode();

        let mut frame = HandshakeFrame::new();
        frame.push(&first[..5]);
        assert_eq!(frame.pop().unwrap(), None);
        let mut rest = first[5..].to_vec();
        rest.extend_from_slice(&second);
        frame.push(&rest);

        assert_eq!(frame.pop().unwrap(), Some(first));
        assert_eq!(frame.pop().unwrap(), Some(second));
        assert_eq!(frame.pop().unwrap(), None);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_frame_rejects_oversized_message() {
        let mut frame = HandshakeFrame::new();
        frame.push(&[11, 0xff, 0xff, 0xff]);
        assert!(matches!(frame.pop(), Err(Error::Decode(_))));
    }
}
