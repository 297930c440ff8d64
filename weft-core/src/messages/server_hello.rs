//! ServerHello and HelloRetryRequest (RFC 5246 Section 7.4.1.3, RFC 8446 Section 4.1.3).
//!
//! Both share handshake type 2. A HelloRetryRequest is a ServerHello whose
//! random is the fixed [`HELLO_RETRY_REQUEST_RANDOM`].

use bytes::{BufMut, BytesMut};

use crate::cipher::CipherSuite;
use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionContext, Extensions};
use crate::protocol::{ProtocolVersion, DOWNGRADE_TLS12_SENTINEL, HELLO_RETRY_REQUEST_RANDOM};

/// ServerHello message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Negotiated version for TLS 1.2, 0x0303 for TLS 1.3
    pub legacy_version: ProtocolVersion,

    /// Server random
    pub random: [u8; 32],

    /// Session ID (TLS 1.2) or echo of the client's (TLS 1.3)
    pub session_id: Vec<u8>,

    /// Selected suite
    pub cipher_suite: CipherSuite,

    /// Selected compression, always 0
    pub compression_method: u8,

    /// Extensions; omitted from the wire when empty
    pub extensions: Extensions,
}

impl ServerHello {
    /// Create a ServerHello with null compression and no extensions.
    pub fn new(
        legacy_version: ProtocolVersion,
        random: [u8; 32],
        session_id: Vec<u8>,
        cipher_suite: CipherSuite,
    ) -> Self {
        Self {
            legacy_version,
            random,
            session_id,
            cipher_suite,
            compression_method: 0,
            extensions: Extensions::new(),
        }
    }

    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_hello(
            buf,
            self.legacy_version,
            &self.random,
            &self.session_id,
            self.cipher_suite,
            self.compression_method,
            &self.extensions,
        );
    }

    /// True when the random carries the TLS 1.2 downgrade sentinel.
    pub fn has_downgrade_sentinel(&self) -> bool {
        self.random[24..] == DOWNGRADE_TLS12_SENTINEL
    }
}

/// HelloRetryRequest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRetryRequest {
    /// Echo of the client's session ID
    pub session_id: Vec<u8>,

    /// Suite the server will select
    pub cipher_suite: CipherSuite,

    /// supported_versions, key_share (group) and cookie
    pub extensions: Extensions,
}

impl HelloRetryRequest {
    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_hello(
            buf,
            ProtocolVersion::Tls12,
            &HELLO_RETRY_REQUEST_RANDOM,
            &self.session_id,
            self.cipher_suite,
            0,
            &self.extensions,
        );
    }
}

/// A decoded type-2 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerHelloKind {
    /// Regular ServerHello
    Hello(ServerHello),
    /// HelloRetryRequest
    Retry(HelloRetryRequest),
}

fn encode_hello(
    buf: &mut BytesMut,
    version: ProtocolVersion,
    random: &[u8; 32],
    session_id: &[u8],
    suite: CipherSuite,
    compression: u8,
    extensions: &Extensions,
) {
    buf.put_u16(version.to_u16());
    buf.put_slice(random);
    buf.put_vec_u8(session_id);
    buf.put_u16(suite.to_u16());
    buf.put_u8(compression);
    if !extensions.is_empty() {
        extensions.encode(buf);
    }
}

/// Decode a type-2 body into a ServerHello or HelloRetryRequest.
pub fn decode(body: &[u8]) -> Result<ServerHelloKind> {
    let mut r = Reader::new(body);
    let legacy_version = ProtocolVersion::from_u16(r.u16()?);
    let random = r.array::<32>()?;
    let session_id = r.vec_u8()?;
    if session_id.len() > 32 {
        return Err(Error::decode("session_id longer than 32 bytes"));
    }
    let cipher_suite = CipherSuite::from_u16(r.u16()?);
    let compression_method = r.u8()?;

    let retry = random == HELLO_RETRY_REQUEST_RANDOM;
    let context = if retry {
        ExtensionContext::HelloRetryRequest
    } else {
        ExtensionContext::ServerHello
    };
    let extensions = if r.is_empty() {
        Extensions::new()
    } else {
        Extensions::decode(&mut r, context)?
    };
    r.expect_end("ServerHello")?;

    if retry {
        if compression_method != 0 {
            return Err(Error::IllegalParameter(
                "HelloRetryRequest with compression".into(),
            ));
        }
        return Ok(ServerHelloKind::Retry(HelloRetryRequest {
            session_id: session_id.to_vec(),
            cipher_suite,
            extensions,
        }));
    }

    Ok(ServerHelloKind::Hello(ServerHello {
        legacy_version,
        random,
        session_id: session_id.to_vec(),
        cipher_suite,
        compression_method,
        extensions,
    }))
}
