//! ClientHello (RFC 5246 Section 7.4.1.2, RFC 8446 Section 4.1.2).

use bytes::{BufMut, BytesMut};

use crate::cipher::CipherSuite;
use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionContext, Extensions};
use crate::protocol::ProtocolVersion;

/// ClientHello message.
///
/// ```text
/// struct {
///     ProtocolVersion client_version;
///     Random random;
///     SessionID session_id<0..32>;
///     CipherSuite cipher_suites<2..2^16-2>;
///     CompressionMethod compression_methods<1..2^8-1>;
///     Extension extensions<0..2^16-1>;
/// } ClientHello;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Highest version offered (0x0303 when TLS 1.3 is offered)
    pub legacy_version: ProtocolVersion,

    /// Client random
    pub random: [u8; 32],

    /// Session ID, empty for a fresh TLS 1.2 session
    pub session_id: Vec<u8>,

    /// Offered suites, most preferred first
    pub cipher_suites: Vec<CipherSuite>,

    /// Compression methods, always `[0]` when sent by us
    pub compression_methods: Vec<u8>,

    /// Extensions; omitted from the wire when empty
    pub extensions: Extensions,
}

impl ClientHello {
    /// Create a ClientHello with null compression and no extensions.
    pub fn new(
        legacy_version: ProtocolVersion,
        random: [u8; 32],
        cipher_suites: Vec<CipherSuite>,
    ) -> Self {
        Self {
            legacy_version,
            random,
            session_id: Vec::new(),
            cipher_suites,
            compression_methods: vec![0],
            extensions: Extensions::new(),
        }
    }

    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.legacy_version.to_u16());
        buf.put_slice(&self.random);
        buf.put_vec_u8(&self.session_id);
        buf.put_nested_u16(|b| {
            for suite in &self.cipher_suites {
                b.put_u16(suite.to_u16());
            }
        });
        buf.put_vec_u8(&self.compression_methods);
        if !self.extensions.is_empty() {
            self.extensions.encode(buf);
        }
    }

    /// Decode a body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = Reader::new(body);
        let legacy_version = ProtocolVersion::from_u16(r.u16()?);
        let random = r.array::<32>()?;

        let session_id = r.vec_u8()?;
        if session_id.len() > 32 {
            return Err(Error::decode("session_id longer than 32 bytes"));
        }

        let mut suites = r.sub_u16()?;
        if suites.is_empty() || suites.remaining() % 2 != 0 {
            return Err(Error::decode("invalid cipher_suites length"));
        }
        let mut cipher_suites = Vec::with_capacity(suites.remaining() / 2);
        while !suites.is_empty() {
            cipher_suites.push(CipherSuite::from_u16(suites.u16()?));
        }

        let compression_methods = r.vec_u8()?;
        if compression_methods.is_empty() {
            return Err(Error::decode("empty compression_methods"));
        }

        let extensions = if r.is_empty() {
            Extensions::new()
        } else {
            Extensions::decode(&mut r, ExtensionContext::ClientHello)?
        };
        r.expect_end("ClientHello")?;

        Ok(Self {
            legacy_version,
            random,
            session_id: session_id.to_vec(),
            cipher_suites,
            compression_methods: compression_methods.to_vec(),
            extensions,
        })
    }

    /// Whether the client signalled secure renegotiation support through
    /// the SCSV or the extension.
    pub fn offers_secure_renegotiation(&self) -> bool {
        self.cipher_suites
            .contains(&CipherSuite::EmptyRenegotiationInfoScsv)
            || self.extensions.renegotiation_info().is_some()
    }
}
