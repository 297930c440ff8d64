//! ServerKeyExchange and ClientKeyExchange (TLS 1.2, RFC 5246 Section 7.4.3 and 7.4.7,
//! RFC 8422 Section 5.4).
//!
//! ```text
//! struct {
//!     select (KeyExchangeAlgorithm) {
//!         case dhe_rsa:      ServerDHParams params;
//!         case ec_diffie_hellman: ServerECDHParams params;
//!     };
//!     digitally-signed struct {
//!         opaque client_random[32];
//!         opaque server_random[32];
//!         params;
//!     } signed_params;
//! } ServerKeyExchange;
//! ```

use bytes::{BufMut, BytesMut};

use crate::cipher::KeyExchangeMethod;
use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::protocol::{NamedGroup, SignatureScheme};

/// ECCurveType named_curve.
const NAMED_CURVE: u8 = 3;

/// Ephemeral parameters offered by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchangeParams {
    /// ServerECDHParams
    Ecdhe {
        /// Curve
        group: NamedGroup,
        /// Server's ephemeral public point
        public: Vec<u8>,
    },
    /// ServerDHParams
    Dhe {
        /// Prime modulus, big-endian
        p: Vec<u8>,
        /// Generator, big-endian
        g: Vec<u8>,
        /// Server's public value g^X mod p
        ys: Vec<u8>,
    },
}

impl ServerKeyExchangeParams {
    /// Append the wire form, which is also the signed content.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            ServerKeyExchangeParams::Ecdhe { group, public } => {
                buf.put_u8(NAMED_CURVE);
                buf.put_u16(group.to_u16());
                buf.put_vec_u8(public);
            },
            ServerKeyExchangeParams::Dhe { p, g, ys } => {
                buf.put_vec_u16(p);
                buf.put_vec_u16(g);
                buf.put_vec_u16(ys);
            },
        }
    }

    fn decode(r: &mut Reader<'_>, method: KeyExchangeMethod) -> Result<Self> {
        match method {
            KeyExchangeMethod::Ecdhe => {
                if r.u8()? != NAMED_CURVE {
                    return Err(Error::IllegalParameter(
                        "only named curves are supported".into(),
                    ));
                }
                let group = NamedGroup::from_u16(r.u16()?);
                let public = r.vec_u8()?;
                if public.is_empty() {
                    return Err(Error::decode("empty ECDH public value"));
                }
                Ok(ServerKeyExchangeParams::Ecdhe {
                    group,
                    public: public.to_vec(),
                })
            },
            KeyExchangeMethod::Dhe => {
                let p = r.vec_u16()?;
                let g = r.vec_u16()?;
                let ys = r.vec_u16()?;
                if p.is_empty() || g.is_empty() || ys.is_empty() {
                    return Err(Error::decode("empty DH parameter"));
                }
                Ok(ServerKeyExchangeParams::Dhe {
                    p: p.to_vec(),
                    g: g.to_vec(),
                    ys: ys.to_vec(),
                })
            },
            other => Err(Error::UnexpectedMessage(format!(
                "ServerKeyExchange with {:?} key exchange",
                other
            ))),
        }
    }
}

/// ServerKeyExchange message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    /// Ephemeral parameters
    pub params: ServerKeyExchangeParams,

    /// Scheme the signature was made with
    pub scheme: SignatureScheme,

    /// Signature over both randoms and the parameters
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    /// Bytes covered by the signature.
    pub fn signed_message(
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        params: &ServerKeyExchangeParams,
    ) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(64 + 300);
        buf.put_slice(client_random);
        buf.put_slice(server_random);
        params.encode(&mut buf);
        buf.to_vec()
    }

    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        self.params.encode(buf);
        buf.put_u16(self.scheme.to_u16());
        buf.put_vec_u16(&self.signature);
    }

    /// Decode a body for the negotiated key exchange.
    pub fn decode(body: &[u8], method: KeyExchangeMethod) -> Result<Self> {
        let mut r = Reader::new(body);
        let params = ServerKeyExchangeParams::decode(&mut r, method)?;
        let scheme = SignatureScheme::from_u16(r.u16()?);
        let signature = r.vec_u16()?.to_vec();
        r.expect_end("ServerKeyExchange")?;
        Ok(Self {
            params,
            scheme,
            signature,
        })
    }
}

/// ClientKeyExchange message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// RSA-encrypted pre-master secret
    Rsa(Vec<u8>),
    /// Client's DH public value Yc
    Dhe(Vec<u8>),
    /// Client's ephemeral EC point
    Ecdhe(Vec<u8>),
}

impl ClientKeyExchange {
    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            ClientKeyExchange::Rsa(data) | ClientKeyExchange::Dhe(data) => buf.put_vec_u16(data),
            ClientKeyExchange::Ecdhe(point) => buf.put_vec_u8(point),
        }
    }

    /// Decode a body for the negotiated key exchange.
    pub fn decode(body: &[u8], method: KeyExchangeMethod) -> Result<Self> {
        let mut r = Reader::new(body);
        let message = match method {
            KeyExchangeMethod::Rsa => ClientKeyExchange::Rsa(r.vec_u16()?.to_vec()),
            KeyExchangeMethod::Dhe => ClientKeyExchange::Dhe(r.vec_u16()?.to_vec()),
            KeyExchangeMethod::Ecdhe => ClientKeyExchange::Ecdhe(r.vec_u8()?.to_vec()),
            KeyExchangeMethod::Tls13 => {
                return Err(Error::UnexpectedMessage(
                    "ClientKeyExchange in TLS 1.3".into(),
                ))
            },
        };
        r.expect_end("ClientKeyExchange")?;
        Ok(message)
    }

    /// The key exchange payload.
    pub fn payload(&self) -> &[u8] {
        match self {
            ClientKeyExchange::Rsa(data)
            | ClientKeyExchange::Dhe(data)
            | ClientKeyExchange::Ecdhe(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdhe_server_key_exchange() {
        let ske = ServerKeyExchange {
            params: ServerKeyExchangeParams::Ecdhe {
                group: NamedGroup::X25519,
                public: vec![0x11; 32],
            },
            scheme: SignatureScheme::RsaPssRsaeSha256,
            signature: vec![0x22; 256],
        };
        let mut buf = BytesMut::new();
        ske.encode(&mut buf);
        assert_eq!(&buf[..4], &[3, 0x00, 0x1d, 32]);
        assert_eq!(
            ServerKeyExchange::decode(&buf, KeyExchangeMethod::Ecdhe).unwrap(),
            ske
        );
    }

    #[test]
    fn test_dhe_server_key_exchange() {
        let ske = ServerKeyExchange {
            params: ServerKeyExchangeParams::Dhe {
                p: vec![0xff; 256],
                g: vec![2],
                ys: vec![0x42; 256],
            },
            scheme: SignatureScheme::RsaPkcs1Sha256,
            signature: vec![0x01; 256],
        };
        let mut buf = BytesMut::new();
        ske.encode(&mut buf);
        assert_eq!(
            ServerKeyExchange::decode(&buf, KeyExchangeMethod::Dhe).unwrap(),
            ske
        );
        assert!(ServerKeyExchange::decode(&buf, KeyExchangeMethod::Ecdhe).is_err());
    }

    #[test]
    fn test_signed_message_layout() {
        let params = ServerKeyExchangeParams::Ecdhe {
            group: NamedGroup::Secp256r1,
            public: vec![4; 65],
        };
        let signed = ServerKeyExchange::signed_message(&[1; 32], &[2; 32], &params);
        assert_eq!(signed.len(), 64 + 4 + 65);
        assert_eq!(&signed[64..68], &[3, 0x00, 0x17, 65]);
    }

    #[test]
    fn test_client_key_exchange_prefixes() {
        let mut buf = BytesMut::new();
        ClientKeyExchange::Ecdhe(vec![9; 32]).encode(&mut buf);
        assert_eq!(buf[0], 32);
        assert_eq!(
            ClientKeyExchange::decode(&buf, KeyExchangeMethod::Ecdhe).unwrap(),
            ClientKeyExchange::Ecdhe(vec![9; 32])
        );

        let mut buf = BytesMut::new();
        ClientKeyExchange::Rsa(vec![7; 256]).encode(&mut buf);
        assert_eq!(&buf[..2], &[1, 0]);
        let decoded = ClientKeyExchange::decode(&buf, KeyExchangeMethod::Rsa).unwrap();
        assert_eq!(decoded.payload().len(), 256);
    }
}
