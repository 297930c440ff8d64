//! CertificateRequest (RFC 5246 Section 7.4.4, RFC 8446 Section 4.3.2).

use bytes::{BufMut, BytesMut};

use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionContext, Extensions};
use crate::protocol::SignatureScheme;

/// CertificateRequest message, in either version's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateRequest {
    /// TLS 1.2 layout
    Tls12 {
        /// ClientCertificateType values
        certificate_types: Vec<u8>,
        /// Acceptable signature schemes
        signature_schemes: Vec<SignatureScheme>,
        /// DER distinguished names of acceptable authorities
        authorities: Vec<Vec<u8>>,
    },
    /// TLS 1.3 layout
    Tls13 {
        /// Context echoed in the client's Certificate
        context: Vec<u8>,
        /// signature_algorithms and friends
        extensions: Extensions,
    },
}

impl CertificateRequest {
    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            CertificateRequest::Tls12 {
                certificate_types,
                signature_schemes,
                authorities,
            } => {
                buf.put_vec_u8(certificate_types);
                buf.put_nested_u16(|b| {
                    for scheme in signature_schemes {
                        b.put_u16(scheme.to_u16());
                    }
                });
                buf.put_nested_u16(|b| {
                    for name in authorities {
                        b.put_vec_u16(name);
                    }
                });
            },
            CertificateRequest::Tls13 {
                context,
                extensions,
            } => {
                buf.put_vec_u8(context);
                extensions.encode(buf);
            },
        }
    }

    /// Decode a body in the given layout.
    pub fn decode(body: &[u8], tls13: bool) -> Result<Self> {
        let mut r = Reader::new(body);
        let request = if tls13 {
            let context = r.vec_u8()?.to_vec();
            let extensions = Extensions::decode(&mut r, ExtensionContext::CertificateRequest)?;
            if extensions.signature_algorithms().is_none() {
                return Err(Error::MissingExtension("signature_algorithms"));
            }
            CertificateRequest::Tls13 {
                context,
                extensions,
            }
        } else {
            let certificate_types = r.vec_u8()?;
            if certificate_types.is_empty() {
                return Err(Error::decode("empty certificate_types"));
            }
            let mut list = r.sub_u16()?;
            let mut signature_schemes = Vec::new();
            while !list.is_empty() {
                signature_schemes.push(SignatureScheme::from_u16(list.u16()?));
            }
            let mut names = r.sub_u16()?;
            let mut authorities = Vec::new();
            while !names.is_empty() {
                authorities.push(names.vec_u16()?.to_vec());
            }
            CertificateRequest::Tls12 {
                certificate_types: certificate_types.to_vec(),
                signature_schemes,
                authorities,
            }
        };
        r.expect_end("CertificateRequest")?;
        Ok(request)
    }
}
