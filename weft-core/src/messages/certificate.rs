//! Certificate (RFC 5246 Section 7.4.2, RFC 8446 Section 4.4.2).

use bytes::BytesMut;

use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionContext, Extensions};

/// One certificate of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    /// DER-encoded X.509 certificate
    pub cert_data: Vec<u8>,

    /// Per-certificate extensions (TLS 1.3 only)
    pub extensions: Extensions,
}

/// Certificate message.
///
/// In TLS 1.2 the body is a bare `ASN.1Cert certificate_list<0..2^24-1>`.
/// TLS 1.3 prefixes a request context and gives every entry its own
/// extension block; `request_context` is `Some` exactly for that layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Certificate request context (TLS 1.3)
    pub request_context: Option<Vec<u8>>,

    /// Chain, leaf first
    pub entries: Vec<CertificateEntry>,
}

impl Certificate {
    /// A TLS 1.2 chain.
    pub fn tls12(chain: &[Vec<u8>]) -> Self {
        Self {
            request_context: None,
            entries: entries(chain),
        }
    }

    /// A TLS 1.3 chain with an empty request context.
    pub fn tls13(chain: &[Vec<u8>]) -> Self {
        Self {
            request_context: Some(Vec::new()),
            entries: entries(chain),
        }
    }

    /// DER certificates, leaf first.
    pub fn chain(&self) -> Vec<Vec<u8>> {
        self.entries.iter().map(|e| e.cert_data.clone()).collect()
    }

    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        let tls13 = self.request_context.is_some();
        if let Some(context) = &self.request_context {
            buf.put_vec_u8(context);
        }
        buf.put_nested_u24(|b| {
            for entry in &self.entries {
                b.put_vec_u24(&entry.cert_data);
                if tls13 {
                    entry.extensions.encode(b);
                }
            }
        });
    }

    /// Decode a body in the given layout.
    pub fn decode(body: &[u8], tls13: bool) -> Result<Self> {
        let mut r = Reader::new(body);
        let request_context = if tls13 {
            Some(r.vec_u8()?.to_vec())
        } else {
            None
        };

        let mut list = r.sub_u24()?;
        let mut entries = Vec::new();
        while !list.is_empty() {
            let cert_data = list.vec_u24()?;
            if cert_data.is_empty() {
                return Err(Error::decode("empty certificate"));
            }
            let extensions = if tls13 {
                Extensions::decode(&mut list, ExtensionContext::Certificate)?
            } else {
                Extensions::new()
            };
            entries.push(CertificateEntry {
                cert_data: cert_data.to_vec(),
                extensions,
            });
        }
        r.expect_end("Certificate")?;

        Ok(Self {
            request_context,
            entries,
        })
    }
}

fn entries(chain: &[Vec<u8>]) -> Vec<CertificateEntry> {
    chain
        .iter()
        .map(|der| CertificateEntry {
            cert_data: der.clone(),
            extensions: Extensions::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(cert: &Certificate) -> Vec<u8> {
        let mut buf = BytesMut::new();
        cert.encode(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_tls12_layout() {
        let cert = Certificate::tls12(&[vec![0x30, 0x01, 0x00], vec![0x30, 0x00]]);
        let bytes = encoded(&cert);
        assert_eq!(
            bytes,
            vec![0, 0, 11, 0, 0, 3, 0x30, 0x01, 0x00, 0, 0, 2, 0x30, 0x00]
        );
        assert_eq!(Certificate::decode(&bytes, false).unwrap(), cert);
    }

    #[test]
    fn test_tls13_layout() {
        let cert = Certificate::tls13(&[vec![0x30, 0x00]]);
        let bytes = encoded(&cert);
        assert_eq!(bytes, vec![0, 0, 0, 7, 0, 0, 2, 0x30, 0x00, 0, 0]);
        let decoded = Certificate::decode(&bytes, true).unwrap();
        assert_eq!(decoded, cert);
        assert_eq!(decoded.chain(), vec![vec![0x30, 0x00]]);
    }

    #[test]
    fn test_empty_certificate_list() {
        let cert = Certificate::tls13(&[]);
        let bytes = encoded(&cert);
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert!(Certificate::decode(&bytes, true).unwrap().entries.is_empty());
    }

    #[test]
    fn test_inner_length_overrun() {
        let bytes = [0, 0, 4, 0, 0, 9, 0x30];
        assert!(matches!(
            Certificate::decode(&bytes, false),
            Err(Error::Decode(_))
        ));
    }
}
