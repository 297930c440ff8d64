//! Minimal DER and X.509 reading.
//!
//! The handshake only needs the leaf certificate's SubjectPublicKeyInfo
//! (handed to the crypto provider as-is) and the key algorithm, to pick
//! signature schemes and match suites. Path building and validity policy
//! are left to the application.

use crate::cipher::Authentication;
use crate::error::{Error, Result};
use crate::protocol::SignatureScheme;

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_0: u8 = 0xa0;

const OID_RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const OID_ED25519: &[u8] = &[0x2b, 0x65, 0x70];

/// Cursor over a sequence of DER TLVs.
#[derive(Debug, Clone)]
pub(crate) struct Der<'a> {
    data: &'a [u8],
}

impl<'a> Der<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn peek_tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Next element as `(tag, contents, whole encoding)`.
    pub(crate) fn next(&mut self) -> Result<(u8, &'a [u8], &'a [u8])> {
        let start = self.data;
        let (&tag, rest) = start
            .split_first()
            .ok_or_else(|| Error::decode("DER: truncated"))?;
        let (&first, mut rest) = rest
            .split_first()
            .ok_or_else(|| Error::decode("DER: truncated length"))?;
        let len = if first < 0x80 {
            first as usize
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 || count > 4 || rest.len() < count {
                return Err(Error::decode("DER: bad length"));
            }
            let (bytes, tail) = rest.split_at(count);
            rest = tail;
            let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            if len < 0x80 || bytes[0] == 0 {
                return Err(Error::decode("DER: non-minimal length"));
            }
            len
        };
        if rest.len() < len {
            return Err(Error::decode("DER: element exceeds input"));
        }
        let header = start.len() - rest.len();
        let (contents, tail) = rest.split_at(len);
        self.data = tail;
        Ok((tag, contents, &start[..header + len]))
    }

    /// Contents of the next element, which must carry `tag`.
    pub(crate) fn expect(&mut self, tag: u8) -> Result<&'a [u8]> {
        let (found, contents, _) = self.next()?;
        if found != tag {
            return Err(Error::decode(format_args!(
                "DER: expected tag {:#04x}, found {:#04x}",
                tag, found
            )));
        }
        Ok(contents)
    }

    pub(crate) fn sequence(&mut self) -> Result<Der<'a>> {
        self.expect(TAG_SEQUENCE).map(Der::new)
    }

    /// Unsigned big-endian INTEGER contents without the sign byte.
    pub(crate) fn unsigned_integer(&mut self) -> Result<&'a [u8]> {
        let contents = self.expect(TAG_INTEGER)?;
        match contents {
            [] => Err(Error::decode("DER: empty INTEGER")),
            [first, ..] if first & 0x80 != 0 => Err(Error::decode("DER: negative INTEGER")),
            [0, rest @ ..] if !rest.is_empty() => Ok(rest),
            _ => Ok(contents),
        }
    }
}

/// Public key algorithm of a certificate or private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// RSA (rsaEncryption)
    Rsa,
    /// ECDSA over P-256
    EcdsaP256,
    /// Ed25519
    Ed25519,
}

impl KeyKind {
    fn from_algorithm(algorithm: &[u8]) -> Result<Self> {
        let mut alg = Der::new(algorithm);
        let oid = alg.expect(TAG_OID)?;
        match oid {
            OID_RSA_ENCRYPTION => Ok(KeyKind::Rsa),
            OID_ED25519 => Ok(KeyKind::Ed25519),
            OID_EC_PUBLIC_KEY => {
                let curve = alg.expect(TAG_OID)?;
                if curve == OID_PRIME256V1 {
                    Ok(KeyKind::EcdsaP256)
                } else {
                    Err(Error::BadCertificate("unsupported elliptic curve".into()))
                }
            },
            _ => Err(Error::BadCertificate("unsupported key algorithm".into())),
        }
    }

    /// Signature schemes this key can produce, in preference order.
    pub fn signature_schemes(self, tls13: bool) -> &'static [SignatureScheme] {
        match (self, tls13) {
            (KeyKind::Rsa, true) => &[
                SignatureScheme::RsaPssRsaeSha256,
                SignatureScheme::RsaPssRsaeSha384,
            ],
            (KeyKind::Rsa, false) => &[
                SignatureScheme::RsaPssRsaeSha256,
                SignatureScheme::RsaPkcs1Sha256,
                SignatureScheme::RsaPssRsaeSha384,
                SignatureScheme::RsaPkcs1Sha384,
            ],
            (KeyKind::EcdsaP256, _) => &[SignatureScheme::EcdsaSecp256r1Sha256],
            (KeyKind::Ed25519, _) => &[SignatureScheme::Ed25519],
        }
    }

    /// Whether a signature of `scheme` can come from this key.
    pub fn supports(self, scheme: SignatureScheme) -> bool {
        self.signature_schemes(false).contains(&scheme)
    }

    /// The TLS 1.2 authentication family this key serves. EdDSA keys
    /// authenticate ECDHE_ECDSA suites (RFC 8422).
    pub fn authentication(self) -> Authentication {
        match self {
            KeyKind::Rsa => Authentication::Rsa,
            KeyKind::EcdsaP256 | KeyKind::Ed25519 => Authentication::Ecdsa,
        }
    }
}

/// The public key of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateKey {
    /// SubjectPublicKeyInfo, DER
    pub spki: Vec<u8>,
    /// Algorithm
    pub kind: KeyKind,
}

/// Pull the SubjectPublicKeyInfo out of a DER certificate.
pub fn certificate_key(cert: &[u8]) -> Result<CertificateKey> {
    parse_certificate(cert).map_err(|e| match e {
        Error::Decode(msg) => Error::BadCertificate(msg),
        other => other,
    })
}

fn parse_certificate(cert: &[u8]) -> Result<CertificateKey> {
    let mut outer = Der::new(cert);
    let mut certificate = outer.sequence()?;
    let mut tbs = certificate.sequence()?;
    if tbs.peek_tag() == Some(TAG_CONTEXT_0) {
        tbs.next()?;
    }
    tbs.expect(TAG_INTEGER)?; // serialNumber
    tbs.sequence()?; // signature
    tbs.sequence()?; // issuer
    tbs.sequence()?; // validity
    tbs.sequence()?; // subject
    let (tag, contents, whole) = tbs.next()?;
    if tag != TAG_SEQUENCE {
        return Err(Error::decode("certificate without SubjectPublicKeyInfo"));
    }
    let mut spki = Der::new(contents);
    let algorithm = spki.expect(TAG_SEQUENCE)?;
    spki.expect(TAG_BIT_STRING)?;
    Ok(CertificateKey {
        spki: whole.to_vec(),
        kind: KeyKind::from_algorithm(algorithm)?,
    })
}

/// Key algorithm of a PKCS#8 PrivateKeyInfo.
pub fn private_key_kind(pkcs8: &[u8]) -> Result<KeyKind> {
    let mut outer = Der::new(pkcs8);
    let mut info = outer.sequence()?;
    info.expect(TAG_INTEGER)?;
    let algorithm = info.expect(TAG_SEQUENCE)?;
    info.expect(TAG_OCTET_STRING)?;
    KeyKind::from_algorithm(algorithm)
}

/// `DHParameter ::= SEQUENCE { prime INTEGER, base INTEGER, ... }` (PKCS #3)
pub fn dh_parameters(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut outer = Der::new(der);
    let mut params = outer.sequence()?;
    let p = params.unsigned_integer()?.to_vec();
    let g = params.unsigned_integer()?.to_vec();
    if !outer.is_empty() {
        return Err(Error::decode("trailing data after DH parameters"));
    }
    Ok((p, g))
}
