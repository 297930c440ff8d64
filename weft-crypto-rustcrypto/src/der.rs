//! Just enough DER to pull RSA key components out of PKCS#8 and
//! SubjectPublicKeyInfo structures (RFC 5208, RFC 5280, RFC 8017 A.1).

use num_bigint::BigUint;

/// Why a DER structure was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    /// Input ended inside a TLV
    UnexpectedEof,
    /// Tag differs from the expected one
    InvalidTag {
        /// Expected tag value
        expected: u8,
        /// Actual tag value found
        got: u8,
    },
    /// Non-minimal, indefinite or oversized length
    InvalidLength,
    /// Structurally valid but semantically wrong content
    InvalidData(&'static str),
}

impl std::fmt::Display for DerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DerError::UnexpectedEof => write!(f, "Unexpected end of DER data"),
            DerError::InvalidTag { expected, got } => {
                write!(f, "Invalid DER tag: expected 0x{:02x}, got 0x{:02x}", expected, got)
            },
            DerError::InvalidLength => write!(f, "Invalid DER length encoding"),
            DerError::InvalidData(msg) => write!(f, "Invalid DER data: {}", msg),
        }
    }
}

impl std::error::Error for DerError {}

type Result<T> = std::result::Result<T, DerError>;

const INTEGER: u8 = 0x02;
const BIT_STRING: u8 = 0x03;
const OCTET_STRING: u8 = 0x04;
const OID: u8 = 0x06;
const SEQUENCE: u8 = 0x30;

/// rsaEncryption, 1.2.840.113549.1.1.1
const RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];

/// Cursor over DER bytes.
#[derive(Debug)]
pub struct DerDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerDecoder<'a> {
    /// Create a new DER decoder
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Check if we've consumed all data
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.pos).ok_or(DerError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(DerError::InvalidLength)?;
        let bytes = self.data.get(self.pos..end).ok_or(DerError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.read_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 {
            return Err(DerError::InvalidLength);
        }
        let mut length = 0usize;
        for &byte in self.read_bytes(count)? {
            length = (length << 8) | byte as usize;
        }
        if length < 0x80 {
            return Err(DerError::InvalidLength);
        }
        Ok(length)
    }

    /// Read a TLV with `expected_tag` and return its contents.
    pub fn read_tagged(&mut self, expected_tag: u8) -> Result<&'a [u8]> {
        let tag = self.read_byte()?;
        if tag != expected_tag {
            return Err(DerError::InvalidTag {
                expected: expected_tag,
                got: tag,
            });
        }
        let length = self.read_length()?;
        self.read_bytes(length)
    }

    /// Read a SEQUENCE and return a decoder for its contents
    pub fn read_sequence(&mut self) -> Result<DerDecoder<'a>> {
        Ok(DerDecoder::new(self.read_tagged(SEQUENCE)?))
    }

    /// Read a non-negative INTEGER.
    pub fn read_integer(&mut self) -> Result<BigUint> {
        let bytes = self.read_tagged(INTEGER)?;
        match bytes.first() {
            None => Err(DerError::InvalidData("empty INTEGER")),
            Some(b) if b & 0x80 != 0 => Err(DerError::InvalidData("negative INTEGER")),
            Some(_) => Ok(BigUint::from_bytes_be(bytes)),
        }
    }

    /// Read a BIT STRING with no unused bits.
    pub fn read_bit_string(&mut self) -> Result<&'a [u8]> {
        let contents = self.read_tagged(BIT_STRING)?;
        match contents.split_first() {
            Some((0, rest)) => Ok(rest),
            Some(_) => Err(DerError::InvalidData("BIT STRING with unused bits")),
            None => Err(DerError::InvalidData("empty BIT STRING")),
        }
    }

    /// Read the algorithm OID of an AlgorithmIdentifier, ignoring parameters.
    pub fn read_algorithm(&mut self) -> Result<&'a [u8]> {
        let mut alg = self.read_sequence()?;
        alg.read_tagged(OID)
    }
}

/// RSA public key components.
#[derive(Debug, Clone)]
pub struct RsaPublicKeyComponents {
    /// Modulus n
    pub n: BigUint,
    /// Public exponent e
    pub e: BigUint,
}

/// RSA private key components (RFC 8017 RSAPrivateKey, two primes).
#[derive(Clone)]
pub struct RsaPrivateKeyComponents {
    /// Modulus n
    pub n: BigUint,
    /// Public exponent e
    pub e: BigUint,
    /// Private exponent d
    pub d: BigUint,
    /// First prime p
    pub p: BigUint,
    /// Second prime q
    pub q: BigUint,
    /// d mod (p-1)
    pub dp: BigUint,
    /// d mod (q-1)
    pub dq: BigUint,
    /// q^(-1) mod p
    pub qinv: BigUint,
}

impl std::fmt::Debug for RsaPrivateKeyComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKeyComponents")
            .field("n_bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

/// Parse an RSA public key from SubjectPublicKeyInfo DER.
pub fn parse_rsa_public_key_spki(der: &[u8]) -> Result<RsaPublicKeyComponents> {
    let mut spki = DerDecoder::new(der).read_sequence()?;
    if spki.read_algorithm()? != RSA_ENCRYPTION {
        return Err(DerError::InvalidData("not an rsaEncryption key"));
    }
    let mut key = DerDecoder::new(spki.read_bit_string()?).read_sequence()?;
    let n = key.read_integer()?;
    let e = key.read_integer()?;
    if !key.is_empty() {
        return Err(DerError::InvalidData("trailing data in RSAPublicKey"));
    }
    Ok(RsaPublicKeyComponents { n, e })
}

/// Parse an RSA private key from PKCS#8 PrivateKeyInfo DER.
pub fn parse_rsa_private_key_pkcs8(der: &[u8]) -> Result<RsaPrivateKeyComponents> {
    let mut info = DerDecoder::new(der).read_sequence()?;
    if info.read_integer()? != BigUint::from(0u8) {
        return Err(DerError::InvalidData("unsupported PKCS#8 version"));
    }
    if info.read_algorithm()? != RSA_ENCRYPTION {
        return Err(DerError::InvalidData("not an rsaEncryption key"));
    }
    let mut key = DerDecoder::new(info.read_tagged(OCTET_STRING)?).read_sequence()?;
    if key.read_integer()? != BigUint::from(0u8) {
        return Err(DerError::InvalidData("multi-prime RSA keys are not supported"));
    }
    Ok(RsaPrivateKeyComponents {
        n: key.read_integer()?,
        e: key.read_integer()?,
        d: key.read_integer()?,
        p: key.read_integer()?,
        q: key.read_integer()?,
        dp: key.read_integer()?,
        dq: key.read_integer()?,
        qinv: key.read_integer()?,
    })
}
