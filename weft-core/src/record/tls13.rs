//! TLS 1.3 record protection (RFC 8446 Section 5.2).
//!
//! ```text
//! struct {
//!     opaque content[length];
//!     ContentType type;
//!     uint8 zeros[length_of_padding];
//! } TLSInnerPlaintext;
//! ```
//!
//! The outer record is always `application_data` with version 0x0303. The
//! additional data is the outer header; the nonce is the traffic IV XORed
//! with the sequence number. No padding is added on write; any zero padding
//! from the peer is stripped.

use weft_crypto::{Aead, CryptoProvider};
use zeroize::Zeroizing;

use super::{RecordProtection, SequenceNumber, MAX_TLS13_CIPHERTEXT_LEN};
use crate::cipher::CipherSuiteDescriptor;
use crate::error::{Error, Result};
use crate::key_schedule::tls13::TrafficKeys;
use crate::key_schedule::Secret;
use crate::protocol::{ContentType, ProtocolVersion, MAX_FRAGMENT_LEN};

/// AEAD protection keyed from one traffic secret.
pub struct Tls13Protection {
    aead: Box<dyn Aead>,
    key: Zeroizing<Vec<u8>>,
    iv: Zeroizing<Vec<u8>>,
    seq: SequenceNumber,
}

impl core::fmt::Debug for Tls13Protection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tls13Protection")
            .field("algorithm", &self.aead.algorithm())
            .field("seq", &self.seq.get())
            .finish_non_exhaustive()
    }
}

impl Tls13Protection {
    /// Derive key and IV from `traffic_secret`.
    pub fn new(
        provider: &dyn CryptoProvider,
        suite: &CipherSuiteDescriptor,
        traffic_secret: &Secret,
    ) -> Result<Self> {
        let algorithm = suite
            .aead_algorithm()
            .ok_or_else(|| Error::Internal(format!("{} has no AEAD", suite.name)))?;
        let keys = TrafficKeys::derive(provider, suite, traffic_secret)?;
        Ok(Self {
            aead: provider.aead(algorithm)?,
            key: Zeroizing::new(keys.key.clone()),
            iv: Zeroizing::new(keys.iv.clone()),
            seq: SequenceNumber::default(),
        })
    }

    fn additional_data(len: usize) -> [u8; 5] {
        let len = (len as u16).to_be_bytes();
        [ContentType::ApplicationData.to_u8(), 3, 3, len[0], len[1]]
    }
}

impl RecordProtection for Tls13Protection {
    fn seal(
        &mut self,
        content_type: ContentType,
        _version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<(ContentType, Vec<u8>)> {
        let mut inner = Zeroizing::new(Vec::with_capacity(fragment.len() + 1));
        inner.extend_from_slice(fragment);
        inner.push(content_type.to_u8());

        let aad = Self::additional_data(inner.len() + self.aead.tag_size());
        let body = self
            .aead
            .seal(&self.key, &self.seq.nonce(&self.iv), &aad, &inner)?;
        self.seq.advance()?;
        Ok((ContentType::ApplicationData, body))
    }

    fn open(
        &mut self,
        _content_type: ContentType,
        _version: ProtocolVersion,
        body: &[u8],
    ) -> Result<(ContentType, Vec<u8>)> {
        if body.len() < self.aead.tag_size() {
            return Err(Error::BadRecordMac);
        }
        let aad = Self::additional_data(body.len());
        let mut inner = self
            .aead
            .open(&self.key, &self.seq.nonce(&self.iv), &aad, body)
            .map_err(|_| Error::BadRecordMac)?;

        let Some(end) = inner.iter().rposition(|&b| b != 0) else {
            return Err(Error::UnexpectedMessage(
                "protected record without content type".into(),
            ));
        };
        let content_type = match ContentType::from_u8(inner[end]) {
            Some(ContentType::ChangeCipherSpec) | None => {
                return Err(Error::UnexpectedMessage(format!(
                    "inner content type {}",
                    inner[end]
                )))
            },
            Some(t) => t,
        };
        inner.truncate(end);
        if inner.len() > MAX_FRAGMENT_LEN {
            return Err(Error::RecordOverflow(inner.len()));
        }
        self.seq.advance()?;
        Ok((content_type, inner))
    }

    fn max_ciphertext_len(&self) -> usize {
        MAX_TLS13_CIPHERTEXT_LEN
    }

    fn sequence_number(&self) -> u64 {
        self.seq.get()
    }

    fn hides_content_type(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherSuite;
    use crate::record::RecordLayer;
    use std::io::Cursor;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    fn pair(suite: CipherSuite) -> (Tls13Protection, Tls13Protection) {
        let provider = RustCryptoProvider::new();
        let suite = suite.descriptor().unwrap();
        let secret = Secret::new(vec![0x5a; suite.hash.output_size()]);
        (
            Tls13Protection::new(&provider, suite, &secret).unwrap(),
            Tls13Protection::new(&provider, suite, &secret).unwrap(),
        )
    }

    const SUITES: [CipherSuite; 3] = [
        CipherSuite::Tls13Aes128GcmSha256,
        CipherSuite::Tls13Aes256GcmSha384,
        CipherSuite::Tls13ChaCha20Poly1305Sha256,
    ];

    #[test]
    fn test_round_trip_hides_type() {
        for suite in SUITES {
            let (mut writer, mut reader) = pair(suite);
            let (outer, body) = writer
                .seal(ContentType::Handshake, ProtocolVersion::Tls12, b"finished")
                .unwrap();
            assert_eq!(outer, ContentType::ApplicationData);
            assert_eq!(body.len(), 8 + 1 + 16);
            let (inner, plain) = reader
                .open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body)
                .unwrap();
            assert_eq!(inner, ContentType::Handshake);
            assert_eq!(plain, b"finished");
            assert_eq!(writer.sequence_number(), 1);
            assert_eq!(reader.sequence_number(), 1);
        }
    }

    #[test]
    fn test_tampering_keeps_sequence() {
        let (mut writer, mut reader) = pair(CipherSuite::Tls13Aes128GcmSha256);
        let (_, mut body) = writer
            .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, b"x")
            .unwrap();
        body[0] ^= 0x80;
        assert_eq!(
            reader.open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body),
            Err(Error::BadRecordMac)
        );
        assert_eq!(reader.sequence_number(), 0);
    }

    #[test]
    fn test_all_zero_inner_plaintext() {
        let provider = RustCryptoProvider::new();
        let suite = CipherSuite::Tls13Aes128GcmSha256.descriptor().unwrap();
        let secret = Secret::new(vec![0x5a; 32]);
        let keys = TrafficKeys::derive(&provider, suite, &secret).unwrap();
        let aead = provider.aead(suite.aead_algorithm().unwrap()).unwrap();
        let aad = Tls13Protection::additional_data(4 + 16);
        let body = aead.seal(&keys.key, &keys.iv, &aad, &[0, 0, 0, 0]).unwrap();

        let mut reader = Tls13Protection::new(&provider, suite, &secret).unwrap();
        assert!(matches!(
            reader.open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body),
            Err(Error::UnexpectedMessage(_))
        ));
    }

    #[test]
    fn test_padding_is_stripped() {
        let provider = RustCryptoProvider::new();
        let suite = CipherSuite::Tls13ChaCha20Poly1305Sha256.descriptor().unwrap();
        let secret = Secret::new(vec![7; 32]);
        let keys = TrafficKeys::derive(&provider, suite, &secret).unwrap();
        let aead = provider.aead(suite.aead_algorithm().unwrap()).unwrap();
        let inner = [b'h', b'i', 23, 0, 0, 0];
        let aad = Tls13Protection::additional_data(inner.len() + 16);
        let body = aead.seal(&keys.key, &keys.iv, &aad, &inner).unwrap();

        let mut reader = Tls13Protection::new(&provider, suite, &secret).unwrap();
        let (typ, plain) = reader
            .open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body)
            .unwrap();
        assert_eq!(typ, ContentType::ApplicationData);
        assert_eq!(plain, b"hi");
    }

    fn layers() -> (RecordLayer, RecordLayer) {
        let (writer, reader) = pair(CipherSuite::Tls13Aes128GcmSha256);
        let mut out = RecordLayer::new();
        out.activate_write(Box::new(writer));
        let mut inp = RecordLayer::new();
        inp.activate_read(Box::new(reader));
        (out, inp)
    }

    #[test]
    fn test_record_layer_round_trip() {
        let (mut out, mut inp) = layers();
        let mut wire = Cursor::new(Vec::new());
        out.write_record(&mut wire, ContentType::Alert, &[1, 0]).unwrap();
        out.write_record(&mut wire, ContentType::ApplicationData, b"ping").unwrap();
        assert_eq!(wire.get_ref()[0], 23);
        wire.set_position(0);

        let alert = inp.read_record(&mut wire).unwrap();
        assert_eq!(alert.content_type, ContentType::Alert);
        assert_eq!(alert.fragment, vec![1, 0]);
        let data = inp.read_record(&mut wire).unwrap();
        assert_eq!(data.fragment, b"ping");
        assert_eq!(inp.read_sequence(), Some(2));
        assert_eq!(out.write_sequence(), Some(2));
    }

    #[test]
    fn test_plaintext_record_after_keys_is_rejected() {
        let (_, mut inp) = layers();
        let mut wire = Cursor::new(vec![22, 3, 3, 0, 4, 20, 0, 0, 0]);
        assert!(matches!(
            inp.read_record(&mut wire),
            Err(Error::UnexpectedMessage(_))
        ));

        let mut ccs = Cursor::new(vec![20, 3, 3, 0, 1, 1]);
        let record = inp.read_record(&mut ccs).unwrap();
        assert_eq!(record.content_type, ContentType::ChangeCipherSpec);
    }

    #[test]
    fn test_oversized_ciphertext_is_overflow() {
        let (_, mut inp) = layers();
        let len = MAX_TLS13_CIPHERTEXT_LEN + 1;
        let mut bytes = vec![23, 3, 3];
        bytes.extend_from_slice(&(len as u16).to_be_bytes());
        bytes.resize(5 + len, 0);
        assert_eq!(
            inp.read_record(&mut Cursor::new(bytes)),
            Err(Error::RecordOverflow(len))
        );
    }

    #[test]
    fn test_undecryptable_records_are_skipped_within_budget() {
        let (mut early, _) = pair(CipherSuite::Tls13Aes256GcmSha384);
        let (mut out, mut inp) = layers();
        let mut wire = Cursor::new(Vec::new());

        let (_, junk) = early
            .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, &[1; 30])
            .unwrap();
        let mut framed = vec![23, 3, 3];
        framed.extend_from_slice(&(junk.len() as u16).to_be_bytes());
        framed.extend_from_slice(&junk);
        wire.get_mut().extend_from_slice(&framed);
        out.write_record(&mut wire, ContentType::Handshake, &[20, 0, 0, 0])
            .unwrap();
        wire.set_position(0);

        inp.skip_undecryptable(1000);
        let record = inp.read_record(&mut wire).unwrap();
        assert_eq!(record.content_type, ContentType::Handshake);
        assert_eq!(inp.skip_budget(), 0);
        assert_eq!(inp.read_sequence(), Some(1));
    }

    #[test]
    fn test_undecryptable_record_over_budget_fails() {
        let (mut early, _) = pair(CipherSuite::Tls13Aes256GcmSha384);
        let (_, mut inp) = layers();
        let (_, junk) = early
            .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, &[1; 30])
            .unwrap();
        let mut framed = vec![23, 3, 3];
        framed.extend_from_slice(&(junk.len() as u16).to_be_bytes());
        framed.extend_from_slice(&junk);

        inp.skip_undecryptable(10);
        assert_eq!(
            inp.read_record(&mut Cursor::new(framed)),
            Err(Error::BadRecordMac)
        );
    }
}
