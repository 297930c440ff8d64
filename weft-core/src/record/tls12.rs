//! TLS 1.2 record protection (RFC 5246 Section 6.2.3, RFC 5288, RFC 7905).
//!
//! Two constructions:
//!
//! - **AEAD**: additional data is `seq_num || type || version || length`
//!   over the plaintext length. AES-GCM sends an 8 byte explicit nonce
//!   (the sequence number) in front of the ciphertext, the nonce being
//!   `fixed_iv(4) || explicit(8)`. ChaCha20-Poly1305 sends nothing extra
//!   and XORs the sequence number into the 12 byte IV.
//! - **CBC**: MAC-then-encrypt. `HMAC(mac_key, seq_num || type || version
//!   || length || fragment)` is appended, then padding, and the result is
//!   encrypted under a fresh random IV that is sent in the clear.

use std::sync::Arc;

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater};
use weft_crypto::{Aead, BlockCipher, CryptoProvider, HashAlgorithm};
use zeroize::Zeroizing;

use super::{RecordProtection, SequenceNumber, MAX_TLS12_CIPHERTEXT_LEN};
use crate::cipher::{CipherMode, CipherSuiteDescriptor};
use crate::error::{Error, Result};
use crate::protocol::{ContentType, ProtocolVersion, MAX_FRAGMENT_LEN};

/// Build protection for one direction from its slice of the key block.
pub fn protection(
    provider: &Arc<dyn CryptoProvider>,
    suite: &CipherSuiteDescriptor,
    mac_key: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Box<dyn RecordProtection>> {
    match suite.mode {
        CipherMode::Cbc => Ok(Box::new(Tls12Cbc::new(
            Arc::clone(provider),
            suite,
            mac_key,
            key,
        )?)),
        CipherMode::Gcm | CipherMode::Poly1305 => {
            Ok(Box::new(Tls12Aead::new(provider.as_ref(), suite, key, iv)?))
        },
    }
}

fn additional_data(
    seq: SequenceNumber,
    content_type: ContentType,
    version: ProtocolVersion,
    len: usize,
) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.get().to_be_bytes());
    aad[8] = content_type.to_u8();
    aad[9..11].copy_from_slice(&version.to_u16().to_be_bytes());
    aad[11..].copy_from_slice(&(len as u16).to_be_bytes());
    aad
}

/// AES-GCM or ChaCha20-Poly1305 record protection.
pub struct Tls12Aead {
    aead: Box<dyn Aead>,
    key: Zeroizing<Vec<u8>>,
    iv: Zeroizing<Vec<u8>>,
    explicit_nonce: bool,
    seq: SequenceNumber,
}

impl core::fmt::Debug for Tls12Aead {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tls12Aead")
            .field("algorithm", &self.aead.algorithm())
            .field("seq", &self.seq.get())
            .finish_non_exhaustive()
    }
}

impl Tls12Aead {
    /// `iv` is the 4 byte GCM salt or the 12 byte ChaCha20 IV.
    pub fn new(
        provider: &dyn CryptoProvider,
        suite: &CipherSuiteDescriptor,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self> {
        let algorithm = suite
            .aead_algorithm()
            .ok_or_else(|| Error::Internal(format!("{} is not an AEAD suite", suite.name)))?;
        if key.len() != suite.key_len() || iv.len() != suite.fixed_iv_len() {
            return Err(Error::Internal("record key material has the wrong size".into()));
        }
        Ok(Self {
            aead: provider.aead(algorithm)?,
            key: Zeroizing::new(key.to_vec()),
            iv: Zeroizing::new(iv.to_vec()),
            explicit_nonce: suite.record_iv_len() > 0,
            seq: SequenceNumber::default(),
        })
    }

    fn nonce(&self, explicit: &[u8; 8]) -> Vec<u8> {
        if self.explicit_nonce {
            let mut nonce = Vec::with_capacity(12);
            nonce.extend_from_slice(&self.iv);
            nonce.extend_from_slice(explicit);
            nonce
        } else {
            self.seq.nonce(&self.iv)
        }
    }
}

impl RecordProtection for Tls12Aead {
    fn seal(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<(ContentType, Vec<u8>)> {
        let explicit = self.seq.get().to_be_bytes();
        let nonce = self.nonce(&explicit);
        let aad = additional_data(self.seq, content_type, version, fragment.len());
        let sealed = self.aead.seal(&self.key, &nonce, &aad, fragment)?;

        let mut body = Vec::with_capacity(8 + sealed.len());
        if self.explicit_nonce {
            body.extend_from_slice(&explicit);
        }
        body.extend_from_slice(&sealed);
        self.seq.advance()?;
        Ok((content_type, body))
    }

    fn open(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        body: &[u8],
    ) -> Result<(ContentType, Vec<u8>)> {
        let explicit_len = if self.explicit_nonce { 8 } else { 0 };
        if body.len() < explicit_len + self.aead.tag_size() {
            return Err(Error::BadRecordMac);
        }
        let (explicit, ciphertext) = body.split_at(explicit_len);
        let nonce = match <[u8; 8]>::try_from(explicit) {
            Ok(explicit) => self.nonce(&explicit),
            Err(_) => self.seq.nonce(&self.iv),
        };
        let plaintext_len = ciphertext.len() - self.aead.tag_size();
        let aad = additional_data(self.seq, content_type, version, plaintext_len);
        let plaintext = self
            .aead
            .open(&self.key, &nonce, &aad, ciphertext)
            .map_err(|_| Error::BadRecordMac)?;
        if plaintext.len() > MAX_FRAGMENT_LEN {
            return Err(Error::RecordOverflow(plaintext.len()));
        }
        self.seq.advance()?;
        Ok((content_type, plaintext))
    }

    fn max_ciphertext_len(&self) -> usize {
        MAX_TLS12_CIPHERTEXT_LEN
    }

    fn sequence_number(&self) -> u64 {
        self.seq.get()
    }
}

/// AES-CBC with HMAC record protection.
pub struct Tls12Cbc {
    provider: Arc<dyn CryptoProvider>,
    cipher: Box<dyn BlockCipher>,
    mac: HashAlgorithm,
    mac_key: Zeroizing<Vec<u8>>,
    key: Zeroizing<Vec<u8>>,
    seq: SequenceNumber,
}

impl core::fmt::Debug for Tls12Cbc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tls12Cbc")
            .field("cipher", &self.cipher.algorithm())
            .field("mac", &self.mac)
            .field("seq", &self.seq.get())
            .finish_non_exhaustive()
    }
}

impl Tls12Cbc {
    /// Protection for a CBC suite.
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        suite: &CipherSuiteDescriptor,
        mac_key: &[u8],
        key: &[u8],
    ) -> Result<Self> {
        let (Some(algorithm), Some(mac)) = (suite.block_algorithm(), suite.mac) else {
            return Err(Error::Internal(format!("{} is not a CBC suite", suite.name)));
        };
        if key.len() != suite.key_len() || mac_key.len() != mac.output_size() {
            return Err(Error::Internal("record key material has the wrong size".into()));
        }
        Ok(Self {
            cipher: provider.block_cipher(algorithm)?,
            provider,
            mac,
            mac_key: Zeroizing::new(mac_key.to_vec()),
            key: Zeroizing::new(key.to_vec()),
            seq: SequenceNumber::default(),
        })
    }

    fn record_mac(
        &self,
        content_type: ContentType,
        version: ProtocolVersion,
        content: &[u8],
    ) -> Result<Vec<u8>> {
        let mut hmac = self.provider.hmac(self.mac, &self.mac_key)?;
        hmac.update(&additional_data(self.seq, content_type, version, content.len()));
        hmac.update(content);
        Ok(hmac.finalize())
    }
}

impl RecordProtection for Tls12Cbc {
    fn seal(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<(ContentType, Vec<u8>)> {
        let block = self.cipher.block_size();
        let mac = self.record_mac(content_type, version, fragment)?;

        let unpadded = fragment.len() + mac.len() + 1;
        let pad = (block - unpadded % block) % block;
        let mut data = Zeroizing::new(Vec::with_capacity(unpadded + pad));
        data.extend_from_slice(fragment);
        data.extend_from_slice(&mac);
        data.resize(unpadded + pad, pad as u8);

        let iv = self.provider.random().generate(block)?;
        let ciphertext = self.cipher.encrypt_blocks(&self.key, &iv, &data)?;

        let mut body = iv;
        body.extend_from_slice(&ciphertext);
        self.seq.advance()?;
        Ok((content_type, body))
    }

    fn open(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        body: &[u8],
    ) -> Result<(ContentType, Vec<u8>)> {
        let block = self.cipher.block_size();
        let mac_len = self.mac.output_size();
        let min_len = block + (mac_len + block) / block * block;
        if body.len() < min_len || body.len() % block != 0 {
            return Err(Error::BadRecordMac);
        }
        let (iv, ciphertext) = body.split_at(block);
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt_blocks(&self.key, iv, ciphertext)
                .map_err(|_| Error::BadRecordMac)?,
        );

        // Check the padding without branching on its value, then always
        // compute a MAC so that both failure causes look alike.
        let len = plaintext.len();
        let pad = plaintext[len - 1];
        let mut good = !(u32::from(pad) + 1 + mac_len as u32).ct_gt(&(len as u32));
        for i in 0..len.min(256) {
            let inside = !(i as u8).ct_gt(&pad);
            good &= !inside | plaintext[len - 1 - i].ct_eq(&pad);
        }
        let strip = u32::conditional_select(&0, &(u32::from(pad) + 1), good) as usize;
        let content_len = len - mac_len - strip;

        let (content, received) = plaintext[..len - strip].split_at(content_len);
        let expected = self.record_mac(content_type, version, content)?;
        let mac_ok: Choice = expected.ct_eq(received);
        if !bool::from(good & mac_ok) {
            return Err(Error::BadRecordMac);
        }
        if content_len > MAX_FRAGMENT_LEN {
            return Err(Error::RecordOverflow(content_len));
        }
        let content = content.to_vec();
        self.seq.advance()?;
        Ok((content_type, content))
    }

    fn max_ciphertext_len(&self) -> usize {
        MAX_TLS12_CIPHERTEXT_LEN
    }

    fn sequence_number(&self) -> u64 {
        self.seq.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherSuite;
    use proptest::prelude::*;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    fn provider() -> Arc<dyn CryptoProvider> {
        Arc::new(RustCryptoProvider::new())
    }

    fn pair(suite: CipherSuite) -> (Box<dyn RecordProtection>, Box<dyn RecordProtection>) {
        let provider = provider();
        let suite = suite.descriptor().unwrap();
        let mac_key = vec![0x11; suite.mac_key_len()];
        let key = vec![0x22; suite.key_len()];
        let iv = vec![0x33; suite.fixed_iv_len()];
        (
            protection(&provider, suite, &mac_key, &key, &iv).unwrap(),
            protection(&provider, suite, &mac_key, &key, &iv).unwrap(),
        )
    }

    const SUITES: [CipherSuite; 4] = [
        CipherSuite::EcdheRsaWithAes128GcmSha256,
        CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256,
        CipherSuite::RsaWithAes128CbcSha,
        CipherSuite::RsaWithAes256CbcSha256,
    ];

    #[test]
    fn test_seal_open_advances_sequence() {
        for suite in SUITES {
            let (mut writer, mut reader) = pair(suite);
            for round in 0..3u64 {
                let message = format!("record {}", round);
                let (typ, body) = writer
                    .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, message.as_bytes())
                    .unwrap();
                assert_eq!(typ, ContentType::ApplicationData);
                assert_ne!(&body[..], message.as_bytes());
                let (typ, plain) = reader
                    .open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body)
                    .unwrap();
                assert_eq!(typ, ContentType::ApplicationData);
                assert_eq!(plain, message.as_bytes(), "{:?}", suite);
                assert_eq!(writer.sequence_number(), round + 1);
                assert_eq!(reader.sequence_number(), round + 1);
            }
        }
    }

    #[test]
    fn test_gcm_explicit_nonce_is_sequence_number() {
        let (mut writer, _) = pair(CipherSuite::EcdheRsaWithAes128GcmSha256);
        writer.seal(ContentType::Handshake, ProtocolVersion::Tls12, b"a").unwrap();
        let (_, body) = writer.seal(ContentType::Handshake, ProtocolVersion::Tls12, b"b").unwrap();
        assert_eq!(&body[..8], &1u64.to_be_bytes());
        assert_eq!(body.len(), 8 + 1 + 16);
    }

    #[test]
    fn test_cbc_body_layout() {
        let (mut writer, _) = pair(CipherSuite::RsaWithAes128CbcSha);
        let (_, body) = writer
            .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, &[0u8; 10])
            .unwrap();
        // iv + roundup(10 + 20 + 1, 16)
        assert_eq!(body.len(), 16 + 32);
    }

    #[test]
    fn test_tampering_is_bad_record_mac() {
        for suite in SUITES {
            let (mut writer, mut reader) = pair(suite);
            let (_, mut body) = writer
                .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, b"attack at dawn")
                .unwrap();
            let last = body.len() - 1;
            body[last] ^= 0x01;
            assert_eq!(
                reader.open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body),
                Err(Error::BadRecordMac),
                "{:?}",
                suite
            );
            assert_eq!(reader.sequence_number(), 0);
        }
    }

    #[test]
    fn test_wrong_content_type_fails_authentication() {
        let (mut writer, mut reader) = pair(CipherSuite::EcdheRsaWithAes128GcmSha256);
        let (_, body) = writer
            .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, b"data")
            .unwrap();
        assert_eq!(
            reader.open(ContentType::Handshake, ProtocolVersion::Tls12, &body),
            Err(Error::BadRecordMac)
        );
    }

    #[test]
    fn test_short_bodies_are_rejected() {
        for suite in SUITES {
            let (_, mut reader) = pair(suite);
            assert_eq!(
                reader.open(ContentType::ApplicationData, ProtocolVersion::Tls12, &[0u8; 8]),
                Err(Error::BadRecordMac)
            );
        }
    }

    proptest! {
        #[test]
        fn prop_cbc_round_trip(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let (mut writer, mut reader) = pair(CipherSuite::RsaWithAes256CbcSha256);
            let (_, body) = writer
                .seal(ContentType::ApplicationData, ProtocolVersion::Tls12, &data)
                .unwrap();
            let (_, plain) = reader
                .open(ContentType::ApplicationData, ProtocolVersion::Tls12, &body)
                .unwrap();
            prop_assert_eq!(plain, data);
        }
    }
}
