//! Cipher suites and their static descriptors.
//!
//! A TLS 1.2 suite names the whole construction:
//! `TLS_{KeyExchange}_{Authentication}_WITH_{Bulk}_{Mode}_{Hash}`.
//! A TLS 1.3 suite only names the AEAD and the HKDF hash; key exchange and
//! authentication are negotiated by extensions.

use weft_crypto::{AeadAlgorithm, BlockCipherAlgorithm, HashAlgorithm};

use crate::protocol::ProtocolVersion;

open_u16_enum! {
    /// Cipher suite identifier.
    pub enum CipherSuite {
        /// TLS_EMPTY_RENEGOTIATION_INFO_SCSV (RFC 5746), signalling only
        EmptyRenegotiationInfoScsv = 0x00ff,
        /// TLS_RSA_WITH_AES_128_CBC_SHA
        RsaWithAes128CbcSha = 0x002f,
        /// TLS_DHE_RSA_WITH_AES_128_CBC_SHA
        DheRsaWithAes128CbcSha = 0x0033,
        /// TLS_RSA_WITH_AES_256_CBC_SHA
        RsaWithAes256CbcSha = 0x0035,
        /// TLS_DHE_RSA_WITH_AES_256_CBC_SHA
        DheRsaWithAes256CbcSha = 0x0039,
        /// TLS_RSA_WITH_AES_128_CBC_SHA256
        RsaWithAes128CbcSha256 = 0x003c,
        /// TLS_RSA_WITH_AES_256_CBC_SHA256
        RsaWithAes256CbcSha256 = 0x003d,
        /// TLS_DHE_RSA_WITH_AES_128_CBC_SHA256
        DheRsaWithAes128CbcSha256 = 0x0067,
        /// TLS_DHE_RSA_WITH_AES_256_CBC_SHA256
        DheRsaWithAes256CbcSha256 = 0x006b,
        /// TLS_RSA_WITH_AES_128_GCM_SHA256
        RsaWithAes128GcmSha256 = 0x009c,
        /// TLS_RSA_WITH_AES_256_GCM_SHA384
        RsaWithAes256GcmSha384 = 0x009d,
        /// TLS_DHE_RSA_WITH_AES_128_GCM_SHA256
        DheRsaWithAes128GcmSha256 = 0x009e,
        /// TLS_DHE_RSA_WITH_AES_256_GCM_SHA384
        DheRsaWithAes256GcmSha384 = 0x009f,
        /// TLS_AES_128_GCM_SHA256
        Tls13Aes128GcmSha256 = 0x1301,
        /// TLS_AES_256_GCM_SHA384
        Tls13Aes256GcmSha384 = 0x1302,
        /// TLS_CHACHA20_POLY1305_SHA256
        Tls13ChaCha20Poly1305Sha256 = 0x1303,
        /// TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA
        EcdheEcdsaWithAes128CbcSha = 0xc009,
        /// TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA
        EcdheEcdsaWithAes256CbcSha = 0xc00a,
        /// TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
        EcdheRsaWithAes128CbcSha = 0xc013,
        /// TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
        EcdheRsaWithAes256CbcSha = 0xc014,
        /// TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256
        EcdheEcdsaWithAes128CbcSha256 = 0xc023,
        /// TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384
        EcdheEcdsaWithAes256CbcSha384 = 0xc024,
        /// TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256
        EcdheRsaWithAes128CbcSha256 = 0xc027,
        /// TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384
        EcdheRsaWithAes256CbcSha384 = 0xc028,
        /// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        EcdheEcdsaWithAes128GcmSha256 = 0xc02b,
        /// TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
        EcdheEcdsaWithAes256GcmSha384 = 0xc02c,
        /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        EcdheRsaWithAes128GcmSha256 = 0xc02f,
        /// TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
        EcdheRsaWithAes256GcmSha384 = 0xc030,
        /// TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
        EcdheRsaWithChaCha20Poly1305Sha256 = 0xcca8,
        /// TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
        EcdheEcdsaWithChaCha20Poly1305Sha256 = 0xcca9,
    }
}

impl CipherSuite {
    /// Static descriptor, `None` for signalling values and unknown suites.
    pub fn descriptor(self) -> Option<&'static CipherSuiteDescriptor> {
        SUITES.iter().find(|d| d.suite == self)
    }

    /// Look a suite up by its IANA name, e.g. `TLS_AES_128_GCM_SHA256`.
    pub fn from_name(name: &str) -> Option<Self> {
        SUITES
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .map(|d| d.suite)
    }

    /// IANA name, or `"unknown"`.
    pub fn name(self) -> &'static str {
        self.descriptor().map_or("unknown", |d| d.name)
    }
}

/// How the premaster secret is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeMethod {
    /// RSA key transport (TLS 1.2)
    Rsa,
    /// Finite-field ephemeral Diffie-Hellman (TLS 1.2)
    Dhe,
    /// Elliptic-curve ephemeral Diffie-Hellman (TLS 1.2)
    Ecdhe,
    /// Negotiated through key_share / pre_shared_key (TLS 1.3)
    Tls13,
}

/// Certificate key type the suite requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authentication {
    /// RSA certificate
    Rsa,
    /// ECDSA certificate
    Ecdsa,
    /// Any key type (TLS 1.3)
    Any,
}

/// Bulk cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkCipher {
    /// AES with a 128-bit key
    Aes128,
    /// AES with a 256-bit key
    Aes256,
    /// ChaCha20
    ChaCha20,
}

/// Record protection construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// CBC with HMAC, MAC-then-encrypt
    Cbc,
    /// Galois/Counter Mode
    Gcm,
    /// ChaCha20-Poly1305
    Poly1305,
}

/// Everything the record layer and key schedule need to know about a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteDescriptor {
    /// Suite identifier
    pub suite: CipherSuite,
    /// IANA name
    pub name: &'static str,
    /// Key exchange
    pub key_exchange: KeyExchangeMethod,
    /// Required certificate type
    pub authentication: Authentication,
    /// Bulk cipher
    pub bulk: BulkCipher,
    /// Mode
    pub mode: CipherMode,
    /// Record MAC hash, CBC suites only
    pub mac: Option<HashAlgorithm>,
    /// PRF hash (TLS 1.2) or HKDF / transcript hash (TLS 1.3)
    pub hash: HashAlgorithm,
}

impl CipherSuiteDescriptor {
    /// True for the three TLS 1.3 suites.
    pub fn is_tls13(&self) -> bool {
        self.key_exchange == KeyExchangeMethod::Tls13
    }

    /// Whether the suite can be negotiated at `version`.
    pub fn usable_with(&self, version: ProtocolVersion) -> bool {
        match version {
            ProtocolVersion::Tls13 => self.is_tls13(),
            ProtocolVersion::Tls12 => !self.is_tls13(),
            _ => false,
        }
    }

    /// Whether a ServerKeyExchange message is sent (TLS 1.2).
    pub fn needs_server_key_exchange(&self) -> bool {
        matches!(
            self.key_exchange,
            KeyExchangeMethod::Dhe | KeyExchangeMethod::Ecdhe
        )
    }

    /// Bulk key length.
    pub fn key_len(&self) -> usize {
        match self.bulk {
            BulkCipher::Aes128 => 16,
            BulkCipher::Aes256 | BulkCipher::ChaCha20 => 32,
        }
    }

    /// Implicit IV length taken from the key block or traffic secret.
    pub fn fixed_iv_len(&self) -> usize {
        match (self.mode, self.is_tls13()) {
            (CipherMode::Cbc, _) => 0,
            (CipherMode::Gcm, false) => 4,
            _ => 12,
        }
    }

    /// Per-record explicit IV or nonce length (TLS 1.2).
    pub fn record_iv_len(&self) -> usize {
        match (self.mode, self.is_tls13()) {
            (CipherMode::Cbc, _) => 16,
            (CipherMode::Gcm, false) => 8,
            _ => 0,
        }
    }

    /// MAC key length, zero for AEAD suites.
    pub fn mac_key_len(&self) -> usize {
        self.mac.map_or(0, |h| h.output_size())
    }

    /// AEAD algorithm, for GCM and Poly1305 suites.
    pub fn aead_algorithm(&self) -> Option<AeadAlgorithm> {
        match (self.mode, self.bulk) {
            (CipherMode::Gcm, BulkCipher::Aes128) => Some(AeadAlgorithm::Aes128Gcm),
            (CipherMode::Gcm, BulkCipher::Aes256) => Some(AeadAlgorithm::Aes256Gcm),
            (CipherMode::Poly1305, _) => Some(AeadAlgorithm::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Block cipher, for CBC suites.
    pub fn block_algorithm(&self) -> Option<BlockCipherAlgorithm> {
        match (self.mode, self.bulk) {
            (CipherMode::Cbc, BulkCipher::Aes128) => Some(BlockCipherAlgorithm::Aes128Cbc),
            (CipherMode::Cbc, BulkCipher::Aes256) => Some(BlockCipherAlgorithm::Aes256Cbc),
            _ => None,
        }
    }
}

const fn tls13(
    suite: CipherSuite,
    name: &'static str,
    bulk: BulkCipher,
    mode: CipherMode,
    hash: HashAlgorithm,
) -> CipherSuiteDescriptor {
    CipherSuiteDescriptor {
        suite,
        name,
        key_exchange: KeyExchangeMethod::Tls13,
        authentication: Authentication::Any,
        bulk,
        mode,
        mac: None,
        hash,
    }
}

const fn tls12(
    suite: CipherSuite,
    name: &'static str,
    key_exchange: KeyExchangeMethod,
    authentication: Authentication,
    bulk: BulkCipher,
    mode: CipherMode,
    mac: Option<HashAlgorithm>,
    hash: HashAlgorithm,
) -> CipherSuiteDescriptor {
    CipherSuiteDescriptor {
        suite,
        name,
        key_exchange,
        authentication,
        bulk,
        mode,
        mac,
        hash,
    }
}

use self::Authentication::{Ecdsa, Rsa as RsaAuth};
use self::BulkCipher::{Aes128, Aes256, ChaCha20};
use self::CipherMode::{Cbc, Gcm, Poly1305};
use self::KeyExchangeMethod::{Dhe, Ecdhe, Rsa as RsaKx};
use weft_crypto::HashAlgorithm::{Sha1, Sha256, Sha384};

/// Every supported suite, in default preference order.
pub static SUITES: &[CipherSuiteDescriptor] = &[
    tls13(CipherSuite::Tls13Aes128GcmSha256, "TLS_AES_128_GCM_SHA256", Aes128, Gcm, Sha256),
    tls13(CipherSuite::Tls13Aes256GcmSha384, "TLS_AES_256_GCM_SHA384", Aes256, Gcm, Sha384),
    tls13(
        CipherSuite::Tls13ChaCha20Poly1305Sha256,
        "TLS_CHACHA20_POLY1305_SHA256",
        ChaCha20,
        Poly1305,
        Sha256,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithAes128GcmSha256,
        "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        Ecdhe, Ecdsa, Aes128, Gcm, None, Sha256,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithAes256GcmSha384,
        "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        Ecdhe, Ecdsa, Aes256, Gcm, None, Sha384,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithChaCha20Poly1305Sha256,
        "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        Ecdhe, Ecdsa, ChaCha20, Poly1305, None, Sha256,
    ),
    tls12(
        CipherSuite::EcdheRsaWithAes128GcmSha256,
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        Ecdhe, RsaAuth, Aes128, Gcm, None, Sha256,
    ),
    tls12(
        CipherSuite::EcdheRsaWithAes256GcmSha384,
        "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        Ecdhe, RsaAuth, Aes256, Gcm, None, Sha384,
    ),
    tls12(
        CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256,
        "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        Ecdhe, RsaAuth, ChaCha20, Poly1305, None, Sha256,
    ),
    tls12(
        CipherSuite::DheRsaWithAes128GcmSha256,
        "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256",
        Dhe, RsaAuth, Aes128, Gcm, None, Sha256,
    ),
    tls12(
        CipherSuite::DheRsaWithAes256GcmSha384,
        "TLS_DHE_RSA_WITH_AES_256_GCM_SHA384",
        Dhe, RsaAuth, Aes256, Gcm, None, Sha384,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithAes128CbcSha256,
        "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256",
        Ecdhe, Ecdsa, Aes128, Cbc, Some(Sha256), Sha256,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithAes256CbcSha384,
        "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384",
        Ecdhe, Ecdsa, Aes256, Cbc, Some(Sha384), Sha384,
    ),
    tls12(
        CipherSuite::EcdheRsaWithAes128CbcSha256,
        "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        Ecdhe, RsaAuth, Aes128, Cbc, Some(Sha256), Sha256,
    ),
    tls12(
        CipherSuite::EcdheRsaWithAes256CbcSha384,
        "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
        Ecdhe, RsaAuth, Aes256, Cbc, Some(Sha384), Sha384,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithAes128CbcSha,
        "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        Ecdhe, Ecdsa, Aes128, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::EcdheEcdsaWithAes256CbcSha,
        "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        Ecdhe, Ecdsa, Aes256, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::EcdheRsaWithAes128CbcSha,
        "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        Ecdhe, RsaAuth, Aes128, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::EcdheRsaWithAes256CbcSha,
        "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        Ecdhe, RsaAuth, Aes256, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::DheRsaWithAes128CbcSha256,
        "TLS_DHE_RSA_WITH_AES_128_CBC_SHA256",
        Dhe, RsaAuth, Aes128, Cbc, Some(Sha256), Sha256,
    ),
    tls12(
        CipherSuite::DheRsaWithAes256CbcSha256,
        "TLS_DHE_RSA_WITH_AES_256_CBC_SHA256",
        Dhe, RsaAuth, Aes256, Cbc, Some(Sha256), Sha256,
    ),
    tls12(
        CipherSuite::DheRsaWithAes128CbcSha,
        "TLS_DHE_RSA_WITH_AES_128_CBC_SHA",
        Dhe, RsaAuth, Aes128, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::DheRsaWithAes256CbcSha,
        "TLS_DHE_RSA_WITH_AES_256_CBC_SHA",
        Dhe, RsaAuth, Aes256, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::RsaWithAes128GcmSha256,
        "TLS_RSA_WITH_AES_128_GCM_SHA256",
        RsaKx, RsaAuth, Aes128, Gcm, None, Sha256,
    ),
    tls12(
        CipherSuite::RsaWithAes256GcmSha384,
        "TLS_RSA_WITH_AES_256_GCM_SHA384",
        RsaKx, RsaAuth, Aes256, Gcm, None, Sha384,
    ),
    tls12(
        CipherSuite::RsaWithAes128CbcSha256,
        "TLS_RSA_WITH_AES_128_CBC_SHA256",
        RsaKx, RsaAuth, Aes128, Cbc, Some(Sha256), Sha256,
    ),
    tls12(
        CipherSuite::RsaWithAes256CbcSha256,
        "TLS_RSA_WITH_AES_256_CBC_SHA256",
        RsaKx, RsaAuth, Aes256, Cbc, Some(Sha256), Sha256,
    ),
    tls12(
        CipherSuite::RsaWithAes128CbcSha,
        "TLS_RSA_WITH_AES_128_CBC_SHA",
        RsaKx, RsaAuth, Aes128, Cbc, Some(Sha1), Sha256,
    ),
    tls12(
        CipherSuite::RsaWithAes256CbcSha,
        "TLS_RSA_WITH_AES_256_CBC_SHA",
        RsaKx, RsaAuth, Aes256, Cbc, Some(Sha1), Sha256,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_suite_has_a_descriptor() {
        for d in SUITES {
            assert_eq!(d.suite.descriptor(), Some(d));
            assert_eq!(CipherSuite::from_name(d.name), Some(d.suite));
            assert!(d.aead_algorithm().is_some() ^ d.block_algorithm().is_some());
            assert_eq!(d.mac.is_some(), d.mode == CipherMode::Cbc);
        }
        assert_eq!(SUITES.len(), 29);
    }

    #[test]
    fn test_signalling_and_unknown_suites() {
        assert_eq!(CipherSuite::EmptyRenegotiationInfoScsv.descriptor(), None);
        assert_eq!(CipherSuite::from_u16(0x00ff), CipherSuite::EmptyRenegotiationInfoScsv);
        assert_eq!(CipherSuite::from_u16(0x1305), CipherSuite::Unknown(0x1305));
        assert_eq!(CipherSuite::Unknown(0x1305).name(), "unknown");
    }

    #[test]
    fn test_iv_and_key_sizes() {
        let gcm = CipherSuite::EcdheRsaWithAes128GcmSha256.descriptor().unwrap();
        assert_eq!((gcm.key_len(), gcm.fixed_iv_len(), gcm.record_iv_len()), (16, 4, 8));

        let chacha = CipherSuite::EcdheRsaWithChaCha20Poly1305Sha256
            .descriptor()
            .unwrap();
        assert_eq!((chacha.key_len(), chacha.fixed_iv_len(), chacha.record_iv_len()), (32, 12, 0));

        let cbc = CipherSuite::RsaWithAes256CbcSha.descriptor().unwrap();
        assert_eq!((cbc.key_len(), cbc.mac_key_len(), cbc.record_iv_len()), (32, 20, 16));
        assert!(!cbc.needs_server_key_exchange());

        let tls13 = CipherSuite::Tls13Aes256GcmSha384.descriptor().unwrap();
        assert_eq!((tls13.key_len(), tls13.fixed_iv_len()), (32, 12));
        assert_eq!(tls13.hash, HashAlgorithm::Sha384);
        assert!(tls13.usable_with(ProtocolVersion::Tls13));
        assert!(!tls13.usable_with(ProtocolVersion::Tls12));
    }

    #[test]
    fn test_prf_hash_follows_suite_name() {
        let d = CipherSuite::EcdheEcdsaWithAes256CbcSha384.descriptor().unwrap();
        assert_eq!(d.hash, HashAlgorithm::Sha384);
        let d = CipherSuite::DheRsaWithAes256CbcSha.descriptor().unwrap();
        assert_eq!(d.hash, HashAlgorithm::Sha256);
        assert_eq!(d.mac, Some(HashAlgorithm::Sha1));
    }
}
