//! # RustCrypto-based provider for weft
//!
//! Implements [`weft_crypto::CryptoProvider`] on top of the RustCrypto
//! ecosystem, with RSA and finite-field Diffie-Hellman built on `num-bigint`.
//!
//! | family | backend |
//! |---|---|
//! | AEAD | `aes-gcm`, `chacha20poly1305` |
//! | CBC | `aes` + `cbc` |
//! | Hash / HMAC / HKDF | `sha1`, `sha2`, `hmac`, `hkdf` |
//! | Key exchange | `x25519-dalek`, `p256`, finite-field DH |
//! | Signatures | `p256` ECDSA, `ed25519-dalek`, RSA PKCS#1 v1.5 and PSS |
//! | Key transport | RSAES-PKCS1-v1_5 |
//!
//! ```rust,no_run
//! use weft_crypto::CryptoProvider;
//! use weft_crypto_rustcrypto::RustCryptoProvider;
//!
//! let provider = RustCryptoProvider::new();
//! assert!(provider.supports_aead(weft_crypto::AeadAlgorithm::Aes128Gcm));
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

use weft_crypto::{
    Aead, AeadAlgorithm, BlockCipher, BlockCipherAlgorithm, CryptoProvider, Hash, HashAlgorithm,
    Hmac, Kdf, KdfAlgorithm, KeyExchange, KeyExchangeAlgorithm, KeyTransport, Random, Result,
    Signature, SignatureAlgorithm,
};

pub mod aead;
pub mod block;
pub mod der;
pub mod hash;
pub mod hkdf;
pub mod hmac;
pub mod kex;
pub mod random;
mod rsa;
pub mod signature;

pub use random::OsRandom;
pub use rsa::RsaKeyTransport;

/// Crypto provider backed by RustCrypto crates.
#[derive(Debug, Default)]
pub struct RustCryptoProvider {
    random: OsRandom,
}

impl CryptoProvider for RustCryptoProvider {
    fn new() -> Self {
        Self { random: OsRandom }
    }

    fn aead(&self, algorithm: AeadAlgorithm) -> Result<Box<dyn Aead>> {
        aead::create_aead(algorithm)
    }

    fn block_cipher(&self, algorithm: BlockCipherAlgorithm) -> Result<Box<dyn BlockCipher>> {
        block::create_block_cipher(algorithm)
    }

    fn hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hash>> {
        hash::create_hash(algorithm)
    }

    fn hmac(&self, algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
        hmac::create_hmac(algorithm, key)
    }

    fn kdf(&self, algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>> {
        hkdf::create_kdf(algorithm)
    }

    fn random(&self) -> &dyn Random {
        &self.random
    }

    fn key_exchange(&self, algorithm: KeyExchangeAlgorithm) -> Result<Box<dyn KeyExchange>> {
        kex::create_key_exchange(algorithm)
    }

    fn finite_field_dh(&self, prime: &[u8], generator: &[u8]) -> Result<Box<dyn KeyExchange>> {
        kex::create_finite_field_dh(prime, generator)
    }

    fn signature(&self, algorithm: SignatureAlgorithm) -> Result<Box<dyn Signature>> {
        signature::create_signature(algorithm)
    }

    fn key_transport(&self) -> Result<Box<dyn KeyTransport>> {
        Ok(Box::new(RsaKeyTransport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aead_support() {
        let provider = RustCryptoProvider::new();
        assert!(provider.supports_aead(AeadAlgorithm::Aes128Gcm));
        assert!(provider.supports_aead(AeadAlgorithm::Aes256Gcm));
        assert!(provider.supports_aead(AeadAlgorithm::ChaCha20Poly1305));
    }

    #[test]
    fn test_key_exchange_support() {
        let provider = RustCryptoProvider::new();
        assert!(provider.supports_key_exchange(KeyExchangeAlgorithm::X25519));
        assert!(provider.supports_key_exchange(KeyExchangeAlgorithm::Secp256r1));
        assert!(provider.supports_key_exchange(KeyExchangeAlgorithm::Ffdhe2048));
        assert!(!provider.supports_key_exchange(KeyExchangeAlgorithm::FiniteField));
    }

    #[test]
    fn test_signature_support() {
        let provider = RustCryptoProvider::new();
        assert!(provider.supports_signature(SignatureAlgorithm::Ed25519));
        assert!(provider.supports_signature(SignatureAlgorithm::EcdsaSecp256r1Sha256));
        assert!(provider.supports_signature(SignatureAlgorithm::RsaPssRsaeSha256));
    }
}
