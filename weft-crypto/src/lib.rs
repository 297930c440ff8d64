//! # Weft Cryptographic Provider Interface
//!
//! Trait-based interfaces for every primitive the TLS engine consumes. The
//! engine never touches a concrete cipher; it asks a [`CryptoProvider`] for a
//! boxed primitive and drives it through these traits.
//!
//! ```text
//! CryptoProvider
//! ├── Aead          AES-GCM, ChaCha20-Poly1305
//! ├── BlockCipher   AES-CBC (TLS 1.2 block suites)
//! ├── Hash          SHA-1, SHA-256, SHA-384, SHA-512
//! ├── Hmac
//! ├── Kdf           HKDF
//! ├── Random
//! ├── KeyExchange   X25519, P-256, finite-field DH
//! ├── Signature     ECDSA, Ed25519, RSA-PSS, RSA PKCS#1 v1.5
//! └── KeyTransport  RSA PKCS#1 v1.5 encryption
//! ```
//!
//! Key material crosses the interface in standard encodings: signing keys as
//! PKCS#8 DER, verifying keys as SubjectPublicKeyInfo DER.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

pub mod aead;
pub mod block;
pub mod error;
pub mod hash;
pub mod hmac;
pub mod kdf;
pub mod key_exchange;
pub mod key_transport;
pub mod random;
pub mod signature;

pub use aead::{Aead, AeadAlgorithm};
pub use block::{BlockCipher, BlockCipherAlgorithm};
pub use error::{Error, Result};
pub use hash::{Hash, HashAlgorithm};
pub use hmac::Hmac;
pub use kdf::{Kdf, KdfAlgorithm};
pub use key_exchange::{KeyExchange, KeyExchangeAlgorithm, PrivateKey, PublicKey, SharedSecret};
pub use key_transport::KeyTransport;
pub use random::Random;
pub use signature::{Signature, SignatureAlgorithm};

/// The main cryptographic provider trait.
///
/// Implementations hand out boxed primitives on request. Every factory
/// returns `UnsupportedAlgorithm` for algorithms the backend lacks, which
/// lets the engine filter its offers by capability.
///
/// All implementations must be `Send + Sync` so one provider can be shared
/// by many connections behind an `Arc`.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Create a new instance of the crypto provider.
    fn new() -> Self
    where
        Self: Sized;

    /// Get an AEAD cipher instance.
    fn aead(&self, algorithm: AeadAlgorithm) -> Result<Box<dyn Aead>>;

    /// Get a block cipher in CBC mode.
    fn block_cipher(&self, algorithm: BlockCipherAlgorithm) -> Result<Box<dyn BlockCipher>>;

    /// Get a hash function instance.
    fn hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hash>>;

    /// Get an HMAC instance keyed with `key`.
    fn hmac(&self, algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>>;

    /// Get a KDF (Key Derivation Function) instance.
    fn kdf(&self, algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>>;

    /// Get the random number generator.
    fn random(&self) -> &dyn Random;

    /// Get a key exchange instance for a named group.
    fn key_exchange(&self, algorithm: KeyExchangeAlgorithm) -> Result<Box<dyn KeyExchange>>;

    /// Get a finite-field Diffie-Hellman instance over explicit parameters.
    ///
    /// `prime` and `generator` are big-endian unsigned integers, as carried
    /// in a TLS 1.2 ServerKeyExchange.
    fn finite_field_dh(&self, prime: &[u8], generator: &[u8]) -> Result<Box<dyn KeyExchange>>;

    /// Get a signature scheme instance.
    fn signature(&self, algorithm: SignatureAlgorithm) -> Result<Box<dyn Signature>>;

    /// Get the RSA key transport used by TLS 1.2 `RSA` key exchange.
    fn key_transport(&self) -> Result<Box<dyn KeyTransport>>;

    /// Check if the provider supports a specific AEAD algorithm.
    fn supports_aead(&self, algorithm: AeadAlgorithm) -> bool {
        self.aead(algorithm).is_ok()
    }

    /// Check if the provider supports a specific key exchange algorithm.
    fn supports_key_exchange(&self, algorithm: KeyExchangeAlgorithm) -> bool {
        self.key_exchange(algorithm).is_ok()
    }

    /// Check if the provider supports a specific signature algorithm.
    fn supports_signature(&self, algorithm: SignatureAlgorithm) -> bool {
        self.signature(algorithm).is_ok()
    }
}
