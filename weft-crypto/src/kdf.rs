//! Key Derivation Function (KDF) interface.
//!
//! TLS 1.3 derives all of its secrets with HKDF (RFC 5869). The TLS 1.2 PRF
//! is built on [`crate::Hmac`] inside the engine and has no entry here.

use crate::{HashAlgorithm, Result};

/// KDF algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfAlgorithm {
    /// HKDF with SHA-256
    HkdfSha256,
    /// HKDF with SHA-384
    HkdfSha384,
    /// HKDF with SHA-512
    HkdfSha512,
}

impl KdfAlgorithm {
    /// Get the underlying hash algorithm.
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            KdfAlgorithm::HkdfSha256 => HashAlgorithm::Sha256,
            KdfAlgorithm::HkdfSha384 => HashAlgorithm::Sha384,
            KdfAlgorithm::HkdfSha512 => HashAlgorithm::Sha512,
        }
    }

    /// Get the name of this KDF algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            KdfAlgorithm::HkdfSha256 => "HKDF-SHA256",
            KdfAlgorithm::HkdfSha384 => "HKDF-SHA384",
            KdfAlgorithm::HkdfSha512 => "HKDF-SHA512",
        }
    }
}

/// HKDF.
pub trait Kdf: Send + Sync {
    /// HKDF-Extract: returns a pseudorandom key of the hash output size.
    ///
    /// An empty `salt` is treated as a string of zero bytes, per RFC 5869.
    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8>;

    /// HKDF-Expand: expand `prk` to `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLength` if `length` exceeds 255 times the hash size.
    fn expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>>;

    /// Get the KDF algorithm.
    fn algorithm(&self) -> KdfAlgorithm;

    /// Get the output size of the underlying hash function.
    fn hash_output_size(&self) -> usize {
        self.algorithm().hash_algorithm().output_size()
    }
}
