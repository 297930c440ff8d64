//! Hash function interface.

use crate::kdf::KdfAlgorithm;

/// Hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1 (20 bytes output). Only used as the record MAC of legacy CBC suites.
    Sha1,
    /// SHA-256 (32 bytes output)
    Sha256,
    /// SHA-384 (48 bytes output)
    Sha384,
    /// SHA-512 (64 bytes output)
    Sha512,
}

impl HashAlgorithm {
    /// Get the output size in bytes for this hash algorithm.
    pub const fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Get the name of this algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Get the HKDF variant matching this hash function.
    ///
    /// SHA-1 has no HKDF use in TLS and yields `None`.
    pub const fn to_kdf_algorithm(self) -> Option<KdfAlgorithm> {
        match self {
            HashAlgorithm::Sha1 => None,
            HashAlgorithm::Sha256 => Some(KdfAlgorithm::HkdfSha256),
            HashAlgorithm::Sha384 => Some(KdfAlgorithm::HkdfSha384),
            HashAlgorithm::Sha512 => Some(KdfAlgorithm::HkdfSha512),
        }
    }
}

/// Incremental hash function.
pub trait Hash: Send {
    /// Update the hash state with more data.
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Get the output size in bytes for this hash function.
    fn output_size(&self) -> usize {
        self.algorithm().output_size()
    }

    /// Get the algorithm this hash implements.
    fn algorithm(&self) -> HashAlgorithm;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_sizes() {
        assert_eq!(HashAlgorithm::Sha1.output_size(), 20);
        assert_eq!(HashAlgorithm::Sha256.output_size(), 32);
        assert_eq!(HashAlgorithm::Sha384.output_size(), 48);
    }

    #[test]
    fn test_kdf_mapping() {
        assert_eq!(HashAlgorithm::Sha1.to_kdf_algorithm(), None);
        assert_eq!(
            HashAlgorithm::Sha384.to_kdf_algorithm(),
            Some(KdfAlgorithm::HkdfSha384)
        );
    }
}
