//! Block cipher interface (CBC mode).
//!
//! TLS 1.2 block suites pad and MAC at the record layer, so this interface
//! only chains whole blocks. No padding is added or removed here.

use crate::Result;

/// Block cipher algorithms, always used in CBC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCipherAlgorithm {
    /// AES-128 in CBC mode
    Aes128Cbc,
    /// AES-256 in CBC mode
    Aes256Cbc,
}

impl BlockCipherAlgorithm {
    /// Key size in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            BlockCipherAlgorithm::Aes128Cbc => 16,
            BlockCipherAlgorithm::Aes256Cbc => 32,
        }
    }

    /// Block (and IV) size in bytes.
    pub const fn block_size(self) -> usize {
        16
    }

    /// Name of this algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            BlockCipherAlgorithm::Aes128Cbc => "AES_128_CBC",
            BlockCipherAlgorithm::Aes256Cbc => "AES_256_CBC",
        }
    }
}

/// CBC block cipher.
pub trait BlockCipher: Send + Sync {
    /// Encrypt `data`, which must be a whole number of blocks.
    ///
    /// # Errors
    ///
    /// - `InvalidKeySize` / `InvalidNonceSize` on malformed key or IV
    /// - `InvalidLength` if `data` is not block aligned
    fn encrypt_blocks(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `data`, which must be a whole number of blocks.
    fn decrypt_blocks(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Get the algorithm this cipher implements.
    fn algorithm(&self) -> BlockCipherAlgorithm;

    /// Block size in bytes.
    fn block_size(&self) -> usize {
        self.algorithm().block_size()
    }
}
