//! AES-CBC using the `aes` and `cbc` crates.

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use weft_crypto::{BlockCipher, BlockCipherAlgorithm, Error, Result};

/// Create a CBC block cipher for the specified algorithm.
pub fn create_block_cipher(algorithm: BlockCipherAlgorithm) -> Result<Box<dyn BlockCipher>> {
    Ok(Box::new(AesCbc { algorithm }))
}

#[derive(Debug)]
struct AesCbc {
    algorithm: BlockCipherAlgorithm,
}

impl AesCbc {
    fn check(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<()> {
        if key.len() != self.algorithm.key_size() {
            return Err(Error::InvalidKeySize {
                expected: self.algorithm.key_size(),
                actual: key.len(),
            });
        }
        if iv.len() != self.algorithm.block_size() {
            return Err(Error::InvalidNonceSize {
                expected: self.algorithm.block_size(),
                actual: iv.len(),
            });
        }
        if data.len() % self.algorithm.block_size() != 0 {
            return Err(Error::InvalidLength);
        }
        Ok(())
    }
}

fn encrypt_with<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>>
where
    C: KeyIvInit + BlockEncryptMut,
{
    let cipher = C::new_from_slices(key, iv).map_err(|_| Error::EncryptionFailed)?;
    Ok(cipher.encrypt_padded_vec_mut::<NoPadding>(data))
}

fn decrypt_with<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>>
where
    C: KeyIvInit + BlockDecryptMut,
{
    let cipher = C::new_from_slices(key, iv).map_err(|_| Error::DecryptionFailed)?;
    cipher
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|_| Error::DecryptionFailed)
}

impl BlockCipher for AesCbc {
    fn encrypt_blocks(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        self.check(key, iv, data)?;
        match self.algorithm {
            BlockCipherAlgorithm::Aes128Cbc => {
                encrypt_with::<cbc::Encryptor<aes::Aes128>>(key, iv, data)
            },
            BlockCipherAlgorithm::Aes256Cbc => {
                encrypt_with::<cbc::Encryptor<aes::Aes256>>(key, iv, data)
            },
        }
    }

    fn decrypt_blocks(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        self.check(key, iv, data)?;
        match self.algorithm {
            BlockCipherAlgorithm::Aes128Cbc => {
                decrypt_with::<cbc::Decryptor<aes::Aes128>>(key, iv, data)
            },
            BlockCipherAlgorithm::Aes256Cbc => {
                decrypt_with::<cbc::Decryptor<aes::Aes256>>(key, iv, data)
            },
        }
    }

    fn algorithm(&self) -> BlockCipherAlgorithm {
        self.algorithm
    }
}
