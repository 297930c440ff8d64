//! AEAD cipher implementations using `aes-gcm` and `chacha20poly1305`.

use aes_gcm::aead::{Aead as _, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use weft_crypto::{Aead, AeadAlgorithm, Error, Result};

/// Create an AEAD cipher instance for the specified algorithm.
pub fn create_aead(algorithm: AeadAlgorithm) -> Result<Box<dyn Aead>> {
    Ok(Box::new(RustCryptoAead { algorithm }))
}

/// AEAD backed by RustCrypto's AES-GCM or ChaCha20-Poly1305.
#[derive(Debug)]
struct RustCryptoAead {
    algorithm: AeadAlgorithm,
}

impl RustCryptoAead {
    fn check_sizes(&self, key: &[u8], nonce: &[u8]) -> Result<()> {
        if key.len() != self.algorithm.key_size() {
            return Err(Error::InvalidKeySize {
                expected: self.algorithm.key_size(),
                actual: key.len(),
            });
        }
        if nonce.len() != self.algorithm.nonce_size() {
            return Err(Error::InvalidNonceSize {
                expected: self.algorithm.nonce_size(),
                actual: nonce.len(),
            });
        }
        Ok(())
    }
}

fn seal_with<C: KeyInit + aes_gcm::aead::Aead>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher =
        C::new_from_slice(key).map_err(|_| Error::Internal("AEAD key rejected".into()))?;
    cipher
        .encrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| Error::EncryptionFailed)
}

fn open_with<C: KeyInit + aes_gcm::aead::Aead>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher =
        C::new_from_slice(key).map_err(|_| Error::Internal("AEAD key rejected".into()))?;
    cipher
        .decrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| Error::AuthenticationFailed)
}

impl Aead for RustCryptoAead {
    fn seal(&self, key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.check_sizes(key, nonce)?;
        match self.algorithm {
            AeadAlgorithm::Aes128Gcm => seal_with::<Aes128Gcm>(key, nonce, aad, plaintext),
            AeadAlgorithm::Aes256Gcm => seal_with::<Aes256Gcm>(key, nonce, aad, plaintext),
            AeadAlgorithm::ChaCha20Poly1305 => {
                seal_with::<ChaCha20Poly1305>(key, nonce, aad, plaintext)
            },
        }
    }

    fn open(&self, key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.check_sizes(key, nonce)?;
        if ciphertext.len() < self.algorithm.tag_size() {
            return Err(Error::AuthenticationFailed);
        }
        match self.algorithm {
            AeadAlgorithm::Aes128Gcm => open_with::<Aes128Gcm>(key, nonce, aad, ciphertext),
            AeadAlgorithm::Aes256Gcm => open_with::<Aes256Gcm>(key, nonce, aad, ciphertext),
            AeadAlgorithm::ChaCha20Poly1305 => {
                open_with::<ChaCha20Poly1305>(key, nonce, aad, ciphertext)
            },
        }
    }

    fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }
}
