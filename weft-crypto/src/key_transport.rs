//! RSA key transport (RSAES-PKCS1-v1_5), used by TLS 1.2 `RSA` key exchange
//! to carry the pre-master secret to the server.

use crate::Result;

/// RSA PKCS#1 v1.5 encryption.
pub trait KeyTransport: Send + Sync {
    /// Encrypt `plaintext` to the RSA key in `public_key` (SubjectPublicKeyInfo DER).
    fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` with the RSA key in `private_key` (PKCS#8 DER).
    ///
    /// # Errors
    ///
    /// Returns `DecryptionFailed` on any padding error. Callers in the TLS
    /// handshake must not reveal this outcome to the peer.
    fn decrypt(&self, private_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}
