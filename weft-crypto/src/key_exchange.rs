//! Key exchange algorithms for TLS.

use crate::Result;
use zeroize::Zeroize;

/// Key exchange algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeAlgorithm {
    /// X25519 (Curve25519 ECDHE)
    X25519,
    /// secp256r1 (P-256 ECDHE, uncompressed points)
    Secp256r1,
    /// ffdhe2048 (RFC 7919 named finite-field group)
    Ffdhe2048,
    /// Finite-field DH over parameters chosen by the server (TLS 1.2 `DHE`).
    FiniteField,
}

impl KeyExchangeAlgorithm {
    /// Public key size in bytes, or `None` when it depends on the parameters.
    pub const fn public_key_size(self) -> Option<usize> {
        match self {
            KeyExchangeAlgorithm::X25519 => Some(32),
            KeyExchangeAlgorithm::Secp256r1 => Some(65),
            KeyExchangeAlgorithm::Ffdhe2048 => Some(256),
            KeyExchangeAlgorithm::FiniteField => None,
        }
    }

    /// Get the algorithm name.
    pub const fn name(self) -> &'static str {
        match self {
            KeyExchangeAlgorithm::X25519 => "x25519",
            KeyExchangeAlgorithm::Secp256r1 => "secp256r1",
            KeyExchangeAlgorithm::Ffdhe2048 => "ffdhe2048",
            KeyExchangeAlgorithm::FiniteField => "dhe",
        }
    }
}

/// Private key for key exchange. Zeroized on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct PrivateKey {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl PrivateKey {
    /// Create a new private key from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the private key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Public key for key exchange, in its TLS wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Create a new public key from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to owned bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Shared secret from key exchange. Zeroized on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl SharedSecret {
    /// Create a new shared secret from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the shared secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Ephemeral key agreement.
///
/// Finite-field implementations left-pad both the public value and the
/// shared secret to the byte length of the prime, as TLS 1.3 requires.
/// TLS 1.2 callers strip leading zeros from the secret themselves.
pub trait KeyExchange: Send + Sync {
    /// Generate an ephemeral key pair from a CSPRNG.
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)>;

    /// Combine our private key with the peer's public value.
    ///
    /// # Errors
    ///
    /// - `InvalidPublicKey` if the peer's value is malformed or degenerate
    /// - `KeyExchangeFailed` for other errors
    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret>;

    /// Get the algorithm this key exchange implements.
    fn algorithm(&self) -> KeyExchangeAlgorithm;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let key = PrivateKey::from_bytes(vec![0x42; 32]);
        let secret = SharedSecret::from_bytes(vec![0x42; 32]);
        assert!(!format!("{:?}", key).contains("42"));
        assert!(format!("{:?}", secret).contains("<redacted>"));
    }

    #[test]
    fn test_public_key_sizes() {
        assert_eq!(KeyExchangeAlgorithm::X25519.public_key_size(), Some(32));
        assert_eq!(KeyExchangeAlgorithm::Secp256r1.public_key_size(), Some(65));
        assert_eq!(KeyExchangeAlgorithm::FiniteField.public_key_size(), None);
    }
}
