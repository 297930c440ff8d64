//! Failures reported by a [`CryptoProvider`](crate::CryptoProvider).
//!
//! The record and handshake layers map these onto TLS alerts, so the
//! variants follow what those layers need to tell apart: a record that
//! does not open is `AuthenticationFailed`, a peer key that does not parse
//! is `InvalidPublicKey`, and so on.

use std::fmt;

/// Result of a provider operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a provider operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The provider has no implementation for this algorithm or group.
    UnsupportedAlgorithm(String),

    /// A traffic key, MAC key or private scalar had the wrong length.
    InvalidKeySize {
        /// Length the algorithm takes, in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// A per-record nonce or CBC IV had the wrong length.
    InvalidNonceSize {
        /// Length the algorithm takes, in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Input or output length out of range: ciphertext that is not a whole
    /// number of blocks, a pseudorandom key shorter than the hash, or an
    /// HKDF-Expand-Label request longer than 255 hash blocks.
    InvalidLength,

    /// An AEAD record did not open: the tag, nonce or additional data does
    /// not match what sealed it.
    AuthenticationFailed,

    /// A well-formed signature that does not verify under the given key.
    SignatureVerificationFailed,

    /// Signature bytes that cannot be parsed (bad DER, wrong length).
    InvalidSignature,

    /// A peer key share, certificate key or DH value that is malformed or
    /// outside the group.
    InvalidPublicKey,

    /// Our own key material does not parse.
    InvalidPrivateKey,

    /// The shared secret came out degenerate (all zero, or 1 in a
    /// finite-field group).
    KeyExchangeFailed,

    /// AEAD seal, CBC or RSA encryption rejected its inputs.
    EncryptionFailed,

    /// CBC or RSA decryption failed. For RSA key transport the handshake
    /// continues with a random premaster secret instead.
    DecryptionFailed,

    /// The operating system RNG returned an error.
    RandomGenerationFailed,

    /// A fixed constant or library call failed in a way the inputs cannot
    /// cause.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedAlgorithm(name) => write!(f, "{} is not available in this provider", name),
            Error::InvalidKeySize { expected, actual } => {
                write!(f, "key is {} bytes, algorithm takes {}", actual, expected)
            },
            Error::InvalidNonceSize { expected, actual } => {
                write!(f, "nonce is {} bytes, algorithm takes {}", actual, expected)
            },
            Error::InvalidLength => write!(f, "input or output length out of range"),
            Error::AuthenticationFailed => write!(f, "AEAD open failed"),
            Error::SignatureVerificationFailed => write!(f, "signature does not verify"),
            Error::InvalidSignature => write!(f, "malformed signature"),
            Error::InvalidPublicKey => write!(f, "malformed or out-of-group public key"),
            Error::InvalidPrivateKey => write!(f, "malformed private key"),
            Error::KeyExchangeFailed => write!(f, "degenerate shared secret"),
            Error::EncryptionFailed => write!(f, "encryption failed"),
            Error::DecryptionFailed => write!(f, "decryption failed"),
            Error::RandomGenerationFailed => write!(f, "system RNG failed"),
            Error::Internal(msg) => write!(f, "provider fault: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
