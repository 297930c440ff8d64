//! Key derivation for both protocol versions.
//!
//! - [`prf`]: the TLS 1.2 PRF, master secret, key block and Finished.
//! - [`tls13`]: the TLS 1.3 HKDF secret tree.
//!
//! Everything here is a pure function of its inputs; the handlers decide
//! when each derivation happens.

pub mod prf;
pub mod tls13;

use core::fmt;

use subtle::ConstantTimeEq;
use weft_crypto::{CryptoProvider, HashAlgorithm, Kdf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Secret key material, wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wrap raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length secret.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Secret {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {}])", self.0.len())
    }
}

/// Hash `data` in one shot.
pub fn digest(provider: &dyn CryptoProvider, hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    let mut h = provider.hash(hash)?;
    h.update(data);
    Ok(h.finalize())
}

/// HMAC `data` in one shot.
pub fn hmac(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut mac = provider.hmac(hash, key)?;
    mac.update(data);
    Ok(mac.finalize())
}

pub(crate) fn kdf(provider: &dyn CryptoProvider, hash: HashAlgorithm) -> Result<Box<dyn Kdf>> {
    let algorithm = hash
        .to_kdf_algorithm()
        .ok_or_else(|| Error::Internal(format!("no HKDF over {}", hash.name())))?;
    Ok(provider.kdf(algorithm)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new(vec![0x41; 4]);
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED; 4])");
    }

    #[test]
    fn test_secret_equality() {
        assert_eq!(Secret::new(vec![1, 2]), Secret::from(vec![1, 2]));
        assert_ne!(Secret::new(vec![1, 2]), Secret::new(vec![1, 3]));
        assert_ne!(Secret::new(vec![1, 2]), Secret::new(vec![1]));
    }
}
