//! HMAC via the `hmac` crate.

use hmac::Mac;
use weft_crypto::{Error, HashAlgorithm, Hmac, Result};

/// Create an HMAC instance keyed with `key`.
pub fn create_hmac(algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
    Ok(match algorithm {
        HashAlgorithm::Sha1 => Box::new(MacHmac::<hmac::Hmac<sha1::Sha1>>::new(algorithm, key)?),
        HashAlgorithm::Sha256 => {
            Box::new(MacHmac::<hmac::Hmac<sha2::Sha256>>::new(algorithm, key)?)
        },
        HashAlgorithm::Sha384 => {
            Box::new(MacHmac::<hmac::Hmac<sha2::Sha384>>::new(algorithm, key)?)
        },
        HashAlgorithm::Sha512 => {
            Box::new(MacHmac::<hmac::Hmac<sha2::Sha512>>::new(algorithm, key)?)
        },
    })
}

struct MacHmac<M> {
    inner: M,
    algorithm: HashAlgorithm,
}

impl<M: Mac + hmac::digest::KeyInit> MacHmac<M> {
    fn new(algorithm: HashAlgorithm, key: &[u8]) -> Result<Self> {
        let inner = <M as Mac>::new_from_slice(key)
            .map_err(|_| Error::Internal("HMAC key rejected".into()))?;
        Ok(Self { inner, algorithm })
    }
}

impl<M> std::fmt::Debug for MacHmac<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacHmac")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl<M: Mac + Send + 'static> Hmac for MacHmac<M> {
    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.inner, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.inner.finalize().into_bytes().to_vec()
    }

    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_case_2() {
        let mut mac = create_hmac(HashAlgorithm::Sha256, b"Jefe").unwrap();
        mac.update(b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac.finalize()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_constant_time_path() {
        let mut mac = create_hmac(HashAlgorithm::Sha1, b"key").unwrap();
        mac.update(b"The quick brown fox jumps over the lazy dog");
        let tag = hex::decode("de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9").unwrap();
        assert!(mac.verify(&tag));
    }
}
