//! HKDF via the `hkdf` crate.

use weft_crypto::{Error, Kdf, KdfAlgorithm, Result};

/// Create a KDF instance for the specified algorithm.
pub fn create_kdf(algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>> {
    Ok(Box::new(RustCryptoHkdf { algorithm }))
}

#[derive(Debug, Clone, Copy)]
struct RustCryptoHkdf {
    algorithm: KdfAlgorithm,
}

impl Kdf for RustCryptoHkdf {
    fn extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8> {
        match self.algorithm {
            KdfAlgorithm::HkdfSha256 => {
                hkdf::Hkdf::<sha2::Sha256>::extract(Some(salt), ikm).0.to_vec()
            },
            KdfAlgorithm::HkdfSha384 => {
                hkdf::Hkdf::<sha2::Sha384>::extract(Some(salt), ikm).0.to_vec()
            },
            KdfAlgorithm::HkdfSha512 => {
                hkdf::Hkdf::<sha2::Sha512>::extract(Some(salt), ikm).0.to_vec()
            },
        }
    }

    fn expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
        let mut okm = vec![0u8; length];
        let result = match self.algorithm {
            KdfAlgorithm::HkdfSha256 => hkdf::Hkdf::<sha2::Sha256>::from_prk(prk)
                .map_err(|_| Error::InvalidLength)?
                .expand(info, &mut okm),
            KdfAlgorithm::HkdfSha384 => hkdf::Hkdf::<sha2::Sha384>::from_prk(prk)
                .map_err(|_| Error::InvalidLength)?
                .expand(info, &mut okm),
            KdfAlgorithm::HkdfSha512 => hkdf::Hkdf::<sha2::Sha512>::from_prk(prk)
                .map_err(|_| Error::InvalidLength)?
                .expand(info, &mut okm),
        };
        result.map_err(|_| Error::InvalidLength)?;
        Ok(okm)
    }

    fn algorithm(&self) -> KdfAlgorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc5869_case_1() {
        let kdf = create_kdf(KdfAlgorithm::HkdfSha256).unwrap();
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
        let prk = kdf.extract(&salt, &ikm);
        assert_eq!(
            hex::encode(&prk),
            "077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"
        );
        let okm = kdf.expand(&prk, &info, 42).unwrap();
        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf\
             34007208d5b887185865"
        );
    }

    #[test]
    fn test_expand_too_long() {
        let kdf = create_kdf(KdfAlgorithm::HkdfSha256).unwrap();
        assert_eq!(kdf.expand(&[1u8; 32], b"", 255 * 32 + 1), Err(Error::InvalidLength));
    }
}
