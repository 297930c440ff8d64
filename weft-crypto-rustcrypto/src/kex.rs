//! Ephemeral key agreement: X25519 (`x25519-dalek`), P-256 (`p256`) and
//! finite-field Diffie-Hellman (`num-bigint`).

use num_bigint::BigUint;
use rand::rngs::OsRng;
use weft_crypto::{
    Error, KeyExchange, KeyExchangeAlgorithm, PrivateKey, PublicKey, Random, Result, SharedSecret,
};

use crate::random::OsRandom;

/// RFC 7919 ffdhe2048 prime.
pub const FFDHE2048_PRIME: &str = "\
    FFFFFFFFFFFFFFFFADF85458A2BB4A9AAFDC5620273D3CF1D8B9C583CE2D3695\
    A9E13641146433FBCC939DCE249B3EF97D2FE363630C75D8F681B202AEC4617A\
    D3DF1ED5D5FD65612433F51F5F066ED0856365553DED1AF3B557135E7F57C935\
    984F0C70E0E68B77E2A689DAF3EFE8721DF158A136ADE73530ACCA4F483A797A\
    BC0AB182B324FB61D108A94BB2C8E3FBB96ADAB760D7F4681D4F42A3DE394DF4\
    AE56EDE76372BB190B07A7C8EE0A6D709E02FCE1CDF7E2ECC03404CD28342F61\
    9172FE9CE98583FF8E4F1232EEF28183C3FE3B1B4C6FAD733BB5FCBC2EC22005\
    C58EF1837D1683B2C6F34A26C1B2EFFA886B423861285C97FFFFFFFFFFFFFFFF";

/// Create a key exchange instance for a named group.
pub fn create_key_exchange(algorithm: KeyExchangeAlgorithm) -> Result<Box<dyn KeyExchange>> {
    match algorithm {
        KeyExchangeAlgorithm::X25519 => Ok(Box::new(X25519Kex)),
        KeyExchangeAlgorithm::Secp256r1 => Ok(Box::new(EcdhP256)),
        KeyExchangeAlgorithm::Ffdhe2048 => {
            let prime = BigUint::parse_bytes(FFDHE2048_PRIME.as_bytes(), 16)
                .ok_or_else(|| Error::Internal("bad ffdhe2048 prime".into()))?;
            Ok(Box::new(FiniteFieldDh::new(
                prime,
                BigUint::from(2u8),
                KeyExchangeAlgorithm::Ffdhe2048,
            )?))
        },
        KeyExchangeAlgorithm::FiniteField => Err(Error::UnsupportedAlgorithm(
            "finite-field DH needs explicit parameters".into(),
        )),
    }
}

/// Create a finite-field DH instance over explicit parameters.
pub fn create_finite_field_dh(prime: &[u8], generator: &[u8]) -> Result<Box<dyn KeyExchange>> {
    Ok(Box::new(FiniteFieldDh::new(
        BigUint::from_bytes_be(prime),
        BigUint::from_bytes_be(generator),
        KeyExchangeAlgorithm::FiniteField,
    )?))
}

/// X25519 (RFC 7748).
#[derive(Debug)]
struct X25519Kex;

impl KeyExchange for X25519Kex {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Ok((
            PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            PublicKey::from_bytes(public.as_bytes().to_vec()),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let private: [u8; 32] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidPrivateKey)?;
        let peer: [u8; 32] = peer_public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey)?;
        let secret = x25519_dalek::StaticSecret::from(private);
        let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(Error::InvalidPublicKey);
        }
        Ok(SharedSecret::from_bytes(shared.as_bytes().to_vec()))
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::X25519
    }
}

/// ECDH over P-256 with uncompressed SEC1 points.
#[derive(Debug)]
struct EcdhP256;

impl KeyExchange for EcdhP256 {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        use p256::elliptic_curve::sec1::ToEncodedPoint;

        let secret = p256::SecretKey::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(false);
        Ok((
            PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            PublicKey::from_bytes(point.as_bytes().to_vec()),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let secret =
            p256::SecretKey::from_slice(private_key.as_bytes()).map_err(|_| Error::InvalidPrivateKey)?;
        if peer_public_key.first() != Some(&0x04) {
            return Err(Error::InvalidPublicKey);
        }
        let peer =
            p256::PublicKey::from_sec1_bytes(peer_public_key).map_err(|_| Error::InvalidPublicKey)?;
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
        Ok(SharedSecret::from_bytes(shared.raw_secret_bytes().to_vec()))
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::Secp256r1
    }
}

/// Finite-field Diffie-Hellman. Public values and secrets are left-padded to
/// the byte length of the prime.
#[derive(Debug)]
struct FiniteFieldDh {
    prime: BigUint,
    generator: BigUint,
    algorithm: KeyExchangeAlgorithm,
}

impl FiniteFieldDh {
    fn new(prime: BigUint, generator: BigUint, algorithm: KeyExchangeAlgorithm) -> Result<Self> {
        if prime.bits() < 1024 || generator < BigUint::from(2u8) || generator >= prime {
            return Err(Error::InvalidPublicKey);
        }
        Ok(Self {
            prime,
            generator,
            algorithm,
        })
    }

    fn width(&self) -> usize {
        ((self.prime.bits() + 7) / 8) as usize
    }

    fn pad(&self, value: &BigUint) -> Vec<u8> {
        let bytes = value.to_bytes_be();
        let mut out = vec![0u8; self.width().saturating_sub(bytes.len())];
        out.extend_from_slice(&bytes);
        out
    }
}

impl KeyExchange for FiniteFieldDh {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        // 256-bit exponents give the 128-bit security level of ffdhe2048.
        let mut exponent = OsRandom.generate(32)?;
        exponent[0] |= 0x80;
        let x = BigUint::from_bytes_be(&exponent);
        let y = self.generator.modpow(&x, &self.prime);
        Ok((
            PrivateKey::from_bytes(exponent),
            PublicKey::from_bytes(self.pad(&y)),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let peer = BigUint::from_bytes_be(peer_public_key);
        let one = BigUint::from(1u8);
        if peer <= one || peer >= &self.prime - &one {
            return Err(Error::InvalidPublicKey);
        }
        let x = BigUint::from_bytes_be(private_key.as_bytes());
        let z = peer.modpow(&x, &self.prime);
        if z <= one {
            return Err(Error::KeyExchangeFailed);
        }
        Ok(SharedSecret::from_bytes(self.pad(&z)))
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        self.algorithm
    }
}
