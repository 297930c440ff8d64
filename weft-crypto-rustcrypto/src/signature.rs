//! Signatures: ECDSA P-256 (`p256`), Ed25519 (`ed25519-dalek`) and RSA
//! (see [`crate::rsa`]).
//!
//! Signing keys arrive as PKCS#8 DER, verifying keys as SubjectPublicKeyInfo
//! DER. ECDSA signatures use the DER `Ecdsa-Sig-Value` encoding TLS expects.

use weft_crypto::{Error, Result, Signature, SignatureAlgorithm};

use crate::rsa::{self, RsaHash, RsaPrivateKey, RsaPublicKey};

/// Create a signature instance for the specified algorithm.
pub fn create_signature(algorithm: SignatureAlgorithm) -> Result<Box<dyn Signature>> {
    Ok(match algorithm {
        SignatureAlgorithm::EcdsaSecp256r1Sha256 => Box::new(EcdsaP256Sig),
        SignatureAlgorithm::Ed25519 => Box::new(Ed25519Sig),
        SignatureAlgorithm::RsaPssRsaeSha256 => Box::new(RsaSig::pss(RsaHash::Sha256, algorithm)),
        SignatureAlgorithm::RsaPssRsaeSha384 => Box::new(RsaSig::pss(RsaHash::Sha384, algorithm)),
        SignatureAlgorithm::RsaPkcs1Sha256 => {
            Box::new(RsaSig::pkcs1(RsaHash::Sha256, algorithm))
        },
        SignatureAlgorithm::RsaPkcs1Sha384 => {
            Box::new(RsaSig::pkcs1(RsaHash::Sha384, algorithm))
        },
    })
}

/// Ed25519 signature implementation.
#[derive(Debug)]
struct Ed25519Sig;

impl Signature for Ed25519Sig {
    fn sign(&self, signing_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        use ed25519_dalek::pkcs8::DecodePrivateKey;
        use ed25519_dalek::Signer;

        let key = ed25519_dalek::SigningKey::from_pkcs8_der(signing_key)
            .map_err(|_| Error::InvalidPrivateKey)?;
        Ok(key.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, verifying_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        use ed25519_dalek::pkcs8::DecodePublicKey;
        use ed25519_dalek::Verifier;

        let key = ed25519_dalek::VerifyingKey::from_public_key_der(verifying_key)
            .map_err(|_| Error::InvalidPublicKey)?;
        let sig =
            ed25519_dalek::Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
        key.verify(message, &sig)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }
}

/// ECDSA P-256 with SHA-256.
#[derive(Debug)]
struct EcdsaP256Sig;

impl Signature for EcdsaP256Sig {
    fn sign(&self, signing_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        use p256::ecdsa::signature::Signer;
        use p256::pkcs8::DecodePrivateKey;

        let key = p256::ecdsa::SigningKey::from_pkcs8_der(signing_key)
            .map_err(|_| Error::InvalidPrivateKey)?;
        let sig: p256::ecdsa::Signature = key.sign(message);
        Ok(sig.to_der().as_bytes().to_vec())
    }

    fn verify(&self, verifying_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        use p256::ecdsa::signature::Verifier;
        use p256::pkcs8::DecodePublicKey;

        let key = p256::ecdsa::VerifyingKey::from_public_key_der(verifying_key)
            .map_err(|_| Error::InvalidPublicKey)?;
        let sig = p256::ecdsa::Signature::from_der(signature).map_err(|_| Error::InvalidSignature)?;
        key.verify(message, &sig)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::EcdsaSecp256r1Sha256
    }
}

#[derive(Debug, Clone, Copy)]
enum RsaPadding {
    Pkcs1,
    Pss,
}

/// RSA signatures, PKCS#1 v1.5 or PSS with salt length equal to the hash length.
#[derive(Debug)]
struct RsaSig {
    hash: RsaHash,
    padding: RsaPadding,
    algorithm: SignatureAlgorithm,
}

impl RsaSig {
    fn pss(hash: RsaHash, algorithm: SignatureAlgorithm) -> Self {
        Self {
            hash,
            padding: RsaPadding::Pss,
            algorithm,
        }
    }

    fn pkcs1(hash: RsaHash, algorithm: SignatureAlgorithm) -> Self {
        Self {
            hash,
            padding: RsaPadding::Pkcs1,
            algorithm,
        }
    }
}

impl Signature for RsaSig {
    fn sign(&self, signing_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let key = RsaPrivateKey::from_pkcs8(signing_key)?;
        match self.padding {
            RsaPadding::Pkcs1 => rsa::pkcs1_v15_sign(&key, self.hash, message),
            RsaPadding::Pss => rsa::pss_sign(&key, self.hash, message),
        }
    }

    fn verify(&self, verifying_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        let key = RsaPublicKey::from_spki(verifying_key)?;
        match self.padding {
            RsaPadding::Pkcs1 => rsa::pkcs1_v15_verify(&key, self.hash, message, signature),
            RsaPadding::Pss => rsa::pss_verify(&key, self.hash, message, signature),
        }
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }
}
