//! Digital signature algorithms for TLS.

use crate::Result;

/// Signature algorithms.
///
/// Wire codepoints live with the protocol layer's `SignatureScheme`; this
/// enum only names what a provider can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// ECDSA with P-256 and SHA-256 (DER-encoded signatures)
    EcdsaSecp256r1Sha256,
    /// Ed25519
    Ed25519,
    /// RSA-PSS (rsaEncryption key) with SHA-256, salt length 32
    RsaPssRsaeSha256,
    /// RSA-PSS (rsaEncryption key) with SHA-384, salt length 48
    RsaPssRsaeSha384,
    /// RSA PKCS#1 v1.5 with SHA-256
    RsaPkcs1Sha256,
    /// RSA PKCS#1 v1.5 with SHA-384
    RsaPkcs1Sha384,
}

impl SignatureAlgorithm {
    /// Get the algorithm name.
    pub const fn name(self) -> &'static str {
        match self {
            SignatureAlgorithm::EcdsaSecp256r1Sha256 => "ecdsa_secp256r1_sha256",
            SignatureAlgorithm::Ed25519 => "ed25519",
            SignatureAlgorithm::RsaPssRsaeSha256 => "rsa_pss_rsae_sha256",
            SignatureAlgorithm::RsaPssRsaeSha384 => "rsa_pss_rsae_sha384",
            SignatureAlgorithm::RsaPkcs1Sha256 => "rsa_pkcs1_sha256",
            SignatureAlgorithm::RsaPkcs1Sha384 => "rsa_pkcs1_sha384",
        }
    }

    /// TLS 1.3 forbids RSA PKCS#1 v1.5 signatures in the handshake.
    pub const fn allowed_in_tls13(self) -> bool {
        !matches!(
            self,
            SignatureAlgorithm::RsaPkcs1Sha256 | SignatureAlgorithm::RsaPkcs1Sha384
        )
    }

    /// True for the RSA family.
    pub const fn is_rsa(self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::RsaPssRsaeSha256
                | SignatureAlgorithm::RsaPssRsaeSha384
                | SignatureAlgorithm::RsaPkcs1Sha256
                | SignatureAlgorithm::RsaPkcs1Sha384
        )
    }
}

/// Digital signature trait.
///
/// `signing_key` is PKCS#8 DER and `verifying_key` is SubjectPublicKeyInfo
/// DER for every algorithm, so certificates and key files can be handed over
/// without per-algorithm unwrapping.
pub trait Signature: Send + Sync {
    /// Sign a message.
    ///
    /// # Errors
    ///
    /// - `InvalidPrivateKey` if the key does not parse or has the wrong type
    fn sign(&self, signing_key: &[u8], message: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature.
    ///
    /// # Errors
    ///
    /// - `InvalidPublicKey` if the verifying key is invalid
    /// - `InvalidSignature` if the signature cannot be parsed
    /// - `SignatureVerificationFailed` if the signature does not match
    fn verify(&self, verifying_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()>;

    /// Get the algorithm this signature implements.
    fn algorithm(&self) -> SignatureAlgorithm;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls13_restrictions() {
        assert!(!SignatureAlgorithm::RsaPkcs1Sha256.allowed_in_tls13());
        assert!(SignatureAlgorithm::RsaPssRsaeSha256.allowed_in_tls13());
        assert!(SignatureAlgorithm::Ed25519.allowed_in_tls13());
        assert!(SignatureAlgorithm::RsaPkcs1Sha384.is_rsa());
        assert!(!SignatureAlgorithm::EcdsaSecp256r1Sha256.is_rsa());
    }
}
