//! TLS 1.2 PRF (RFC 5246 Section 5) and the derivations built on it.
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
//!                        HMAC_hash(secret, A(2) + seed) + ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```

use weft_crypto::{CryptoProvider, HashAlgorithm};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{hmac, Secret};
use crate::cipher::CipherSuiteDescriptor;
use crate::error::Result;
use crate::protocol::Role;

/// Length of the TLS 1.2 master secret.
pub const MASTER_SECRET_LEN: usize = 48;

/// Length of TLS 1.2 Finished verify_data.
pub const VERIFY_DATA_LEN: usize = 12;

/// Compute `PRF(secret, label, seed)` truncated to `len` bytes.
pub fn prf(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    len: usize,
) -> Result<Vec<u8>> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    let mut out = Vec::with_capacity(len + hash.output_size());
    let mut a = hmac(provider, hash, secret, &label_seed)?;
    while out.len() < len {
        let mut mac = provider.hmac(hash, secret)?;
        mac.update(&a);
        mac.update(&label_seed);
        out.extend_from_slice(&mac.finalize());
        a = hmac(provider, hash, secret, &a)?;
    }
    out.truncate(len);
    Ok(out)
}

/// `master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)[0..48]`
pub fn master_secret(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Secret> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);
    prf(
        provider,
        hash,
        pre_master_secret,
        b"master secret",
        &seed,
        MASTER_SECRET_LEN,
    )
    .map(Secret::new)
}

/// Record keys for both directions, sliced from one PRF output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyBlock {
    /// client_write_MAC_key
    pub client_mac: Vec<u8>,
    /// server_write_MAC_key
    pub server_mac: Vec<u8>,
    /// client_write_key
    pub client_key: Vec<u8>,
    /// server_write_key
    pub server_key: Vec<u8>,
    /// client_write_IV
    pub client_iv: Vec<u8>,
    /// server_write_IV
    pub server_iv: Vec<u8>,
}

impl KeyBlock {
    /// `PRF(master_secret, "key expansion", server_random + client_random)`,
    /// sliced client MAC, server MAC, client key, server key, client IV,
    /// server IV.
    pub fn derive(
        provider: &dyn CryptoProvider,
        suite: &CipherSuiteDescriptor,
        master_secret: &Secret,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<Self> {
        let mac_len = suite.mac_key_len();
        let key_len = suite.key_len();
        let iv_len = suite.fixed_iv_len();

        let mut seed = [0u8; 64];
        seed[..32].copy_from_slice(server_random);
        seed[32..].copy_from_slice(client_random);
        let block = Secret::new(prf(
            provider,
            suite.hash,
            master_secret.as_bytes(),
            b"key expansion",
            &seed,
            2 * (mac_len + key_len + iv_len),
        )?);

        let mut rest = block.as_bytes();
        let mut next = |n: usize| {
            let (head, tail) = rest.split_at(n);
            rest = tail;
            head.to_vec()
        };
        Ok(Self {
            client_mac: next(mac_len),
            server_mac: next(mac_len),
            client_key: next(key_len),
            server_key: next(key_len),
            client_iv: next(iv_len),
            server_iv: next(iv_len),
        })
    }
}

impl core::fmt::Debug for KeyBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("KeyBlock([REDACTED])")
    }
}

/// `PRF(master_secret, finished_label, Hash(handshake_messages))[0..12]`
pub fn finished_verify_data(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    master_secret: &Secret,
    sender: Role,
    transcript_hash: &[u8],
) -> Result<Vec<u8>> {
    let label: &[u8] = match sender {
        Role::Client => b"client finished",
        Role::Server => b"server finished",
    };
    prf(
        provider,
        hash,
        master_secret.as_bytes(),
        label,
        transcript_hash,
        VERIFY_DATA_LEN,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherSuite;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    fn provider() -> RustCryptoProvider {
        RustCryptoProvider::new()
    }

    #[test]
    fn test_prf_sha256_known_answer() {
        let out = prf(
            &provider(),
            HashAlgorithm::Sha256,
            &hex::decode("9bbe436ba940f017b17652849a71db35").unwrap(),
            b"test label",
            &hex::decode("a0ba9f936cda311827a6f796ffd5198c").unwrap(),
            100,
        )
        .unwrap();
        assert_eq!(
            hex::encode(out),
            "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
             6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
             4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
             87347b66"
        );
    }

    #[test]
    fn test_prf_sha384_known_answer() {
        let out = prf(
            &provider(),
            HashAlgorithm::Sha384,
            &hex::decode("b80b733d6ceefcdc71566ea48e5567df").unwrap(),
            b"test label",
            &hex::decode("cd665cf6a8447dd6ff8b27555edb7465").unwrap(),
            148,
        )
        .unwrap();
        assert_eq!(
            hex::encode(out),
            "7b0c18e9ced410ed1804f2cfa34a336a1c14dffb4900bb5fd7942107e81c83cd\
             e9ca0faa60be9fe34f82b1233c9146a0e534cb400fed2700884f9dc236f80edd\
             8bfa961144c9e8d792eca722a7b32fc3d416d473ebc2c5fd4abfdad05d918425\
             9b5bf8cd4d90fa0d31e2dec479e4f1a26066f2eea9a69236a3e52655c9e9aee6\
             91c8f3a26854308d5eaa3be85e0990703d73e56f"
        );
    }

    fn fixed_master() -> Secret {
        let pms: Vec<u8> = (0u8..48).collect();
        master_secret(
            &provider(),
            HashAlgorithm::Sha256,
            &pms,
            &[1; 32],
            &[2; 32],
        )
        .unwrap()
    }

    #[test]
    fn test_master_secret_known_answer() {
        assert_eq!(
            hex::encode(fixed_master().as_bytes()),
            "a8537d81a7d96d13e825f7e4f4cc3aa15a88c93441b2cd614ea74dcc3a283dcb\
             ce75223ecf9cceb7e520070683e8cc0e"
        );
    }

    #[test]
    fn test_key_block_slicing() {
        let suite = CipherSuite::EcdheRsaWithAes128GcmSha256
            .descriptor()
            .unwrap();
        let block = KeyBlock::derive(&provider(), suite, &fixed_master(), &[1; 32], &[2; 32])
            .unwrap();
        let expected =
            hex::decode("04a08dbb8550d79d1aaacbf56788f7d1455323633f2404bbe8f63a1a54ae4cf000cc8da1f3fd1dd9")
                .unwrap();
        assert!(block.client_mac.is_empty());
        assert!(block.server_mac.is_empty());
        assert_eq!(block.client_key, expected[0..16]);
        assert_eq!(block.server_key, expected[16..32]);
        assert_eq!(block.client_iv, expected[32..36]);
        assert_eq!(block.server_iv, expected[36..40]);
    }

    #[test]
    fn test_cbc_key_block_sizes() {
        let suite = CipherSuite::RsaWithAes256CbcSha.descriptor().unwrap();
        let block = KeyBlock::derive(&provider(), suite, &fixed_master(), &[1; 32], &[2; 32])
            .unwrap();
        assert_eq!(block.client_mac.len(), 20);
        assert_eq!(block.server_key.len(), 32);
        assert!(block.client_iv.is_empty());
    }

    #[test]
    fn test_finished_verify_data() {
        let transcript =
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap();
        let client = finished_verify_data(
            &provider(),
            HashAlgorithm::Sha256,
            &fixed_master(),
            Role::Client,
            &transcript,
        )
        .unwrap();
        assert_eq!(hex::encode(&client), "e3728f2465238f0fb70a72e9");

        let server = finished_verify_data(
            &provider(),
            HashAlgorithm::Sha256,
            &fixed_master(),
            Role::Server,
            &transcript,
        )
        .unwrap();
        assert_eq!(server.len(), VERIFY_DATA_LEN);
        assert_ne!(client, server);
    }
}
