//! RSA over `num-bigint`: RSASSA-PKCS1-v1_5, RSASSA-PSS and RSAES-PKCS1-v1_5
//! (RFC 8017).

use num_bigint::BigUint;
use sha2::Digest;
use subtle::ConstantTimeEq;
use weft_crypto::{Error, KeyTransport, Random, Result};

use crate::der::{
    parse_rsa_private_key_pkcs8, parse_rsa_public_key_spki, RsaPrivateKeyComponents,
    RsaPublicKeyComponents,
};
use crate::random::OsRandom;

/// Digest used inside an RSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RsaHash {
    Sha256,
    Sha384,
}

impl RsaHash {
    fn len(self) -> usize {
        match self {
            RsaHash::Sha256 => 32,
            RsaHash::Sha384 => 48,
        }
    }

    fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            RsaHash::Sha256 => digest_parts::<sha2::Sha256>(parts),
            RsaHash::Sha384 => digest_parts::<sha2::Sha384>(parts),
        }
    }

    /// DER DigestInfo prefix (RFC 8017 section 9.2, note 1).
    fn digest_info_prefix(self) -> &'static [u8] {
        match self {
            RsaHash::Sha256 => &[
                0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04,
                0x02, 0x01, 0x05, 0x00, 0x04, 0x20,
            ],
            RsaHash::Sha384 => &[
                0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04,
                0x02, 0x02, 0x05, 0x00, 0x04, 0x30,
            ],
        }
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

pub(crate) struct RsaPublicKey {
    n: BigUint,
    e: BigUint,
}

pub(crate) struct RsaPrivateKey {
    public: RsaPublicKey,
    components: RsaPrivateKeyComponents,
}

impl RsaPublicKey {
    pub(crate) fn from_spki(der: &[u8]) -> Result<Self> {
        let RsaPublicKeyComponents { n, e } =
            parse_rsa_public_key_spki(der).map_err(|_| Error::InvalidPublicKey)?;
        if n.bits() < 1024 {
            return Err(Error::InvalidPublicKey);
        }
        Ok(Self { n, e })
    }

    /// Modulus length in bytes.
    fn size(&self) -> usize {
        ((self.n.bits() + 7) / 8) as usize
    }

    fn encrypt_raw(&self, m: &BigUint) -> BigUint {
        m.modpow(&self.e, &self.n)
    }
}

impl RsaPrivateKey {
    pub(crate) fn from_pkcs8(der: &[u8]) -> Result<Self> {
        let components = parse_rsa_private_key_pkcs8(der).map_err(|_| Error::InvalidPrivateKey)?;
        let public = RsaPublicKey {
            n: components.n.clone(),
            e: components.e.clone(),
        };
        Ok(Self { public, components })
    }

    /// m = c^d mod n via the Chinese Remainder Theorem.
    fn decrypt_raw(&self, c: &BigUint) -> BigUint {
        let k = &self.components;
        let m1 = c.modpow(&k.dp, &k.p);
        let m2 = c.modpow(&k.dq, &k.q);
        let diff = (&m1 + &k.p - (&m2 % &k.p)) % &k.p;
        let h = (&k.qinv * diff) % &k.p;
        m2 + h * &k.q
    }
}

fn i2osp(x: &BigUint, len: usize) -> Result<Vec<u8>> {
    let bytes = x.to_bytes_be();
    if bytes.len() > len {
        return Err(Error::Internal("integer too large".into()));
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

fn mgf1(hash: RsaHash, seed: &[u8], len: usize) -> Vec<u8> {
    let mut mask = Vec::with_capacity(len + hash.len());
    let mut counter = 0u32;
    while mask.len() < len {
        mask.extend_from_slice(&hash.digest(&[seed, &counter.to_be_bytes()]));
        counter += 1;
    }
    mask.truncate(len);
    mask
}

fn pkcs1_v15_encoded(hash: RsaHash, message: &[u8], k: usize) -> Result<Vec<u8>> {
    let prefix = hash.digest_info_prefix();
    let t_len = prefix.len() + hash.len();
    if k < t_len + 11 {
        return Err(Error::InvalidPrivateKey);
    }
    let mut em = vec![0xffu8; k];
    em[0] = 0x00;
    em[1] = 0x01;
    em[k - t_len - 1] = 0x00;
    em[k - t_len..k - hash.len()].copy_from_slice(prefix);
    em[k - hash.len()..].copy_from_slice(&hash.digest(&[message]));
    Ok(em)
}

pub(crate) fn pkcs1_v15_sign(key: &RsaPrivateKey, hash: RsaHash, message: &[u8]) -> Result<Vec<u8>> {
    let k = key.public.size();
    let em = pkcs1_v15_encoded(hash, message, k)?;
    let s = key.decrypt_raw(&BigUint::from_bytes_be(&em));
    i2osp(&s, k)
}

pub(crate) fn pkcs1_v15_verify(
    key: &RsaPublicKey,
    hash: RsaHash,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let k = key.size();
    if signature.len() != k {
        return Err(Error::InvalidSignature);
    }
    let s = BigUint::from_bytes_be(signature);
    if s >= key.n {
        return Err(Error::InvalidSignature);
    }
    let em = i2osp(&key.encrypt_raw(&s), k)?;
    let expected = pkcs1_v15_encoded(hash, message, k)?;
    if bool::from(em.ct_eq(&expected)) {
        Ok(())
    } else {
        Err(Error::SignatureVerificationFailed)
    }
}

pub(crate) fn pss_sign(key: &RsaPrivateKey, hash: RsaHash, message: &[u8]) -> Result<Vec<u8>> {
    let h_len = hash.len();
    let mod_bits = key.public.n.bits() as usize;
    let em_bits = mod_bits - 1;
    let em_len = (em_bits + 7) / 8;
    if em_len < 2 * h_len + 2 {
        return Err(Error::InvalidPrivateKey);
    }

    let m_hash = hash.digest(&[message]);
    let salt = OsRandom.generate(h_len)?;
    let h = hash.digest(&[&[0u8; 8], &m_hash, &salt]);

    let db_len = em_len - h_len - 1;
    let mut db = vec![0u8; db_len];
    db[db_len - h_len - 1] = 0x01;
    db[db_len - h_len..].copy_from_slice(&salt);
    for (d, m) in db.iter_mut().zip(mgf1(hash, &h, db_len)) {
        *d ^= m;
    }
    db[0] &= 0xff >> (8 * em_len - em_bits);

    let mut em = db;
    em.extend_from_slice(&h);
    em.push(0xbc);

    let s = key.decrypt_raw(&BigUint::from_bytes_be(&em));
    i2osp(&s, key.public.size())
}

pub(crate) fn pss_verify(
    key: &RsaPublicKey,
    hash: RsaHash,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let h_len = hash.len();
    let k = key.size();
    if signature.len() != k {
        return Err(Error::InvalidSignature);
    }
    let s = BigUint::from_bytes_be(signature);
    if s >= key.n {
        return Err(Error::InvalidSignature);
    }
    let em_bits = key.n.bits() as usize - 1;
    let em_len = (em_bits + 7) / 8;
    let full = i2osp(&key.encrypt_raw(&s), k)?;
    // When emBits is a multiple of 8 the leading octet of the k-byte value must be zero.
    let (lead, em) = full.split_at(k - em_len);
    if lead.iter().any(|&b| b != 0) || em_len < 2 * h_len + 2 || em[em_len - 1] != 0xbc {
        return Err(Error::SignatureVerificationFailed);
    }

    let db_len = em_len - h_len - 1;
    let (masked_db, rest) = em.split_at(db_len);
    let h = &rest[..h_len];
    let top_mask = 0xffu8 >> (8 * em_len - em_bits);
    if masked_db[0] & !top_mask != 0 {
        return Err(Error::SignatureVerificationFailed);
    }
    let mut db: Vec<u8> = masked_db
        .iter()
        .zip(mgf1(hash, h, db_len))
        .map(|(a, b)| a ^ b)
        .collect();
    db[0] &= top_mask;

    let ps_len = db_len - h_len - 1;
    if db[..ps_len].iter().any(|&b| b != 0) || db[ps_len] != 0x01 {
        return Err(Error::SignatureVerificationFailed);
    }
    let salt = &db[ps_len + 1..];
    let m_hash = hash.digest(&[message]);
    let h2 = hash.digest(&[&[0u8; 8], &m_hash, salt]);
    if bool::from(h2.ct_eq(h)) {
        Ok(())
    } else {
        Err(Error::SignatureVerificationFailed)
    }
}

/// RSAES-PKCS1-v1_5 key transport.
#[derive(Debug, Default)]
pub struct RsaKeyTransport;

impl KeyTransport for RsaKeyTransport {
    fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = RsaPublicKey::from_spki(public_key)?;
        let k = key.size();
        if plaintext.len() + 11 > k {
            return Err(Error::InvalidLength);
        }
        let ps_len = k - plaintext.len() - 3;
        let mut em = Vec::with_capacity(k);
        em.extend_from_slice(&[0x00, 0x02]);
        let mut filled = 0;
        while filled < ps_len {
            let mut byte = [0u8; 1];
            OsRandom.fill(&mut byte)?;
            if byte[0] != 0 {
                em.push(byte[0]);
                filled += 1;
            }
        }
        em.push(0x00);
        em.extend_from_slice(plaintext);
        let c = key.encrypt_raw(&BigUint::from_bytes_be(&em));
        i2osp(&c, k)
    }

    fn decrypt(&self, private_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = RsaPrivateKey::from_pkcs8(private_key)?;
        let k = key.public.size();
        if ciphertext.len() != k || k < 11 {
            return Err(Error::DecryptionFailed);
        }
        let c = BigUint::from_bytes_be(ciphertext);
        if c >= key.public.n {
            return Err(Error::DecryptionFailed);
        }
        let em = i2osp(&key.decrypt_raw(&c), k)?;
        if em[0] != 0x00 || em[1] != 0x02 {
            return Err(Error::DecryptionFailed);
        }
        let separator = em[2..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| p + 2)
            .ok_or(Error::DecryptionFailed)?;
        if separator < 10 {
            return Err(Error::DecryptionFailed);
        }
        Ok(em[separator + 1..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mgf1_length() {
        assert_eq!(mgf1(RsaHash::Sha256, b"seed", 70).len(), 70);
        assert_eq!(
            &mgf1(RsaHash::Sha256, b"seed", 70)[..32],
            &RsaHash::Sha256.digest(&[b"seed", &[0, 0, 0, 0]])[..]
        );
    }

    #[test]
    fn test_i2osp_pads() {
        assert_eq!(i2osp(&BigUint::from(1u8), 4).unwrap(), vec![0, 0, 0, 1]);
        assert!(i2osp(&BigUint::from(0x1_0000u32), 2).is_err());
    }
}
