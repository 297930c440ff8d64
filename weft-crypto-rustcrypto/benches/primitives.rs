//! Throughput of the primitives on the record and handshake hot paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weft_crypto::{AeadAlgorithm, CryptoProvider, KeyExchangeAlgorithm, SignatureAlgorithm};
use weft_crypto_rustcrypto::RustCryptoProvider;

const RSA_PKCS8: &[u8] = include_bytes!("../tests/data/rsa2048.pk8");
const ECDSA_PKCS8: &[u8] = include_bytes!("../tests/data/ecdsa_p256.pk8");

fn bench_aead(c: &mut Criterion) {
    let provider = RustCryptoProvider::new();
    let mut group = c.benchmark_group("aead_seal_16k");
    let payload = vec![0x5a; 16384];
    for alg in [
        AeadAlgorithm::Aes128Gcm,
        AeadAlgorithm::Aes256Gcm,
        AeadAlgorithm::ChaCha20Poly1305,
    ] {
        let aead = provider.aead(alg).unwrap();
        let key = vec![1u8; alg.key_size()];
        group.bench_with_input(BenchmarkId::from_parameter(alg.name()), &payload, |b, p| {
            b.iter(|| aead.seal(&key, &[0u8; 12], b"hdr", black_box(p)).unwrap())
        });
    }
    group.finish();
}

fn bench_signatures(c: &mut Criterion) {
    let provider = RustCryptoProvider::new();
    let mut group = c.benchmark_group("sign");
    for (alg, key) in [
        (SignatureAlgorithm::RsaPssRsaeSha256, RSA_PKCS8),
        (SignatureAlgorithm::EcdsaSecp256r1Sha256, ECDSA_PKCS8),
    ] {
        let sig = provider.signature(alg).unwrap();
        group.bench_function(alg.name(), |b| {
            b.iter(|| sig.sign(key, black_box(b"transcript")).unwrap())
        });
    }
    group.finish();
}

fn bench_key_exchange(c: &mut Criterion) {
    let provider = RustCryptoProvider::new();
    for alg in [KeyExchangeAlgorithm::X25519, KeyExchangeAlgorithm::Secp256r1] {
        let kex = provider.key_exchange(alg).unwrap();
        let (_, peer) = kex.generate_keypair().unwrap();
        c.bench_function(&format!("kex_{}", alg.name()), |b| {
            b.iter(|| {
                let (private, _) = kex.generate_keypair().unwrap();
                kex.exchange(&private, peer.as_bytes()).unwrap()
            })
        });
    }
}

criterion_group!(benches, bench_aead, bench_signatures, bench_key_exchange);
criterion_main!(benches);
