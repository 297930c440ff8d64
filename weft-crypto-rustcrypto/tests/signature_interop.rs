//! Interoperability of the signature and key-transport implementations with
//! keys and signatures produced by an independent implementation
//! (Python `cryptography` / OpenSSL).
//!
//! ```bash
//! openssl pkcs8 -topk8 -nocrypt -in rsa2048.pem -outform DER -out rsa2048.pk8
//! openssl pkey -in rsa2048.pem -pubout -outform DER -out rsa2048.spki
//! ```

use weft_crypto::{CryptoProvider, Error, SignatureAlgorithm};
use weft_crypto_rustcrypto::RustCryptoProvider;

const RSA_PKCS8: &[u8] = include_bytes!("data/rsa2048.pk8");
const RSA_SPKI: &[u8] = include_bytes!("data/rsa2048.spki");
const ECDSA_PKCS8: &[u8] = include_bytes!("data/ecdsa_p256.pk8");
const ECDSA_SPKI: &[u8] = include_bytes!("data/ecdsa_p256.spki");
const ED25519_PKCS8: &[u8] = include_bytes!("data/ed25519.pk8");
const ED25519_SPKI: &[u8] = include_bytes!("data/ed25519.spki");

const MESSAGE: &[u8] = b"weft handshake signature";

const OPENSSL_PKCS1_SHA256: &str = "2f73a8059d3937cd50f0f8474aa9435b8cb73b3bcc27c12035fc3a38dc4d665a53b5a9f83f360c24bb63206f297f6614c8ef6b4173e51253e78a2f700569882656fa83c55af340c4bb8fa88e45982b8d78c04b5bba9fdd6ac077028da3b961732292cc1b801c7c23114bd9b89757fad660a1100c6355df025503800383623487987c18c1343c201bf45291a81ec4bef272e7d7fcadd379eb11d7d764f67ea631329c82306f475c15300a173dc3944902f98042176ca097913fa348182a2ab5b4573cbb3433a215a68065b43d86ddb6cc82ef9347e885f2cb32fdb5ae569ed29912d178af5818d36eafbba8adc9ca70dadc7edfe7851285105a6f457678f0e269";
const OPENSSL_PSS_SHA256: &str = "4fc8677c059182a55d421657d66a4422b5ac373bd11a70693fe537c25a8c80168019c4392aad5867c4175103da906812e3152d9fe870da8ee8d89130cead260436ce6dbdb8d28bc31e0723749e7fdd45ad34235d888027ece3aa3d499ee430c98cf15a3f5b7dff876d9dbad3a1d304dd83790f19f4bc61411ee3d14d5f077e16a9e8d801f1cbf65f139b1f3e0d5f2b5f44823e56c32a66908ae57f88dbfeca2dfba3183dba6790f73ddb6d38bf7cda23d687c97baf06c8eb5858abfd973c78f31ed2936e1462ce3bf86938f8da8ee95804c309ac08ca9a3f7b72c7f5262885ed6037d69e4f4d1e811f5430ea74c8654fa8cb2e702ddd47cf18218f102aa94491";
const OPENSSL_PSS_SHA384: &str = "75a348e05772d85058d4c284d06adb11d3c7ba8d1ca6109171abe1c01109f38bb10315c1c6e9edfc5e91fadd3d429b65139b44f233af4be04ddb22353f0d0d24cf66e70f73a8920a395b27e066a38ba2d02cdbc88891471a3a73f4aceab17af4d115e9468ba0f5e9ae8b7217a750f6ddf40abdd551d4aa33110db775687fe6e8dbeeeddce0b0678aa7e6e947fe0ea950a1421ba260291e25fba8dfef490381972128558e5f414a4f682674e12bba83d6beb348b36abd4e765dc0545aee4016579d4907af91df9d9467853b9ab2b2412dfe961da656efcf8225697caa740c19b342c8bd5928175723e90949b595e7d08458b8083ff30f962282682f8a4c1225a2";
const OPENSSL_ECDSA_P256: &str = "304402203dd2da42388d5c1435365c0ac69087c38b347a0c26a9400fcfcaa648b4159c8002202295cc525bfb888fae9e32980958434ba3405493f86cefbf9073ed28b0bf24ee";
const OPENSSL_ED25519: &str = "9db65eac15cffed9bf5706402528e06e3412b34589b0561391c24d4a5ebb8e0d7ad184ceb5a8681463b800621ee4b97ddbe46efec6caff1f5ed15a09c34c1305";
/// RSAES-PKCS1-v1_5 encryption of `03 03 00 01 .. 2d`.
const OPENSSL_ENCRYPTED_PMS: &str = "a0c3015f91c852a564f8d5dedf1840ba616df6c6d631b81eb2c4d03628518e491981f1da49a4796c220b92023ed6acb4ee6462b03acf6d73556ec8369677cc2727eef644b8b7126ae025c0c24e3956e29df8221e43afdba46a121f2ae0681f3418a8ed676d16bfa47da2d48aaaab81cc1a182c2b95e7634182d3d262134bb5b5551014ad6f58fb52ebce33db74068206418e33f1bea81561bc532eac94b37c5fd27a1a939aea7cb3cbebc928455e7498d70a2793c6df7d4a06c6819272055720d71335d80cad990752a69c905fab4f2e6b7259cf79677d41018509eb4f07464a687de52abeb96e3578a60412097288fa35d0ed130a76bb4a1a9869e50449c55f";

fn verify_external(alg: SignatureAlgorithm, spki: &[u8], sig_hex: &str) {
    let provider = RustCryptoProvider::new();
    let sig = provider.signature(alg).unwrap();
    let signature = hex::decode(sig_hex).unwrap();
    sig.verify(spki, MESSAGE, &signature).unwrap();
    assert_eq!(
        sig.verify(spki, b"another message", &signature),
        Err(Error::SignatureVerificationFailed)
    );
}

#[test]
fn test_verify_external_rsa_pkcs1() {
    verify_external(SignatureAlgorithm::RsaPkcs1Sha256, RSA_SPKI, OPENSSL_PKCS1_SHA256);
}

#[test]
fn test_verify_external_rsa_pss() {
    verify_external(SignatureAlgorithm::RsaPssRsaeSha256, RSA_SPKI, OPENSSL_PSS_SHA256);
    verify_external(SignatureAlgorithm::RsaPssRsaeSha384, RSA_SPKI, OPENSSL_PSS_SHA384);
}

#[test]
fn test_verify_external_ecdsa() {
    verify_external(SignatureAlgorithm::EcdsaSecp256r1Sha256, ECDSA_SPKI, OPENSSL_ECDSA_P256);
}

#[test]
fn test_verify_external_ed25519() {
    verify_external(SignatureAlgorithm::Ed25519, ED25519_SPKI, OPENSSL_ED25519);
}

#[test]
fn test_pkcs1_signatures_are_deterministic() {
    let provider = RustCryptoProvider::new();
    let sig = provider.signature(SignatureAlgorithm::RsaPkcs1Sha256).unwrap();
    let ours = sig.sign(RSA_PKCS8, MESSAGE).unwrap();
    assert_eq!(hex::encode(ours), OPENSSL_PKCS1_SHA256);
}

#[test]
fn test_sign_then_verify_every_algorithm() {
    let provider = RustCryptoProvider::new();
    let cases = [
        (SignatureAlgorithm::RsaPssRsaeSha256, RSA_PKCS8, RSA_SPKI),
        (SignatureAlgorithm::RsaPssRsaeSha384, RSA_PKCS8, RSA_SPKI),
        (SignatureAlgorithm::RsaPkcs1Sha384, RSA_PKCS8, RSA_SPKI),
        (SignatureAlgorithm::EcdsaSecp256r1Sha256, ECDSA_PKCS8, ECDSA_SPKI),
        (SignatureAlgorithm::Ed25519, ED25519_PKCS8, ED25519_SPKI),
    ];
    for (alg, private, public) in cases {
        let sig = provider.signature(alg).unwrap();
        let signature = sig.sign(private, MESSAGE).unwrap();
        sig.verify(public, MESSAGE, &signature).unwrap();
    }
}

#[test]
fn test_wrong_key_type_rejected() {
    let provider = RustCryptoProvider::new();
    let sig = provider.signature(SignatureAlgorithm::Ed25519).unwrap();
    assert_eq!(sig.sign(RSA_PKCS8, MESSAGE), Err(Error::InvalidPrivateKey));
    let rsa = provider.signature(SignatureAlgorithm::RsaPssRsaeSha256).unwrap();
    assert_eq!(
        rsa.verify(ECDSA_SPKI, MESSAGE, &[0u8; 256]),
        Err(Error::InvalidPublicKey)
    );
}

#[test]
fn test_decrypt_external_key_transport() {
    let provider = RustCryptoProvider::new();
    let transport = provider.key_transport().unwrap();
    let pms = transport
        .decrypt(RSA_PKCS8, &hex::decode(OPENSSL_ENCRYPTED_PMS).unwrap())
        .unwrap();
    let mut expected = vec![3u8, 3];
    expected.extend(0u8..46);
    assert_eq!(pms, expected);
}

#[test]
fn test_key_transport_round_trip_and_garbage() {
    let provider = RustCryptoProvider::new();
    let transport = provider.key_transport().unwrap();
    let ct = transport.encrypt(RSA_SPKI, &[0x42; 48]).unwrap();
    assert_eq!(ct.len(), 256);
    assert_eq!(transport.decrypt(RSA_PKCS8, &ct).unwrap(), vec![0x42; 48]);
    assert_eq!(
        transport.decrypt(RSA_PKCS8, &[1u8; 256]),
        Err(Error::DecryptionFailed)
    );
}
