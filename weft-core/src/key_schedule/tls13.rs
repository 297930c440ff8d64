//! TLS 1.3 key schedule (RFC 8446 Section 7.1).
//!
//! ```text
//!              0
//!              |
//!              v
//!   PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "res binder", "") = binder_key
//!              +-----> Derive-Secret(., "c e traffic", ClientHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!   (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", ClientHello...ServerHello)
//!              +-----> Derive-Secret(., "s hs traffic", ClientHello...ServerHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!   0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "s ap traffic", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "exp master", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "res master", ClientHello...client Finished)
//! ```

use bytes::{BufMut, BytesMut};
use weft_crypto::{CryptoProvider, HashAlgorithm};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{digest, hmac, kdf, Secret};
use crate::cipher::CipherSuiteDescriptor;
use crate::codec::BufMutExt;
use crate::error::{Error, Result};

/// Record nonce length of every TLS 1.3 AEAD.
pub const IV_LEN: usize = 12;

/// `HKDF-Expand-Label(secret, label, context, length)`
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
pub fn hkdf_expand_label(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &str,
    context: &[u8],
    len: usize,
) -> Result<Vec<u8>> {
    let mut info = BytesMut::with_capacity(4 + 6 + label.len() + context.len());
    info.put_u16(len as u16);
    info.put_nested_u8(|b| {
        b.put_slice(b"tls13 ");
        b.put_slice(label.as_bytes());
    });
    info.put_vec_u8(context);
    Ok(kdf(provider, hash)?.expand(secret, &info, len)?)
}

/// `Derive-Secret(secret, label, messages)` given `Transcript-Hash(messages)`.
pub fn derive_secret(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &str,
    transcript_hash: &[u8],
) -> Result<Secret> {
    hkdf_expand_label(
        provider,
        hash,
        secret,
        label,
        transcript_hash,
        hash.output_size(),
    )
    .map(Secret::new)
}

#[derive(Debug)]
enum Stage {
    Early(Secret),
    Handshake(Secret),
    Master(Secret),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Early(_) => "early",
            Stage::Handshake(_) => "handshake",
            Stage::Master(_) => "master",
        }
    }
}

/// The staged secret tree.
///
/// The schedule only moves forward: early, then handshake, then master.
/// Asking for a secret of a stage that is not current is an internal
/// error, which keeps a handler from using a key before the message that
/// produces it has been processed.
#[derive(Debug)]
pub struct KeySchedule {
    hash: HashAlgorithm,
    stage: Stage,
}

impl KeySchedule {
    /// Start from the early secret, `HKDF-Extract(0, psk or 0)`.
    pub fn new(
        provider: &dyn CryptoProvider,
        hash: HashAlgorithm,
        psk: Option<&[u8]>,
    ) -> Result<Self> {
        let zeros = vec![0u8; hash.output_size()];
        let early = kdf(provider, hash)?.extract(&zeros, psk.unwrap_or(&zeros[..]));
        Ok(Self {
            hash,
            stage: Stage::Early(Secret::new(early)),
        })
    }

    /// Hash of the schedule.
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    fn current(&self, wanted: &'static str) -> Result<&Secret> {
        match (&self.stage, wanted) {
            (Stage::Early(s), "early")
            | (Stage::Handshake(s), "handshake")
            | (Stage::Master(s), "master") => Ok(s),
            (stage, _) => Err(Error::Internal(format!(
                "key schedule is at the {} secret, {} secret requested",
                stage.name(),
                wanted
            ))),
        }
    }

    fn derived(&self, provider: &dyn CryptoProvider, secret: &Secret) -> Result<Secret> {
        let empty = digest(provider, self.hash, &[])?;
        derive_secret(provider, self.hash, secret.as_bytes(), "derived", &empty)
    }

    /// PSK binder key for resumption PSKs.
    pub fn binder_key(&self, provider: &dyn CryptoProvider) -> Result<Secret> {
        let early = self.current("early")?;
        let empty = digest(provider, self.hash, &[])?;
        derive_secret(provider, self.hash, early.as_bytes(), "res binder", &empty)
    }

    /// `client_early_traffic_secret` over the ClientHello hash.
    pub fn client_early_traffic_secret(
        &self,
        provider: &dyn CryptoProvider,
        client_hello_hash: &[u8],
    ) -> Result<Secret> {
        let early = self.current("early")?;
        derive_secret(
            provider,
            self.hash,
            early.as_bytes(),
            "c e traffic",
            client_hello_hash,
        )
    }

    /// Mix in the (EC)DHE shared secret, or zeros for a PSK-only handshake.
    pub fn input_handshake_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        shared_secret: Option<&[u8]>,
    ) -> Result<()> {
        let derived = self.derived(provider, self.current("early")?)?;
        let zeros = vec![0u8; self.hash.output_size()];
        let secret =
            kdf(provider, self.hash)?.extract(derived.as_bytes(), shared_secret.unwrap_or(&zeros[..]));
        self.stage = Stage::Handshake(Secret::new(secret));
        Ok(())
    }

    /// `(client, server)` handshake traffic secrets over ClientHello..ServerHello.
    pub fn handshake_traffic_secrets(
        &self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<(Secret, Secret)> {
        let hs = self.current("handshake")?;
        Ok((
            derive_secret(provider, self.hash, hs.as_bytes(), "c hs traffic", transcript_hash)?,
            derive_secret(provider, self.hash, hs.as_bytes(), "s hs traffic", transcript_hash)?,
        ))
    }

    /// Advance to the master secret.
    pub fn input_master_secret(&mut self, provider: &dyn CryptoProvider) -> Result<()> {
        let derived = self.derived(provider, self.current("handshake")?)?;
        let zeros = vec![0u8; self.hash.output_size()];
        let secret = kdf(provider, self.hash)?.extract(derived.as_bytes(), &zeros);
        self.stage = Stage::Master(Secret::new(secret));
        Ok(())
    }

    /// `(client, server)` application traffic secrets over
    /// ClientHello..server Finished.
    pub fn application_traffic_secrets(
        &self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<(Secret, Secret)> {
        let master = self.current("master")?;
        Ok((
            derive_secret(provider, self.hash, master.as_bytes(), "c ap traffic", transcript_hash)?,
            derive_secret(provider, self.hash, master.as_bytes(), "s ap traffic", transcript_hash)?,
        ))
    }

    /// `exporter_master_secret` over ClientHello..server Finished.
    pub fn exporter_master_secret(
        &self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Secret> {
        let master = self.current("master")?;
        derive_secret(provider, self.hash, master.as_bytes(), "exp master", transcript_hash)
    }

    /// `resumption_master_secret` over ClientHello..client Finished.
    pub fn resumption_master_secret(
        &self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Secret> {
        let master = self.current("master")?;
        derive_secret(provider, self.hash, master.as_bytes(), "res master", transcript_hash)
    }
}

/// `HMAC(finished_key, transcript_hash)` with
/// `finished_key = HKDF-Expand-Label(base_key, "finished", "", Hash.length)`.
///
/// Also computes PSK binders, with the binder key as `base_key`.
pub fn finished_verify_data(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    base_key: &Secret,
    transcript_hash: &[u8],
) -> Result<Vec<u8>> {
    let finished_key = Secret::new(hkdf_expand_label(
        provider,
        hash,
        base_key.as_bytes(),
        "finished",
        &[],
        hash.output_size(),
    )?);
    hmac(provider, hash, finished_key.as_bytes(), transcript_hash)
}

/// Check received verify_data in constant time.
pub fn verify_finished(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    base_key: &Secret,
    transcript_hash: &[u8],
    received: &[u8],
) -> Result<bool> {
    let finished_key = Secret::new(hkdf_expand_label(
        provider,
        hash,
        base_key.as_bytes(),
        "finished",
        &[],
        hash.output_size(),
    )?);
    let mut mac = provider.hmac(hash, finished_key.as_bytes())?;
    mac.update(transcript_hash);
    Ok(mac.verify(received))
}

/// `application_traffic_secret_N+1` after a KeyUpdate.
pub fn next_traffic_secret(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    secret: &Secret,
) -> Result<Secret> {
    hkdf_expand_label(
        provider,
        hash,
        secret.as_bytes(),
        "traffic upd",
        &[],
        hash.output_size(),
    )
    .map(Secret::new)
}

/// PSK of a ticket: `HKDF-Expand-Label(resumption_master_secret, "resumption", nonce, Hash.length)`.
pub fn resumption_psk(
    provider: &dyn CryptoProvider,
    hash: HashAlgorithm,
    resumption_master_secret: &Secret,
    ticket_nonce: &[u8],
) -> Result<Secret> {
    hkdf_expand_label(
        provider,
        hash,
        resumption_master_secret.as_bytes(),
        "resumption",
        ticket_nonce,
        hash.output_size(),
    )
    .map(Secret::new)
}

/// Record key and IV expanded from a traffic secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TrafficKeys {
    /// AEAD key
    pub key: Vec<u8>,
    /// Static IV, XORed with the sequence number per record
    pub iv: Vec<u8>,
}

impl TrafficKeys {
    /// Expand `"key"` and `"iv"` for `suite`.
    pub fn derive(
        provider: &dyn CryptoProvider,
        suite: &CipherSuiteDescriptor,
        traffic_secret: &Secret,
    ) -> Result<Self> {
        let secret = traffic_secret.as_bytes();
        Ok(Self {
            key: hkdf_expand_label(provider, suite.hash, secret, "key", &[], suite.key_len())?,
            iv: hkdf_expand_label(provider, suite.hash, secret, "iv", &[], IV_LEN)?,
        })
    }
}

impl core::fmt::Debug for TrafficKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TrafficKeys([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherSuite;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    const SHA256: HashAlgorithm = HashAlgorithm::Sha256;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    // RFC 8448 Section 3, simple 1-RTT handshake
    const SHARED_SECRET: &str = "8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d";
    const HELLO_HASH: &str = "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8";
    const SERVER_HS_TRAFFIC: &str =
        "b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38";

    #[test]
    fn test_early_secret_and_derived() {
        let p = RustCryptoProvider::new();
        let zeros = [0u8; 32];
        let early = kdf(&p, SHA256).unwrap().extract(&zeros, &zeros);
        assert_eq!(
            hex::encode(&early),
            "33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a"
        );
        let empty = digest(&p, SHA256, &[]).unwrap();
        let derived = derive_secret(&p, SHA256, &early, "derived", &empty).unwrap();
        assert_eq!(
            hex::encode(derived.as_bytes()),
            "6f2615a108c702c5678f54fc9dbab69716c076189c48250cebeac3576c3611ba"
        );
    }

    #[test]
    fn test_handshake_traffic_secrets() {
        let p = RustCryptoProvider::new();
        let mut schedule = KeySchedule::new(&p, SHA256, None).unwrap();
        schedule
            .input_handshake_secret(&p, Some(&unhex(SHARED_SECRET)))
            .unwrap();
        let (client, server) = schedule
            .handshake_traffic_secrets(&p, &unhex(HELLO_HASH))
            .unwrap();
        assert_eq!(
            hex::encode(client.as_bytes()),
            "b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21"
        );
        assert_eq!(hex::encode(server.as_bytes()), SERVER_HS_TRAFFIC);

        schedule.input_master_secret(&p).unwrap();
        assert_eq!(
            hex::encode(schedule.current("master").unwrap().as_bytes()),
            "18df06843d13a08bf2a449844c5f8a478001bc4d4c627984d5a41da8d0402919"
        );
    }

    #[test]
    fn test_traffic_keys_and_finished_key() {
        let p = RustCryptoProvider::new();
        let secret = Secret::new(unhex(SERVER_HS_TRAFFIC));
        let suite = CipherSuite::Tls13Aes128GcmSha256.descriptor().unwrap();
        let keys = TrafficKeys::derive(&p, suite, &secret).unwrap();
        assert_eq!(hex::encode(&keys.key), "3fce516009c21727d0f2e4e86ee403bc");
        assert_eq!(hex::encode(&keys.iv), "5d313eb2671276ee13000b30");

        let finished_key =
            hkdf_expand_label(&p, SHA256, secret.as_bytes(), "finished", &[], 32).unwrap();
        assert_eq!(
            hex::encode(finished_key),
            "008d3b66f816ea559f96b537e885c31fc068bf492c652f01f288a1d8cdc19fc8"
        );
    }

    #[test]
    fn test_key_update_and_resumption_psk() {
        let p = RustCryptoProvider::new();
        let next = next_traffic_secret(&p, SHA256, &Secret::new(unhex(SERVER_HS_TRAFFIC))).unwrap();
        assert_eq!(
            hex::encode(next.as_bytes()),
            "c5847ffa1bfea2d5c409eee45d2813181327a78a52ee6d02d8a5e10fbf0fface"
        );
        let psk = resumption_psk(&p, SHA256, &Secret::new(vec![1; 32]), &[0, 0]).unwrap();
        assert_eq!(
            hex::encode(psk.as_bytes()),
            "b51d29782c2d2cf5ce5aad904c30887ca0c3a05ed36eec0c8802a4ad364e3f4d"
        );
    }

    #[test]
    fn test_finished_round_trip() {
        let p = RustCryptoProvider::new();
        let key = Secret::new(vec![9; 32]);
        let th = digest(&p, SHA256, b"transcript").unwrap();
        let verify_data = finished_verify_data(&p, SHA256, &key, &th).unwrap();
        assert!(verify_finished(&p, SHA256, &key, &th, &verify_data).unwrap());
        let mut bad = verify_data.clone();
        bad[0] ^= 1;
        assert!(!verify_finished(&p, SHA256, &key, &th, &bad).unwrap());
    }

    #[test]
    fn test_out_of_order_use_is_internal_error() {
        let p = RustCryptoProvider::new();
        let mut schedule = KeySchedule::new(&p, SHA256, None).unwrap();
        assert!(matches!(
            schedule.application_traffic_secrets(&p, &[0; 32]),
            Err(Error::Internal(_))
        ));
        schedule.input_handshake_secret(&p, None).unwrap();
        assert!(matches!(schedule.binder_key(&p), Err(Error::Internal(_))));
        assert!(matches!(
            schedule.input_handshake_secret(&p, None),
            Err(Error::Internal(_))
        ));
    }
}
