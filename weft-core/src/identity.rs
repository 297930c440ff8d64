//! Local certificate identity and handshake signatures.

use std::path::Path;

use weft_crypto::CryptoProvider;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::pem;
use crate::protocol::SignatureScheme;
use crate::x509::{self, CertificateKey, KeyKind};

/// A certificate chain and the private key of its leaf.
#[derive(Clone)]
pub struct Identity {
    chain: Vec<Vec<u8>>,
    private_key: Zeroizing<Vec<u8>>,
    kind: KeyKind,
}

impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("chain_len", &self.chain.len())
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Build from a DER chain (leaf first) and a PKCS#8 DER private key.
    ///
    /// The key algorithm must match the leaf certificate's.
    pub fn new(chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> Result<Self> {
        let private_key = Zeroizing::new(private_key);
        let leaf = chain
            .first()
            .ok_or_else(|| Error::InvalidConfig("empty certificate chain".into()))?;
        let kind = x509::certificate_key(leaf)
            .map_err(|e| Error::InvalidConfig(format!("leaf certificate: {}", e)))?
            .kind;
        let key_kind = x509::private_key_kind(&private_key)
            .map_err(|e| Error::InvalidConfig(format!("private key: {}", e)))?;
        if key_kind != kind {
            return Err(Error::InvalidConfig(format!(
                "{:?} private key does not match {:?} certificate",
                key_kind, kind
            )));
        }
        Ok(Self {
            chain,
            private_key,
            kind,
        })
    }

    /// Load from PEM text holding `CERTIFICATE` blocks (leaf first) and one
    /// `PRIVATE KEY` block.
    pub fn from_pem(text: &str) -> Result<Self> {
        let mut chain = Vec::new();
        let mut key = None;
        for block in pem::parse(text).map_err(|e| Error::InvalidConfig(e.to_string()))? {
            match block.label.as_str() {
                "CERTIFICATE" => chain.push(block.der),
                "PRIVATE KEY" if key.is_none() => key = Some(block.der),
                "PRIVATE KEY" => {
                    return Err(Error::InvalidConfig("more than one private key".into()))
                },
                _ => {},
            }
        }
        let key = key.ok_or_else(|| Error::InvalidConfig("no PRIVATE KEY block".into()))?;
        Self::new(chain, key)
    }

    /// [`Identity::from_pem`] on a file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_pem(&text)
    }

    /// DER certificates, leaf first.
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// Key algorithm.
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Our preferred scheme among those the peer offered.
    ///
    /// A TLS 1.2 peer that sent no signature_algorithms gets our first
    /// scheme.
    pub fn choose_scheme(
        &self,
        offered: Option<&[SignatureScheme]>,
        tls13: bool,
    ) -> Option<SignatureScheme> {
        let ours = self.kind.signature_schemes(tls13);
        match offered {
            Some(offered) => ours.iter().copied().find(|s| offered.contains(s)),
            None if !tls13 => ours.first().copied(),
            None => None,
        }
    }

    /// Sign `message` with the leaf key.
    pub fn sign(
        &self,
        provider: &dyn CryptoProvider,
        scheme: SignatureScheme,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        if !self.kind.supports(scheme) {
            return Err(Error::Internal(format!(
                "{:?} key cannot sign {:?}",
                self.kind, scheme
            )));
        }
        let algorithm = scheme
            .algorithm()
            .ok_or_else(|| Error::Internal(format!("no algorithm for {:?}", scheme)))?;
        Ok(provider
            .signature(algorithm)?
            .sign(&self.private_key, message)?)
    }

    /// The PKCS#8 private key, for RSA key transport.
    pub(crate) fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

/// Check a peer's handshake signature against its certificate key.
pub fn verify_signature(
    provider: &dyn CryptoProvider,
    key: &CertificateKey,
    scheme: SignatureScheme,
    offered: &[SignatureScheme],
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    if !offered.contains(&scheme) || !key.kind.supports(scheme) {
        return Err(Error::IllegalParameter(format!(
            "signature scheme {:?} not usable with a {:?} certificate",
            scheme, key.kind
        )));
    }
    let algorithm = scheme
        .algorithm()
        .ok_or_else(|| Error::IllegalParameter(format!("unknown scheme {:?}", scheme)))?;
    provider
        .signature(algorithm)?
        .verify(&key.spki, message, signature)
        .map_err(|_| Error::SignatureVerificationFailed)
}
