//! Handshake transcript.
//!
//! The transcript keeps the exact bytes of every handshake message, header
//! included, in the order they crossed the wire. The hash algorithm is only
//! known once a suite has been selected, so hashing happens on demand rather
//! than incrementally.

use weft_crypto::{CryptoProvider, HashAlgorithm};

use crate::error::Result;
use crate::protocol::HandshakeType;

/// Ordered raw handshake messages.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Vec<u8>>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one framed message.
    pub fn push(&mut self, raw: &[u8]) {
        self.messages.push(raw.to_vec());
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Forget everything (a renegotiation starts a new transcript).
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// `Hash(messages)`.
    pub fn hash(&self, provider: &dyn CryptoProvider, alg: HashAlgorithm) -> Result<Vec<u8>> {
        self.hash_partial(provider, alg, 0, &[])
    }

    /// Hash of all messages but the last `skip_last`, followed by `extra`.
    ///
    /// `extra` carries bytes that are not a whole message yet, such as a
    /// ClientHello truncated before its PSK binders.
    pub fn hash_partial(
        &self,
        provider: &dyn CryptoProvider,
        alg: HashAlgorithm,
        skip_last: usize,
        extra: &[u8],
    ) -> Result<Vec<u8>> {
        let mut h = provider.hash(alg)?;
        let end = self.messages.len().saturating_sub(skip_last);
        for message in &self.messages[..end] {
            h.update(message);
        }
        h.update(extra);
        Ok(h.finalize())
    }

    /// Replace the first ClientHello by a synthetic `message_hash` message
    /// (RFC 8446 Section 4.4.1), as required after a HelloRetryRequest.
    pub fn collapse_client_hello(
        &mut self,
        provider: &dyn CryptoProvider,
        alg: HashAlgorithm,
    ) -> Result<()> {
        let Some(first) = self.messages.first() else {
            return Ok(());
        };
        let mut h = provider.hash(alg)?;
        h.update(first);
        let digest = h.finalize();

        let mut synthetic = Vec::with_capacity(4 + digest.len());
        synthetic.extend_from_slice(&[HandshakeType::MessageHash.to_u8(), 0, 0, digest.len() as u8]);
        synthetic.extend_from_slice(&digest);
        self.messages[0] = synthetic;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_schedule::digest;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    #[test]
    fn test_hash_equals_hash_of_concatenation() {
        let p = RustCryptoProvider::new();
        let mut transcript = Transcript::new();
        transcript.push(&[1, 0, 0, 1, 0xaa]);
        transcript.push(&[2, 0, 0, 1, 0xbb]);
        assert_eq!(
            transcript.hash(&p, HashAlgorithm::Sha256).unwrap(),
            digest(&p, HashAlgorithm::Sha256, &[1, 0, 0, 1, 0xaa, 2, 0, 0, 1, 0xbb]).unwrap()
        );
        assert_eq!(
            transcript
                .hash_partial(&p, HashAlgorithm::Sha256, 1, &[9])
                .unwrap(),
            digest(&p, HashAlgorithm::Sha256, &[1, 0, 0, 1, 0xaa, 9]).unwrap()
        );
    }

    #[test]
    fn test_collapse_client_hello() {
        let p = RustCryptoProvider::new();
        let client_hello = [1, 0, 0, 2, 0x03, 0x03];
        let mut transcript = Transcript::new();
        transcript.push(&client_hello);
        transcript.push(&[2, 0, 0, 0]);
        transcript
            .collapse_client_hello(&p, HashAlgorithm::Sha384)
            .unwrap();

        let mut expected = vec![254, 0, 0, 48];
        expected.extend(digest(&p, HashAlgorithm::Sha384, &client_hello).unwrap());
        expected.extend_from_slice(&[2, 0, 0, 0]);
        assert_eq!(
            transcript.hash(&p, HashAlgorithm::Sha384).unwrap(),
            digest(&p, HashAlgorithm::Sha384, &expected).unwrap()
        );
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_reset() {
        let mut transcript = Transcript::new();
        transcript.push(&[20, 0, 0, 0]);
        transcript.reset();
        assert!(transcript.is_empty());
    }
}
