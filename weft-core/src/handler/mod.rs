//! Protocol handlers, one per role and version.
//!
//! A handler builds the messages its side sends and interprets the ones it
//! receives. Every send and receive goes through the handler's state
//! machine before anything else happens, and every key change is an
//! explicit call on the record layer at the point the protocol defines.
//!
//! Handlers do not own the connection. The connection lends them a
//! [`Link`] for the duration of one call: the configuration, the record
//! layer, the transport, the transcript and the session cache.

pub(crate) mod client12;
pub(crate) mod client13;
pub(crate) mod server12;
pub(crate) mod server13;

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::debug;
use weft_crypto::{CryptoProvider, KeyExchange, PrivateKey, SharedSecret};

use crate::alert::Alert;
use crate::cipher::{CipherSuite, CipherSuiteDescriptor};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::key_schedule::Secret;
use crate::messages::{DecodeContext, HandshakeMessage};
use crate::protocol::{ContentType, NamedGroup, ProtocolVersion, Role};
use crate::record::tls13::Tls13Protection;
use crate::record::{RecordLayer, RecordProtection};
use crate::session::SessionCache;
use crate::transcript::Transcript;
use crate::transport::Transport;

pub(crate) use client12::Client12Handler;
pub(crate) use client13::Client13Handler;
pub(crate) use server12::Server12Handler;
pub(crate) use server13::Server13Handler;

/// What the handshake settled on, as visible to the application.
#[derive(Debug, Clone, Default)]
pub(crate) struct Negotiated {
    pub(crate) version: Option<ProtocolVersion>,
    pub(crate) suite: Option<CipherSuite>,
    pub(crate) resumed: bool,
    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) server_name: Option<String>,
    pub(crate) early_data_accepted: bool,
}

/// Connection state lent to a handler for one call.
pub(crate) struct Link<'a> {
    pub(crate) config: &'a Config,
    pub(crate) record: &'a mut RecordLayer,
    pub(crate) transcript: &'a mut Transcript,
    pub(crate) transport: &'a mut dyn Transport,
    pub(crate) sessions: Option<&'a dyn SessionCache>,
    pub(crate) negotiated: &'a mut Negotiated,
    /// Client: early data still to be sent.
    pub(crate) early_data: &'a mut Vec<u8>,
}

impl<'a> Link<'a> {
    /// The provider outlives the link, so holding it does not borrow the link.
    pub(crate) fn provider(&self) -> &'a dyn CryptoProvider {
        self.config.provider.as_ref()
    }

    pub(crate) fn provider_arc(&self) -> &Arc<dyn CryptoProvider> {
        &self.config.provider
    }

    /// Encode, frame and send a handshake message, appending it to the
    /// transcript. Returns the encoded bytes.
    pub(crate) fn send_handshake_message(&mut self, message: &HandshakeMessage) -> Result<Vec<u8>> {
        let raw = message.encode();
        self.record
            .write_record(&mut *self.transport, ContentType::Handshake, &raw)?;
        self.transcript.push(&raw);
        debug!(message = message.name(), len = raw.len(), "handshake out");
        Ok(raw)
    }

    /// Send a post-handshake message, which is not part of the transcript.
    pub(crate) fn send_untracked(&mut self, message: &HandshakeMessage) -> Result<()> {
        let raw = message.encode();
        self.record
            .write_record(&mut *self.transport, ContentType::Handshake, &raw)?;
        debug!(message = message.name(), "handshake out");
        Ok(())
    }

    pub(crate) fn send_change_cipher_spec(&mut self) -> Result<()> {
        debug!("change_cipher_spec out");
        self.record
            .write_record(&mut *self.transport, ContentType::ChangeCipherSpec, &[1])
    }

    pub(crate) fn send_alert(&mut self, alert: Alert) -> Result<()> {
        debug!(level = ?alert.level, description = ?alert.description, "alert out");
        self.record
            .write_record(&mut *self.transport, ContentType::Alert, &alert.encode())
    }

    pub(crate) fn random(&self) -> Result<[u8; 32]> {
        let mut out = [0u8; 32];
        self.provider().random().fill(&mut out)?;
        Ok(out)
    }

    pub(crate) fn random_vec(&self, len: usize) -> Result<Vec<u8>> {
        Ok(self.provider().random().generate(len)?)
    }

    /// TLS 1.3 protection for `suite` from a traffic secret.
    pub(crate) fn tls13_protection(
        &self,
        suite: &CipherSuiteDescriptor,
        secret: &Secret,
    ) -> Result<Box<dyn RecordProtection>> {
        Ok(Box::new(Tls13Protection::new(self.provider(), suite, secret)?))
    }
}

/// Outcome of handling one message.
pub(crate) enum Step {
    /// Keep going with this handler.
    Continue,
    /// The peer negotiated another version: replace the handler with this
    /// one and hand it the same message again. The transcript is kept.
    Fallback(Box<dyn ProtocolHandler>),
}

/// Role- and version-specific handshake logic.
pub(crate) trait ProtocolHandler: Send {
    /// Which side this handler plays.
    fn role(&self) -> Role;

    /// Version this handler speaks.
    fn version(&self) -> ProtocolVersion;

    /// Current state, for logs.
    fn state_name(&self) -> String;

    /// Send the first flight, if this side speaks first.
    fn start(&mut self, link: &mut Link<'_>) -> Result<()>;

    /// Layout information for decoding the next message.
    fn decode_context(&self) -> DecodeContext;

    /// Process a received handshake message. `raw` is its exact encoding.
    fn handle_message(
        &mut self,
        link: &mut Link<'_>,
        message: &HandshakeMessage,
        raw: &[u8],
    ) -> Result<Step>;

    /// Process a received ChangeCipherSpec.
    fn handle_change_cipher_spec(&mut self, link: &mut Link<'_>) -> Result<()>;

    /// True once application data may flow.
    fn is_connected(&self) -> bool;

    /// Server: early data limit while 0-RTT records are being accepted.
    fn early_data_limit(&self) -> Option<usize> {
        None
    }

    /// close_notify was sent.
    fn close_sent(&mut self) -> Result<()>;

    /// close_notify was received.
    fn close_received(&mut self) -> Result<()>;

    /// Start a new handshake over the established connection (TLS 1.2).
    fn renegotiate(&mut self, _link: &mut Link<'_>) -> Result<()> {
        Err(Error::InvalidConfig(format!(
            "renegotiation is not available in {}",
            self.version().name()
        )))
    }

    /// Replace our write keys and optionally ask the peer to do the same
    /// (TLS 1.3).
    fn update_keys(&mut self, _link: &mut Link<'_>, _request_peer: bool) -> Result<()> {
        Err(Error::InvalidConfig(format!(
            "KeyUpdate is not available in {}",
            self.version().name()
        )))
    }

    /// Return to idle after a fatal error.
    fn reset(&mut self);
}

/// A freshly generated (EC)DHE key pair.
pub(crate) struct Ephemeral {
    pub(crate) group: Option<NamedGroup>,
    kex: Box<dyn KeyExchange>,
    private: PrivateKey,
    pub(crate) public: Vec<u8>,
}

impl Ephemeral {
    /// Key pair in a named group.
    pub(crate) fn generate(provider: &dyn CryptoProvider, group: NamedGroup) -> Result<Self> {
        let algorithm = group
            .key_exchange_algorithm()
            .ok_or_else(|| Error::HandshakeFailure(format!("group {:?} is not supported", group)))?;
        let kex = provider.key_exchange(algorithm)?;
        let (private, public) = kex.generate_keypair()?;
        Ok(Self {
            group: Some(group),
            kex,
            private,
            public: public.into_bytes(),
        })
    }

    /// Key pair over explicit finite-field parameters (TLS 1.2 DHE).
    pub(crate) fn finite_field(provider: &dyn CryptoProvider, p: &[u8], g: &[u8]) -> Result<Self> {
        let kex = provider.finite_field_dh(p, g)?;
        let (private, public) = kex.generate_keypair()?;
        Ok(Self {
            group: None,
            kex,
            private,
            public: public.into_bytes(),
        })
    }

    pub(crate) fn agree(&self, peer_public: &[u8]) -> Result<SharedSecret> {
        Ok(self.kex.exchange(&self.private, peer_public)?)
    }
}

/// Content signed by a TLS 1.3 CertificateVerify.
pub(crate) fn certificate_verify_input(sender: Role, transcript_hash: &[u8]) -> Vec<u8> {
    let context: &[u8] = match sender {
        Role::Server => b"TLS 1.3, server CertificateVerify",
        Role::Client => b"TLS 1.3, client CertificateVerify",
    };
    let mut out = vec![0x20; 64];
    out.extend_from_slice(context);
    out.push(0);
    out.extend_from_slice(transcript_hash);
    out
}

/// Leading zero bytes removed, as TLS 1.2 requires of a DH premaster secret.
pub(crate) fn strip_leading_zeros(value: &[u8]) -> &[u8] {
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    &value[start..]
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Descriptor of a suite the configuration enables, for checking a
/// server's choice against what was offered.
pub(crate) fn offered_descriptor(
    offered: &[CipherSuite],
    selected: CipherSuite,
    version: ProtocolVersion,
) -> Result<&'static CipherSuiteDescriptor> {
    selected
        .descriptor()
        .filter(|d| offered.contains(&selected) && d.usable_with(version))
        .ok_or_else(|| {
            Error::IllegalParameter(format!(
                "server selected {:#06x}, which was not offered for {}",
                selected.to_u16(),
                version.name()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros(&[0, 0, 1, 0]), &[1, 0]);
        assert_eq!(strip_leading_zeros(&[5]), &[5]);
        assert!(strip_leading_zeros(&[0, 0]).is_empty());
    }

    #[test]
    fn test_certificate_verify_input_layout() {
        let input = certificate_verify_input(Role::Server, &[0xaa; 32]);
        assert_eq!(input.len(), 64 + 33 + 1 + 32);
        assert!(input[..64].iter().all(|&b| b == 0x20));
        assert_eq!(&input[64..97], b"TLS 1.3, server CertificateVerify");
        assert_eq!(input[97], 0);
    }

    #[test]
    fn test_offered_descriptor() {
        let offered = [CipherSuite::Tls13Aes128GcmSha256];
        assert!(offered_descriptor(
            &offered,
            CipherSuite::Tls13Aes128GcmSha256,
            ProtocolVersion::Tls13
        )
        .is_ok());
        assert!(matches!(
            offered_descriptor(&offered, CipherSuite::Tls13Aes256GcmSha384, ProtocolVersion::Tls13),
            Err(Error::IllegalParameter(_))
        ));
        assert!(offered_descriptor(
            &offered,
            CipherSuite::Tls13Aes128GcmSha256,
            ProtocolVersion::Tls12
        )
        .is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
