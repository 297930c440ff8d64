//! TLS 1.2 client handshake.
//!
//! Full handshake:
//! ```text
//! ClientHello            -->
//!                        <--  ServerHello, Certificate,
//!                             [ServerKeyExchange], ServerHelloDone
//! ClientKeyExchange,
//! [ChangeCipherSpec], Finished  -->
//!                        <--  [ChangeCipherSpec], Finished
//! ```
//! An abbreviated handshake resumes a cached session: the server answers
//! the session ID with its ChangeCipherSpec and Finished straight away.

use std::time::Instant;

use crate::alert::Alert;
use crate::cipher::{CipherSuite, CipherSuiteDescriptor, KeyExchangeMethod};
use crate::error::{AlertDescription, Error, Result};
use crate::extensions::Extension;
use crate::handler::{
    constant_time_eq, offered_descriptor, strip_leading_zeros, Ephemeral, Link, ProtocolHandler,
    Step,
};
use crate::identity;
use crate::key_schedule::prf::{self, KeyBlock};
use crate::key_schedule::Secret;
use crate::messages::{
    ClientHello, ClientKeyExchange, DecodeContext, HandshakeMessage, ServerHello,
    ServerKeyExchange, ServerKeyExchangeParams,
};
use crate::protocol::{HandshakeType, ProtocolVersion, Role};
use crate::record::tls12;
use crate::session::{CachedSession, Session, SessionKey};
use crate::state_machine::{Client12State, Event, Facts, Machine};
use crate::x509::{self, CertificateKey};

/// Smallest DH prime a server may offer, in bytes.
const MIN_DH_PRIME_LEN: usize = 128;

pub(crate) struct Client12Handler {
    machine: Machine<Client12State>,
    facts: Facts,
    client_random: [u8; 32],
    server_random: [u8; 32],
    offered_suites: Vec<CipherSuite>,
    cached: Option<Session>,
    suite: Option<&'static CipherSuiteDescriptor>,
    session_id: Vec<u8>,
    server_key: Option<CertificateKey>,
    server_params: Option<ServerKeyExchangeParams>,
    master_secret: Option<Secret>,
    key_block: Option<KeyBlock>,
    client_verify_data: Vec<u8>,
    server_verify_data: Vec<u8>,
    secure_renegotiation: bool,
    renegotiating: bool,
}

impl Client12Handler {
    pub(crate) fn new() -> Self {
        Self {
            machine: Machine::new(),
            facts: Facts::default(),
            client_random: [0; 32],
            server_random: [0; 32],
            offered_suites: Vec::new(),
            cached: None,
            suite: None,
            session_id: Vec::new(),
            server_key: None,
            server_params: None,
            master_secret: None,
            key_block: None,
            client_verify_data: Vec::new(),
            server_verify_data: Vec::new(),
            secure_renegotiation: false,
            renegotiating: false,
        }
    }

    /// Continue a handshake whose ClientHello was sent by the TLS 1.3
    /// client before the server picked TLS 1.2.
    pub(crate) fn after_fallback(hello: &ClientHello, cached: Option<Session>) -> Result<Self> {
        let mut handler = Self::new();
        handler
            .machine
            .sent(Event::Handshake(HandshakeType::ClientHello), &handler.facts)?;
        handler.client_random = hello.random;
        handler.offered_suites = hello.cipher_suites.clone();
        handler.cached = cached.filter(|s| hello.session_id == s.id);
        Ok(handler)
    }

    fn suite(&self) -> Result<&'static CipherSuiteDescriptor> {
        self.suite
            .ok_or_else(|| Error::Internal("no cipher suite negotiated".into()))
    }

    fn master_secret(&self) -> Result<&Secret> {
        self.master_secret
            .as_ref()
            .ok_or_else(|| Error::Internal("master secret not established".into()))
    }

    fn key_block(&self) -> Result<&KeyBlock> {
        self.key_block
            .as_ref()
            .ok_or_else(|| Error::Internal("record keys not derived".into()))
    }

    fn cached_session(link: &Link<'_>) -> Option<Session> {
        if !link.config.enable_session_resumption {
            return None;
        }
        let name = link.config.server_name()?;
        let cached = link.sessions?.get(&SessionKey::ServerName(name.to_string()))?;
        cached
            .as_session()
            .filter(|s| {
                link.config
                    .suites_for(ProtocolVersion::Tls12)
                    .any(|d| d.suite == s.suite)
            })
            .cloned()
    }

    fn send_client_hello(&mut self, link: &mut Link<'_>) -> Result<()> {
        self.cached = Self::cached_session(link);
        self.client_random = link.random()?;
        self.offered_suites = link
            .config
            .suites_for(ProtocolVersion::Tls12)
            .map(|d| d.suite)
            .collect();

        let mut hello = ClientHello::new(
            ProtocolVersion::Tls12,
            self.client_random,
            self.offered_suites.clone(),
        );
        if let Some(session) = &self.cached {
            hello.session_id = session.id.clone();
        }
        if let Some(name) = link.config.server_name() {
            hello.extensions.push(Extension::ServerName(vec![name.to_string()]));
        }
        let groups: Vec<_> = link
            .config
            .supported_groups
            .iter()
            .copied()
            .filter(|g| g.is_elliptic())
            .collect();
        if !groups.is_empty() {
            hello.extensions.push(Extension::SupportedGroups(groups));
            hello.extensions.push(Extension::EcPointFormats(vec![0]));
        }
        hello.extensions.push(Extension::SignatureAlgorithms(
            link.config.signature_schemes.clone(),
        ));
        let binding = if self.renegotiating {
            self.client_verify_data.clone()
        } else {
            Vec::new()
        };
        hello.extensions.push(Extension::RenegotiationInfo(binding));

        let message = HandshakeMessage::ClientHello(hello);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        Ok(())
    }

    fn handle_server_hello(&mut self, link: &mut Link<'_>, hello: &ServerHello) -> Result<()> {
        if hello.legacy_version != ProtocolVersion::Tls12 {
            return Err(Error::ProtocolVersion(format!(
                "server selected {}",
                hello.legacy_version.name()
            )));
        }
        if link.config.supports(ProtocolVersion::Tls13) && hello.has_downgrade_sentinel() {
            return Err(Error::IllegalParameter(
                "TLS 1.2 ServerHello carries the downgrade sentinel".into(),
            ));
        }
        if hello.compression_method != 0 {
            return Err(Error::IllegalParameter("non-null compression".into()));
        }
        let suite = offered_descriptor(&self.offered_suites, hello.cipher_suite, ProtocolVersion::Tls12)?;

        let expected_binding = if self.renegotiating {
            [self.client_verify_data.as_slice(), self.server_verify_data.as_slice()].concat()
        } else {
            Vec::new()
        };
        match hello.extensions.renegotiation_info() {
            Some(binding) if constant_time_eq(binding, &expected_binding) => {
                self.secure_renegotiation = true;
            },
            Some(_) => {
                return Err(Error::HandshakeFailure("renegotiation_info mismatch".into()))
            },
            None if self.renegotiating => {
                return Err(Error::HandshakeFailure(
                    "renegotiation_info missing from renegotiated ServerHello".into(),
                ))
            },
            None => self.secure_renegotiation = false,
        }

        self.server_random = hello.random;
        self.session_id = hello.session_id.clone();
        self.suite = Some(suite);

        let resumed = match &self.cached {
            Some(cached) if !hello.session_id.is_empty() && hello.session_id == cached.id => {
                if cached.suite != hello.cipher_suite {
                    return Err(Error::IllegalParameter(
                        "resumed session with a different cipher suite".into(),
                    ));
                }
                Some(cached.master_secret.clone())
            },
            _ => None,
        };
        self.facts.resuming = resumed.is_some();
        if self.facts.resuming {
            // Put back only once the abbreviated handshake has verified, so
            // a session with a stale secret is not offered again.
            if let (Some(cache), Some(name)) = (link.sessions, link.config.server_name()) {
                cache.remove(&SessionKey::ServerName(name.to_string()));
            }
        }
        self.facts.needs_server_key_exchange = suite.needs_server_key_exchange();

        link.negotiated.version = Some(ProtocolVersion::Tls12);
        link.negotiated.suite = Some(suite.suite);
        link.negotiated.resumed = self.facts.resuming;
        if hello.extensions.server_names().is_some() {
            link.negotiated.server_name = link.config.server_name().map(str::to_string);
        }
        tracing::debug!(
            suite = suite.name,
            resumed = self.facts.resuming,
            "TLS 1.2 parameters negotiated"
        );

        if let Some(master_secret) = resumed {
            self.master_secret = Some(master_secret);
            self.derive_keys(link)?;
        }
        Ok(())
    }

    fn handle_certificate(&mut self, link: &mut Link<'_>, chain: Vec<Vec<u8>>) -> Result<()> {
        let leaf = chain
            .first()
            .ok_or_else(|| Error::BadCertificate("server sent no certificate".into()))?;
        let key = x509::certificate_key(leaf)?;
        let suite = self.suite()?;
        if key.kind.authentication() != suite.authentication {
            return Err(Error::BadCertificate(format!(
                "{:?} certificate cannot authenticate {}",
                key.kind, suite.name
            )));
        }
        self.server_key = Some(key);
        link.negotiated.peer_certificates = chain;
        Ok(())
    }

    fn handle_server_key_exchange(
        &mut self,
        link: &mut Link<'_>,
        message: &ServerKeyExchange,
    ) -> Result<()> {
        let key = self
            .server_key
            .as_ref()
            .ok_or_else(|| Error::Internal("ServerKeyExchange before Certificate".into()))?;
        let signed =
            ServerKeyExchange::signed_message(&self.client_random, &self.server_random, &message.params);
        identity::verify_signature(
            link.provider(),
            key,
            message.scheme,
            &link.config.signature_schemes,
            &signed,
            &message.signature,
        )?;
        match &message.params {
            ServerKeyExchangeParams::Ecdhe { group, .. } => {
                if !group.is_elliptic() || !link.config.supported_groups.contains(group) {
                    return Err(Error::IllegalParameter(format!(
                        "server chose unoffered group {:?}",
                        group
                    )));
                }
            },
            ServerKeyExchangeParams::Dhe { p, .. } => {
                if strip_leading_zeros(p).len() < MIN_DH_PRIME_LEN {
                    return Err(Error::HandshakeFailure(format!(
                        "{}-bit DH prime is too small",
                        strip_leading_zeros(p).len() * 8
                    )));
                }
            },
        }
        self.server_params = Some(message.params.clone());
        Ok(())
    }

    /// ClientKeyExchange, ChangeCipherSpec, Finished.
    fn send_key_exchange(&mut self, link: &mut Link<'_>) -> Result<()> {
        let suite = self.suite()?;
        let (pre_master_secret, message) = match suite.key_exchange {
            KeyExchangeMethod::Rsa => {
                let key = self
                    .server_key
                    .as_ref()
                    .ok_or_else(|| Error::Internal("no server key".into()))?;
                let mut pms = vec![3, 3];
                pms.extend_from_slice(&link.random_vec(46)?);
                let encrypted = link.provider().key_transport()?.encrypt(&key.spki, &pms)?;
                (Secret::new(pms), ClientKeyExchange::Rsa(encrypted))
            },
            KeyExchangeMethod::Dhe => match &self.server_params {
                Some(ServerKeyExchangeParams::Dhe { p, g, ys }) => {
                    let ephemeral = Ephemeral::finite_field(link.provider(), p, g)?;
                    let shared = ephemeral.agree(ys)?;
                    (
                        Secret::new(strip_leading_zeros(shared.as_bytes()).to_vec()),
                        ClientKeyExchange::Dhe(ephemeral.public.clone()),
                    )
                },
                _ => return Err(Error::Internal("missing DH parameters".into())),
            },
            KeyExchangeMethod::Ecdhe => match &self.server_params {
                Some(ServerKeyExchangeParams::Ecdhe { group, public }) => {
                    let ephemeral = Ephemeral::generate(link.provider(), *group)?;
                    let shared = ephemeral.agree(public)?;
                    (
                        Secret::new(shared.as_bytes().to_vec()),
                        ClientKeyExchange::Ecdhe(ephemeral.public.clone()),
                    )
                },
                _ => return Err(Error::Internal("missing ECDH parameters".into())),
            },
            KeyExchangeMethod::Tls13 => {
                return Err(Error::Internal("TLS 1.3 suite in a TLS 1.2 handshake".into()))
            },
        };

        let message = HandshakeMessage::ClientKeyExchange(message);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        self.master_secret = Some(prf::master_secret(
            link.provider(),
            suite.hash,
            pre_master_secret.as_bytes(),
            &self.client_random,
            &self.server_random,
        )?);
        self.derive_keys(link)?;
        self.send_finished(link)
    }

    fn derive_keys(&mut self, link: &Link<'_>) -> Result<()> {
        let block = KeyBlock::derive(
            link.provider(),
            self.suite()?,
            self.master_secret()?,
            &self.client_random,
            &self.server_random,
        )?;
        self.key_block = Some(block);
        Ok(())
    }

    fn send_finished(&mut self, link: &mut Link<'_>) -> Result<()> {
        let suite = self.suite()?;
        self.machine.sent(Event::ChangeCipherSpec, &self.facts)?;
        link.send_change_cipher_spec()?;
        let block = self.key_block()?;
        let protection = tls12::protection(
            link.provider_arc(),
            suite,
            &block.client_mac,
            &block.client_key,
            &block.client_iv,
        )?;
        link.record.activate_write(protection);
        tracing::debug!("client write keys active");

        let transcript_hash = link.transcript.hash(link.provider(), suite.hash)?;
        let verify_data = prf::finished_verify_data(
            link.provider(),
            suite.hash,
            self.master_secret()?,
            Role::Client,
            &transcript_hash,
        )?;
        let message = HandshakeMessage::Finished(verify_data.clone());
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        self.client_verify_data = verify_data;
        Ok(())
    }

    fn handle_finished(&mut self, link: &mut Link<'_>, received: &[u8]) -> Result<()> {
        let suite = self.suite()?;
        let transcript_hash = link.transcript.hash_partial(link.provider(), suite.hash, 1, &[])?;
        let expected = prf::finished_verify_data(
            link.provider(),
            suite.hash,
            self.master_secret()?,
            Role::Server,
            &transcript_hash,
        )?;
        if !constant_time_eq(&expected, received) {
            return Err(Error::DecryptError("server Finished does not verify".into()));
        }
        self.server_verify_data = received.to_vec();

        if self.facts.resuming {
            self.send_finished(link)?;
        }
        self.machine.transition(Client12State::Connected, &self.facts)?;
        self.renegotiating = false;
        self.store_session(link)?;
        tracing::info!(
            suite = suite.name,
            resumed = self.facts.resuming,
            "TLS 1.2 handshake complete"
        );
        Ok(())
    }

    fn store_session(&self, link: &Link<'_>) -> Result<()> {
        if self.session_id.is_empty() || !link.config.enable_session_resumption {
            return Ok(());
        }
        let (Some(cache), Some(name)) = (link.sessions, link.config.server_name()) else {
            return Ok(());
        };
        cache.put(
            SessionKey::ServerName(name.to_string()),
            CachedSession::Session(Session {
                id: self.session_id.clone(),
                suite: self.suite()?.suite,
                master_secret: self.master_secret()?.clone(),
                server_name: Some(name.to_string()),
                created: match &self.cached {
                    Some(cached) if self.facts.resuming => cached.created,
                    _ => Instant::now(),
                },
            }),
        );
        tracing::debug!(server_name = name, "session cached");
        Ok(())
    }

    fn handle_hello_request(&mut self, link: &mut Link<'_>) -> Result<()> {
        if !self.machine.is_connected() {
            tracing::debug!("HelloRequest during handshake ignored");
            return Ok(());
        }
        if link.config.allow_renegotiation && self.secure_renegotiation {
            self.renegotiate(link)
        } else {
            tracing::warn!("declining renegotiation");
            link.send_alert(Alert::warning(AlertDescription::NoRenegotiation))
        }
    }
}

impl ProtocolHandler for Client12Handler {
    fn role(&self) -> Role {
        Role::Client
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Tls12
    }

    fn state_name(&self) -> String {
        format!("{:?}", self.machine.state())
    }

    fn start(&mut self, link: &mut Link<'_>) -> Result<()> {
        self.send_client_hello(link)
    }

    fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            tls13: false,
            key_exchange: self.suite.map(|d| d.key_exchange),
        }
    }

    fn handle_message(
        &mut self,
        link: &mut Link<'_>,
        message: &HandshakeMessage,
        _raw: &[u8],
    ) -> Result<Step> {
        if let HandshakeMessage::HelloRequest = message {
            self.handle_hello_request(link)?;
            return Ok(Step::Continue);
        }
        self.machine.received(Event::of(message), &self.facts)?;
        match message {
            HandshakeMessage::ServerHello(hello) => self.handle_server_hello(link, hello)?,
            HandshakeMessage::Certificate(certificate) => {
                self.handle_certificate(link, certificate.chain())?
            },
            HandshakeMessage::ServerKeyExchange(ske) => self.handle_server_key_exchange(link, ske)?,
            HandshakeMessage::ServerHelloDone => self.send_key_exchange(link)?,
            HandshakeMessage::Finished(verify_data) => self.handle_finished(link, verify_data)?,
            other => {
                return Err(Error::UnexpectedMessage(format!(
                    "{} in a TLS 1.2 client handshake",
                    other.name()
                )))
            },
        }
        Ok(Step::Continue)
    }

    fn handle_change_cipher_spec(&mut self, link: &mut Link<'_>) -> Result<()> {
        self.machine.received(Event::ChangeCipherSpec, &self.facts)?;
        let suite = self.suite()?;
        let block = self.key_block()?;
        let protection = tls12::protection(
            link.provider_arc(),
            suite,
            &block.server_mac,
            &block.server_key,
            &block.server_iv,
        )?;
        link.record.activate_read(protection);
        tracing::debug!("server write keys active for reading");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.machine.is_connected()
    }

    fn close_sent(&mut self) -> Result<()> {
        self.machine.sent(Event::CloseNotify, &self.facts)?;
        Ok(())
    }

    fn close_received(&mut self) -> Result<()> {
        self.machine.received(Event::CloseNotify, &self.facts)?;
        Ok(())
    }

    fn renegotiate(&mut self, link: &mut Link<'_>) -> Result<()> {
        if !self.machine.is_connected() {
            return Err(Error::InvalidConfig("renegotiation needs an established connection".into()));
        }
        if !link.config.allow_renegotiation || !self.secure_renegotiation {
            return Err(Error::InvalidConfig(
                "secure renegotiation was not negotiated or is disabled".into(),
            ));
        }
        tracing::debug!("renegotiating");
        link.transcript.reset();
        self.renegotiating = true;
        self.facts = Facts::default();
        self.server_key = None;
        self.server_params = None;
        self.send_client_hello(link)
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.facts = Facts::default();
        self.master_secret = None;
        self.key_block = None;
        self.renegotiating = false;
    }
}
