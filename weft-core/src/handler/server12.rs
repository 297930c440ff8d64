//! TLS 1.2 server handshake.
//!
//! Answers a ClientHello with a new session (Certificate, optional
//! ServerKeyExchange, ServerHelloDone) or, when the client presents a
//! cached session ID, with an abbreviated handshake. A ClientHello that
//! arrives on an established connection starts a renegotiation when both
//! sides agreed on RFC 5746.

use std::time::Instant;

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::alert::Alert;
use crate::cipher::{CipherSuite, CipherSuiteDescriptor, KeyExchangeMethod};
use crate::error::{AlertDescription, Error, Result};
use crate::extensions::{Extension, SupportedVersions};
use crate::handler::{constant_time_eq, strip_leading_zeros, Ephemeral, Link, ProtocolHandler, Step};
use crate::identity::Identity;
use crate::key_schedule::prf::{self, KeyBlock};
use crate::key_schedule::Secret;
use crate::messages::{
    Certificate, ClientHello, ClientKeyExchange, DecodeContext, HandshakeMessage, ServerHello,
    ServerKeyExchange, ServerKeyExchangeParams,
};
use crate::protocol::{
    ExtensionType, HandshakeType, NamedGroup, ProtocolVersion, Role, DOWNGRADE_TLS12_SENTINEL,
};
use crate::record::tls12;
use crate::session::{CachedSession, Session, SessionKey};
use crate::state_machine::{Event, Facts, Machine, Server12State};

const PRE_MASTER_SECRET_LEN: usize = 48;

pub(crate) struct Server12Handler {
    machine: Machine<Server12State>,
    facts: Facts,
    client_random: [u8; 32],
    server_random: [u8; 32],
    suite: Option<&'static CipherSuiteDescriptor>,
    session_id: Vec<u8>,
    server_name: Option<String>,
    ephemeral: Option<Ephemeral>,
    master_secret: Option<Secret>,
    key_block: Option<KeyBlock>,
    client_verify_data: Vec<u8>,
    server_verify_data: Vec<u8>,
    secure_renegotiation: bool,
    renegotiating: bool,
}

/// Outcome of suite selection.
struct Selection {
    suite: &'static CipherSuiteDescriptor,
    group: Option<NamedGroup>,
    resumed: Option<Session>,
}

impl Server12Handler {
    pub(crate) fn new() -> Self {
        Self {
            machine: Machine::new(),
            facts: Facts::default(),
            client_random: [0; 32],
            server_random: [0; 32],
            suite: None,
            session_id: Vec::new(),
            server_name: None,
            ephemeral: None,
            master_secret: None,
            key_block: None,
            client_verify_data: Vec::new(),
            server_verify_data: Vec::new(),
            secure_renegotiation: false,
            renegotiating: false,
        }
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

    fn identity<'c>(link: &Link<'c>) -> Result<&'c Identity> {
        link.config
            .identity
            .as_ref()
            .ok_or_else(|| Error::HandshakeFailure("server has no certificate".into()))
    }

    fn check_version(hello: &ClientHello) -> Result<()> {
        let offered = match hello.extensions.supported_versions() {
            Some(SupportedVersions::Offered(versions)) => {
                versions.contains(&ProtocolVersion::Tls12)
            },
            _ => hello.legacy_version.to_u16() >= ProtocolVersion::Tls12.to_u16(),
        };
        if offered {
            Ok(())
        } else {
            Err(Error::ProtocolVersion(format!(
                "client offers {} at most",
                hello.legacy_version.name()
            )))
        }
    }

    fn check_renegotiation_binding(&mut self, hello: &ClientHello) -> Result<()> {
        if self.renegotiating {
            if hello
                .cipher_suites
                .contains(&CipherSuite::EmptyRenegotiationInfoScsv)
            {
                return Err(Error::HandshakeFailure(
                    "renegotiation signalling cipher suite on renegotiation".into(),
                ));
            }
            match hello.extensions.renegotiation_info() {
                Some(binding) if constant_time_eq(binding, &self.client_verify_data) => Ok(()),
                _ => Err(Error::HandshakeFailure("renegotiation_info mismatch".into())),
            }
        } else {
            if matches!(hello.extensions.renegotiation_info(), Some(b) if !b.is_empty()) {
                return Err(Error::HandshakeFailure(
                    "non-empty renegotiation_info on initial handshake".into(),
                ));
            }
            self.secure_renegotiation = hello.offers_secure_renegotiation();
            Ok(())
        }
    }

    /// Server preference order, filtered by what the certificate, the
    /// client's groups and its signature algorithms allow.
    fn select(&self, link: &Link<'_>, hello: &ClientHello) -> Result<Selection> {
        let identity = Self::identity(link)?;
        let client_groups = hello.extensions.supported_groups().unwrap_or(&[]);
        let group = link
            .config
            .supported_groups
            .iter()
            .copied()
            .find(|g| g.is_elliptic() && client_groups.contains(g));
        let can_sign = identity
            .choose_scheme(hello.extensions.signature_algorithms(), false)
            .is_some();

        if let Some(resumed) = self.resumable(link, hello) {
            let suite = resumed
                .suite
                .descriptor()
                .ok_or_else(|| Error::Internal("cached session with unknown suite".into()))?;
            return Ok(Selection {
                suite,
                group,
                resumed: Some(resumed),
            });
        }

        let suite = link
            .config
            .suites_for(ProtocolVersion::Tls12)
            .filter(|d| hello.cipher_suites.contains(&d.suite))
            .filter(|d| d.authentication == identity.kind().authentication())
            .find(|d| match d.key_exchange {
                KeyExchangeMethod::Rsa => true,
                KeyExchangeMethod::Dhe => can_sign,
                KeyExchangeMethod::Ecdhe => can_sign && group.is_some(),
                KeyExchangeMethod::Tls13 => false,
            })
            .ok_or_else(|| Error::HandshakeFailure("no shared cipher suite".into()))?;
        Ok(Selection {
            suite,
            group,
            resumed: None,
        })
    }

    fn resumable(&self, link: &Link<'_>, hello: &ClientHello) -> Option<Session> {
        if !link.config.enable_session_resumption || hello.session_id.is_empty() {
            return None;
        }
        let cached = link
            .sessions?
            .get(&SessionKey::SessionId(hello.session_id.clone()))?;
        let session = cached.as_session()?;
        let usable = hello.cipher_suites.contains(&session.suite)
            && link
                .config
                .suites_for(ProtocolVersion::Tls12)
                .any(|d| d.suite == session.suite)
            && session.server_name == self.server_name;
        usable.then(|| session.clone())
    }

    fn handle_client_hello(&mut self, link: &mut Link<'_>, hello: &ClientHello) -> Result<()> {
        Self::check_version(hello)?;
        if !hello.compression_methods.contains(&0) {
            return Err(Error::IllegalParameter("null compression not offered".into()));
        }
        self.check_renegotiation_binding(hello)?;

        self.server_name = hello
            .extensions
            .server_names()
            .and_then(|names| names.first().cloned());
        let selection = self.select(link, hello)?;
        let suite = selection.suite;

        self.client_random = hello.random;
        self.server_random = link.random()?;
        if link.config.supports(ProtocolVersion::Tls13) {
            self.server_random[24..].copy_from_slice(&DOWNGRADE_TLS12_SENTINEL);
        }
        self.session_id = match &selection.resumed {
            Some(session) => session.id.clone(),
            None if link.config.enable_session_resumption && link.sessions.is_some() => {
                link.random_vec(32)?
            },
            None => Vec::new(),
        };
        self.suite = Some(suite);
        self.facts.resuming = selection.resumed.is_some();
        self.facts.needs_server_key_exchange = suite.needs_server_key_exchange();

        link.negotiated.version = Some(ProtocolVersion::Tls12);
        link.negotiated.suite = Some(suite.suite);
        link.negotiated.resumed = self.facts.resuming;
        link.negotiated.server_name = self.server_name.clone();
        tracing::debug!(
            suite = suite.name,
            resumed = self.facts.resuming,
            "TLS 1.2 parameters negotiated"
        );

        let mut server_hello = ServerHello::new(
            ProtocolVersion::Tls12,
            self.server_random,
            self.session_id.clone(),
            suite.suite,
        );
        if self.secure_renegotiation {
            server_hello.extensions.push(Extension::RenegotiationInfo(
                [self.client_verify_data.as_slice(), self.server_verify_data.as_slice()].concat(),
            ));
        }
        if self.server_name.is_some() && !self.facts.resuming {
            server_hello.extensions.push(Extension::ServerName(Vec::new()));
        }
        if suite.key_exchange == KeyExchangeMethod::Ecdhe
            && hello.extensions.contains(ExtensionType::EcPointFormats)
        {
            server_hello.extensions.push(Extension::EcPointFormats(vec![0]));
        }
        let message = HandshakeMessage::ServerHello(server_hello);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        match selection.resumed {
            Some(session) => {
                self.master_secret = Some(session.master_secret);
                self.derive_keys(link)?;
                self.send_finished(link)
            },
            None => self.send_server_flight(link, hello, selection.group),
        }
    }

    /// Certificate, ServerKeyExchange when the suite needs one, ServerHelloDone.
    fn send_server_flight(
        &mut self,
        link: &mut Link<'_>,
        hello: &ClientHello,
        group: Option<NamedGroup>,
    ) -> Result<()> {
        let identity = Self::identity(link)?;
        let suite = self.suite()?;

        let message = HandshakeMessage::Certificate(Certificate::tls12(identity.chain()));
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        if self.facts.needs_server_key_exchange {
            let (ephemeral, params) = match suite.key_exchange {
                KeyExchangeMethod::Ecdhe => {
                    let group = group
                        .ok_or_else(|| Error::HandshakeFailure("no shared group".into()))?;
                    let ephemeral = Ephemeral::generate(link.provider(), group)?;
                    let params = ServerKeyExchangeParams::Ecdhe {
                        group,
                        public: ephemeral.public.clone(),
                    };
                    (ephemeral, params)
                },
                _ => {
                    let dh = &link.config.dh_parameters;
                    let ephemeral = Ephemeral::finite_field(link.provider(), &dh.p, &dh.g)?;
                    let params = ServerKeyExchangeParams::Dhe {
                        p: dh.p.clone(),
                        g: dh.g.clone(),
                        ys: ephemeral.public.clone(),
                    };
                    (ephemeral, params)
                },
            };
            let scheme = identity
                .choose_scheme(hello.extensions.signature_algorithms(), false)
                .ok_or_else(|| Error::HandshakeFailure("no shared signature scheme".into()))?;
            let signed =
                ServerKeyExchange::signed_message(&self.client_random, &self.server_random, &params);
            let signature = identity.sign(link.provider(), scheme, &signed)?;
            let message = HandshakeMessage::ServerKeyExchange(ServerKeyExchange {
                params,
                scheme,
                signature,
            });
            self.machine.sent(Event::of(&message), &self.facts)?;
            link.send_handshake_message(&message)?;
            self.ephemeral = Some(ephemeral);
        }

        let message = HandshakeMessage::ServerHelloDone;
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        Ok(())
    }

    fn handle_client_key_exchange(
        &mut self,
        link: &mut Link<'_>,
        message: &ClientKeyExchange,
    ) -> Result<()> {
        let suite = self.suite()?;
        let pre_master_secret = match message {
            ClientKeyExchange::Rsa(encrypted) => Self::rsa_pre_master_secret(link, encrypted)?,
            ClientKeyExchange::Dhe(public) => {
                let ephemeral = self
                    .ephemeral
                    .take()
                    .ok_or_else(|| Error::Internal("no DH key pair".into()))?;
                let shared = ephemeral.agree(public)?;
                Secret::new(strip_leading_zeros(shared.as_bytes()).to_vec())
            },
            ClientKeyExchange::Ecdhe(public) => {
                let ephemeral = self
                    .ephemeral
                    .take()
                    .ok_or_else(|| Error::Internal("no ECDH key pair".into()))?;
                Secret::new(ephemeral.agree(public)?.as_bytes().to_vec())
            },
        };
        self.master_secret = Some(prf::master_secret(
            link.provider(),
            suite.hash,
            pre_master_secret.as_bytes(),
            &self.client_random,
            &self.server_random,
        )?);
        self.derive_keys(link)
    }

    /// Decrypt an RSA-encrypted premaster secret. A failed decryption or a
    /// wrong length or version yields a random secret instead, chosen
    /// without branching on the outcome, so the failure only surfaces as a
    /// Finished mismatch (RFC 5246 Section 7.4.7.1).
    fn rsa_pre_master_secret(link: &Link<'_>, encrypted: &[u8]) -> Result<Secret> {
        let identity = Self::identity(link)?;
        let mut fallback = vec![3, 3];
        fallback.extend_from_slice(&link.random_vec(PRE_MASTER_SECRET_LEN - 2)?);

        let decrypted = link
            .provider()
            .key_transport()?
            .decrypt(identity.private_key(), encrypted)
            .unwrap_or_default();
        let mut candidate = [0u8; PRE_MASTER_SECRET_LEN];
        let well_sized = decrypted.len() == PRE_MASTER_SECRET_LEN;
        if well_sized {
            candidate.copy_from_slice(&decrypted);
        }
        let valid = Choice::from(u8::from(well_sized)) & candidate[..2].ct_eq(&[3, 3]);

        let secret = fallback
            .iter()
            .zip(candidate.iter())
            .map(|(f, c)| u8::conditional_select(f, c, valid))
            .collect();
        Ok(Secret::new(secret))
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
            &block.server_mac,
            &block.server_key,
            &block.server_iv,
        )?;
        link.record.activate_write(protection);
        tracing::debug!("server write keys active");

        let transcript_hash = link.transcript.hash(link.provider(), suite.hash)?;
        let verify_data = prf::finished_verify_data(
            link.provider(),
            suite.hash,
            self.master_secret()?,
            Role::Server,
            &transcript_hash,
        )?;
        let message = HandshakeMessage::Finished(verify_data.clone());
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        self.server_verify_data = verify_data;
        Ok(())
    }

    fn handle_finished(&mut self, link: &mut Link<'_>, received: &[u8]) -> Result<()> {
        let suite = self.suite()?;
        let transcript_hash = link.transcript.hash_partial(link.provider(), suite.hash, 1, &[])?;
        let expected = prf::finished_verify_data(
            link.provider(),
            suite.hash,
            self.master_secret()?,
            Role::Client,
            &transcript_hash,
        )?;
        if !constant_time_eq(&expected, received) {
            return Err(Error::DecryptError("client Finished does not verify".into()));
        }
        self.client_verify_data = received.to_vec();

        if !self.facts.resuming {
            self.send_finished(link)?;
        }
        self.machine.transition(Server12State::Connected, &self.facts)?;
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
        if self.facts.resuming || self.session_id.is_empty() {
            return Ok(());
        }
        let Some(cache) = link.sessions else {
            return Ok(());
        };
        cache.put(
            SessionKey::SessionId(self.session_id.clone()),
            CachedSession::Session(Session {
                id: self.session_id.clone(),
                suite: self.suite()?.suite,
                master_secret: self.master_secret()?.clone(),
                server_name: self.server_name.clone(),
                created: Instant::now(),
            }),
        );
        tracing::debug!(id_len = self.session_id.len(), "session cached");
        Ok(())
    }

    /// A ClientHello on an established connection.
    fn handle_renegotiation(
        &mut self,
        link: &mut Link<'_>,
        hello: &ClientHello,
        raw: &[u8],
    ) -> Result<()> {
        if !link.config.allow_renegotiation || !self.secure_renegotiation {
            tracing::warn!("declining renegotiation");
            return link.send_alert(Alert::warning(AlertDescription::NoRenegotiation));
        }
        tracing::debug!("client renegotiates");
        link.transcript.reset();
        link.transcript.push(raw);
        self.renegotiating = true;
        self.facts = Facts::default();
        self.ephemeral = None;
        self.machine
            .received(Event::Handshake(HandshakeType::ClientHello), &self.facts)?;
        self.handle_client_hello(link, hello)
    }
}

impl ProtocolHandler for Server12Handler {
    fn role(&self) -> Role {
        Role::Server
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Tls12
    }

    fn state_name(&self) -> String {
        format!("{:?}", self.machine.state())
    }

    fn start(&mut self, _link: &mut Link<'_>) -> Result<()> {
        Ok(())
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
        raw: &[u8],
    ) -> Result<Step> {
        if let HandshakeMessage::ClientHello(hello) = message {
            if self.machine.is_connected() {
                self.handle_renegotiation(link, hello, raw)?;
                return Ok(Step::Continue);
            }
        }
        self.machine.received(Event::of(message), &self.facts)?;
        match message {
            HandshakeMessage::ClientHello(hello) => self.handle_client_hello(link, hello)?,
            HandshakeMessage::ClientKeyExchange(cke) => self.handle_client_key_exchange(link, cke)?,
            HandshakeMessage::Finished(verify_data) => self.handle_finished(link, verify_data)?,
            other => {
                return Err(Error::UnexpectedMessage(format!(
                    "{} in a TLS 1.2 server handshake",
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
            &block.client_mac,
            &block.client_key,
            &block.client_iv,
        )?;
        link.record.activate_read(protection);
        tracing::debug!("client write keys active for reading");
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

    fn reset(&mut self) {
        self.machine.reset();
        self.facts = Facts::default();
        self.ephemeral = None;
        self.master_secret = None;
        self.key_block = None;
        self.renegotiating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::Extensions;

    fn hello(version: ProtocolVersion) -> ClientHello {
        ClientHello::new(version, [0; 32], vec![CipherSuite::EcdheRsaWithAes128GcmSha256])
    }

    #[test]
    fn test_version_check() {
        assert!(Server12Handler::check_version(&hello(ProtocolVersion::Tls12)).is_ok());
        assert!(matches!(
            Server12Handler::check_version(&hello(ProtocolVersion::Tls11)),
            Err(Error::ProtocolVersion(_))
        ));

        let mut only13 = hello(ProtocolVersion::Tls12);
        only13.extensions = Extensions::from(vec![Extension::SupportedVersions(
            SupportedVersions::Offered(vec![ProtocolVersion::Tls13]),
        )]);
        assert!(Server12Handler::check_version(&only13).is_err());
    }

    #[test]
    fn test_initial_renegotiation_binding() {
        let mut handler = Server12Handler::new();
        let mut with_scsv = hello(ProtocolVersion::Tls12);
        with_scsv.cipher_suites.push(CipherSuite::EmptyRenegotiationInfoScsv);
        handler.check_renegotiation_binding(&with_scsv).unwrap();
        assert!(handler.secure_renegotiation);

        let mut bogus = hello(ProtocolVersion::Tls12);
        bogus.extensions.push(Extension::RenegotiationInfo(vec![1; 12]));
        assert!(matches!(
            handler.check_renegotiation_binding(&bogus),
            Err(Error::HandshakeFailure(_))
        ));
    }

    #[test]
    fn test_renegotiation_binding_must_match() {
        let mut handler = Server12Handler::new();
        handler.renegotiating = true;
        handler.client_verify_data = vec![5; 12];

        let mut good = hello(ProtocolVersion::Tls12);
        good.extensions.push(Extension::RenegotiationInfo(vec![5; 12]));
        handler.check_renegotiation_binding(&good).unwrap();

        let mut bad = hello(ProtocolVersion::Tls12);
        bad.extensions.push(Extension::RenegotiationInfo(vec![6; 12]));
        assert!(handler.check_renegotiation_binding(&bad).is_err());
        assert!(handler
            .check_renegotiation_binding(&hello(ProtocolVersion::Tls12))
            .is_err());
    }
}
