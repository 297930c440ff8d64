//! TLS 1.3 client handshake.
//!
//! ```text
//! ClientHello [+ early data]   -->
//!                              <--  [HelloRetryRequest]
//! [ClientHello]                -->
//!                              <--  ServerHello, {EncryptedExtensions},
//!                                   {[CertificateRequest], Certificate,
//!                                   CertificateVerify}, {Finished}
//! {[EndOfEarlyData]}
//! {[Certificate]}, {Finished}  -->
//!                              <--  [NewSessionTicket]
//! ```
//! When TLS 1.2 is also enabled the ClientHello offers both versions, and
//! a ServerHello without `supported_versions` hands the connection over to
//! the TLS 1.2 client.

use std::time::Instant;

use crate::cipher::{CipherSuite, CipherSuiteDescriptor};
use crate::error::{Error, Result};
use crate::extensions::{
    Extension, Extensions, KeyShare, KeyShareEntry, PreSharedKey, PskIdentity, PskOffer,
    SupportedVersions,
};
use crate::handler::{
    certificate_verify_input, offered_descriptor, Client12Handler, Ephemeral, Link,
    ProtocolHandler, Step,
};
use crate::identity;
use crate::key_schedule::tls13::{self as schedule, KeySchedule};
use crate::key_schedule::Secret;
use crate::messages::{
    Certificate, CertificateRequest, ClientHello, DecodeContext, HandshakeMessage,
    HelloRetryRequest, NewSessionTicket, ServerHello, MAX_TICKET_LIFETIME,
};
use crate::protocol::{
    ContentType, ExtensionType, NamedGroup, ProtocolVersion, PskKeyExchangeMode, Role,
    SignatureScheme,
};
use crate::session::{CachedSession, Session, SessionKey, Ticket};
use crate::state_machine::{Client13State, Event, Facts, Machine};
use crate::x509::{self, CertificateKey};

pub(crate) struct Client13Handler {
    machine: Machine<Client13State>,
    facts: Facts,
    client_random: [u8; 32],
    session_id: Vec<u8>,
    /// Last ClientHello sent, kept for a TLS 1.2 fallback.
    hello: Option<ClientHello>,
    share: Option<Ephemeral>,
    retry_group: Option<NamedGroup>,
    cookie: Option<Vec<u8>>,
    retried: bool,
    ticket: Option<Ticket>,
    cached_session: Option<Session>,
    psk_schedule: Option<KeySchedule>,
    early_data_sent: bool,
    suite: Option<&'static CipherSuiteDescriptor>,
    schedule: Option<KeySchedule>,
    client_handshake_secret: Option<Secret>,
    server_handshake_secret: Option<Secret>,
    client_traffic_secret: Option<Secret>,
    server_traffic_secret: Option<Secret>,
    resumption_master_secret: Option<Secret>,
    server_key: Option<CertificateKey>,
    certificate_context: Vec<u8>,
}

fn missing(what: &'static str) -> Error {
    Error::Internal(format!("{} not available yet", what))
}

impl Client13Handler {
    pub(crate) fn new() -> Self {
        Self {
            machine: Machine::new(),
            facts: Facts::default(),
            client_random: [0; 32],
            session_id: Vec::new(),
            hello: None,
            share: None,
            retry_group: None,
            cookie: None,
            retried: false,
            ticket: None,
            cached_session: None,
            psk_schedule: None,
            early_data_sent: false,
            suite: None,
            schedule: None,
            client_handshake_secret: None,
            server_handshake_secret: None,
            client_traffic_secret: None,
            server_traffic_secret: None,
            resumption_master_secret: None,
            server_key: None,
            certificate_context: Vec::new(),
        }
    }

    fn suite(&self) -> Result<&'static CipherSuiteDescriptor> {
        self.suite.ok_or_else(|| missing("cipher suite"))
    }

    /// Pick up what the cache holds for this server: a ticket, which is
    /// single use and leaves the cache, or a TLS 1.2 session.
    fn load_cached(&mut self, link: &Link<'_>) {
        if !link.config.enable_session_resumption {
            return;
        }
        let (Some(cache), Some(name)) = (link.sessions, link.config.server_name()) else {
            return;
        };
        let key = SessionKey::ServerName(name.to_string());
        match cache.get(&key) {
            Some(CachedSession::Ticket(ticket)) => {
                cache.remove(&key);
                let usable = ticket.is_valid(Instant::now())
                    && link
                        .config
                        .suites_for(ProtocolVersion::Tls13)
                        .any(|d| d.hash == ticket.hash);
                if usable {
                    tracing::debug!(server_name = name, "offering resumption ticket");
                    self.ticket = Some(ticket);
                }
            },
            Some(CachedSession::Session(session)) if link.config.supports(ProtocolVersion::Tls12) => {
                self.cached_session = Some(session);
            },
            _ => {},
        }
    }

    fn key_share_group(&self, link: &Link<'_>) -> Result<NamedGroup> {
        self.retry_group
            .or_else(|| {
                link.config
                    .supported_groups
                    .iter()
                    .copied()
                    .find(|g| g.key_exchange_algorithm().is_some())
            })
            .ok_or_else(|| Error::InvalidConfig("no usable key exchange group".into()))
    }

    fn send_client_hello(&mut self, link: &mut Link<'_>) -> Result<()> {
        let provider = link.provider();
        if !self.retried {
            self.load_cached(link);
            self.client_random = link.random()?;
            self.session_id = match &self.cached_session {
                Some(session) => session.id.clone(),
                None => link.random_vec(32)?,
            };
        }
        let tls12 = link.config.supports(ProtocolVersion::Tls12);

        let mut suites: Vec<CipherSuite> = link
            .config
            .suites_for(ProtocolVersion::Tls13)
            .map(|d| d.suite)
            .collect();
        if tls12 {
            suites.extend(link.config.suites_for(ProtocolVersion::Tls12).map(|d| d.suite));
        }
        let mut hello = ClientHello::new(ProtocolVersion::Tls12, self.client_random, suites);
        hello.session_id = self.session_id.clone();

        if let Some(name) = link.config.server_name() {
            hello.extensions.push(Extension::ServerName(vec![name.to_string()]));
        }
        let mut versions = vec![ProtocolVersion::Tls13];
        if tls12 {
            versions.push(ProtocolVersion::Tls12);
        }
        hello.extensions.push(Extension::SupportedVersions(SupportedVersions::Offered(versions)));
        hello.extensions.push(Extension::SupportedGroups(link.config.supported_groups.clone()));
        hello.extensions.push(Extension::SignatureAlgorithms(
            link.config.signature_schemes.clone(),
        ));

        let group = self.key_share_group(link)?;
        let share = Ephemeral::generate(provider, group)?;
        hello.extensions.push(Extension::KeyShare(KeyShare::ClientShares(vec![KeyShareEntry {
            group,
            key_exchange: share.public.clone(),
        }])));
        self.share = Some(share);

        if let Some(cookie) = &self.cookie {
            hello.extensions.push(Extension::Cookie(cookie.clone()));
        }
        if tls12 {
            hello.extensions.push(Extension::EcPointFormats(vec![0]));
            hello.extensions.push(Extension::RenegotiationInfo(Vec::new()));
        }

        let send_early = !self.retried
            && !link.early_data.is_empty()
            && self.ticket.as_ref().is_some_and(|t| t.max_early_data_size > 0);
        if let Some(ticket) = &self.ticket {
            hello.extensions.push(Extension::PskKeyExchangeModes(link.config.psk_modes.clone()));
            if send_early {
                hello.extensions.push(Extension::EarlyData(None));
            }
            self.offer_psk(link, &mut hello, ticket)?;
        }

        let message = HandshakeMessage::ClientHello(hello.clone());
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        self.hello = Some(hello);

        if send_early {
            self.send_early_data(link)?;
        }
        Ok(())
    }

    /// Append pre_shared_key with a binder over the ClientHello as it will
    /// be sent, minus the binders themselves.
    fn offer_psk(&self, link: &Link<'_>, hello: &mut ClientHello, ticket: &Ticket) -> Result<()> {
        let provider = link.provider();
        let hash = ticket.hash;
        let identities = vec![PskIdentity {
            identity: ticket.identity.clone(),
            obfuscated_ticket_age: ticket.obfuscated_age(Instant::now()),
        }];
        let placeholder = PskOffer {
            identities: identities.clone(),
            binders: vec![vec![0; hash.output_size()]],
        };
        hello.extensions.push(Extension::PreSharedKey(PreSharedKey::Offer(placeholder.clone())));

        let encoded = HandshakeMessage::ClientHello(hello.clone()).encode();
        let truncated = placeholder.truncate(&encoded)?;
        let transcript_hash = link.transcript.hash_partial(provider, hash, 0, truncated)?;
        let psk_schedule = KeySchedule::new(provider, hash, Some(ticket.psk.as_bytes()))?;
        let binder = schedule::finished_verify_data(
            provider,
            hash,
            &psk_schedule.binder_key(provider)?,
            &transcript_hash,
        )?;

        hello.extensions.remove(ExtensionType::PreSharedKey);
        hello.extensions.push(Extension::PreSharedKey(PreSharedKey::Offer(PskOffer {
            identities,
            binders: vec![binder],
        })));
        Ok(())
    }

    fn send_early_data(&mut self, link: &mut Link<'_>) -> Result<()> {
        let provider = link.provider();
        let Some(ticket) = &self.ticket else {
            return Ok(());
        };
        let suite = ticket
            .suite
            .descriptor()
            .ok_or_else(|| Error::Internal("ticket with unknown suite".into()))?;
        let early = KeySchedule::new(provider, ticket.hash, Some(ticket.psk.as_bytes()))?;
        let client_hello_hash = link.transcript.hash(provider, ticket.hash)?;
        let secret = early.client_early_traffic_secret(provider, &client_hello_hash)?;
        let protection = link.tls13_protection(suite, &secret)?;
        link.record.activate_write(protection);

        let mut data = std::mem::take(&mut *link.early_data);
        data.truncate(ticket.max_early_data_size as usize);
        link.record
            .write_record(&mut *link.transport, ContentType::ApplicationData, &data)?;
        tracing::debug!(len = data.len(), "early data sent");
        self.early_data_sent = true;
        Ok(())
    }

    fn handle_hello_retry_request(
        &mut self,
        link: &mut Link<'_>,
        retry: &HelloRetryRequest,
    ) -> Result<()> {
        if self.retried {
            return Err(Error::UnexpectedMessage("second HelloRetryRequest".into()));
        }
        if retry.extensions.supported_versions()
            != Some(&SupportedVersions::Selected(ProtocolVersion::Tls13))
        {
            return Err(Error::IllegalParameter(
                "HelloRetryRequest without TLS 1.3 in supported_versions".into(),
            ));
        }
        let offered: Vec<CipherSuite> = link
            .config
            .suites_for(ProtocolVersion::Tls13)
            .map(|d| d.suite)
            .collect();
        let suite = offered_descriptor(&offered, retry.cipher_suite, ProtocolVersion::Tls13)?;
        if retry.session_id != self.session_id {
            return Err(Error::IllegalParameter("session ID not echoed".into()));
        }

        let sent_group = self.share.as_ref().and_then(|s| s.group);
        let retry_group = match retry.extensions.key_share() {
            Some(KeyShare::RetryGroup(group)) => {
                if !link.config.supported_groups.contains(group) || Some(*group) == sent_group {
                    return Err(Error::IllegalParameter(format!(
                        "HelloRetryRequest asks for group {:?}",
                        group
                    )));
                }
                Some(*group)
            },
            Some(_) => return Err(Error::decode("malformed key_share in HelloRetryRequest")),
            None => None,
        };
        let cookie = retry.extensions.cookie().map(<[u8]>::to_vec);
        if retry_group.is_none() && cookie.is_none() {
            return Err(Error::IllegalParameter(
                "HelloRetryRequest would not change the ClientHello".into(),
            ));
        }
        tracing::debug!(group = ?retry_group, cookie = cookie.is_some(), "HelloRetryRequest");

        if self.early_data_sent {
            link.record.reset();
            self.early_data_sent = false;
        }
        let provider = link.provider();
        link.transcript.collapse_client_hello(provider, suite.hash)?;
        if self.ticket.as_ref().is_some_and(|t| t.hash != suite.hash) {
            self.ticket = None;
        }
        self.suite = Some(suite);
        self.retry_group = retry_group.or(self.retry_group);
        self.cookie = cookie;
        self.retried = true;
        self.send_client_hello(link)
    }

    fn handle_server_hello(&mut self, link: &mut Link<'_>, hello: &ServerHello) -> Result<()> {
        let provider = link.provider();
        if hello.session_id != self.session_id {
            return Err(Error::IllegalParameter("session ID not echoed".into()));
        }
        if hello.compression_method != 0 {
            return Err(Error::IllegalParameter("non-null compression".into()));
        }
        let offered: Vec<CipherSuite> = link
            .config
            .suites_for(ProtocolVersion::Tls13)
            .map(|d| d.suite)
            .collect();
        let suite = offered_descriptor(&offered, hello.cipher_suite, ProtocolVersion::Tls13)?;
        if self.retried && self.suite.map(|s| s.suite) != Some(suite.suite) {
            return Err(Error::IllegalParameter(
                "ServerHello suite differs from HelloRetryRequest".into(),
            ));
        }

        let psk = match hello.extensions.pre_shared_key() {
            Some(PreSharedKey::Selected(0)) => match &self.ticket {
                Some(ticket) if ticket.hash == suite.hash => Some(ticket.psk.clone()),
                _ => {
                    return Err(Error::IllegalParameter(
                        "server selected a PSK that cannot be used".into(),
                    ))
                },
            },
            Some(_) => return Err(Error::IllegalParameter("unknown PSK identity selected".into())),
            None => None,
        };

        let shared = match hello.extensions.key_share() {
            Some(KeyShare::ServerShare(entry)) => {
                let share = self
                    .share
                    .as_ref()
                    .ok_or_else(|| missing("key share"))?;
                if share.group != Some(entry.group) {
                    return Err(Error::IllegalParameter(format!(
                        "server share for unoffered group {:?}",
                        entry.group
                    )));
                }
                Some(share.agree(&entry.key_exchange)?)
            },
            Some(_) => return Err(Error::decode("malformed key_share in ServerHello")),
            None if psk.is_some()
                && link.config.psk_modes.contains(&PskKeyExchangeMode::PskKe) =>
            {
                None
            },
            None => return Err(Error::MissingExtension("key_share")),
        };
        self.share = None;

        self.facts.psk_accepted = psk.is_some();
        let mut key_schedule = KeySchedule::new(provider, suite.hash, psk.as_ref().map(Secret::as_bytes))?;
        key_schedule.input_handshake_secret(provider, shared.as_ref().map(|s| s.as_bytes()))?;
        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let (client_secret, server_secret) =
            key_schedule.handshake_traffic_secrets(provider, &transcript_hash)?;

        let protection = link.tls13_protection(suite, &server_secret)?;
        link.record.activate_read(protection);
        if !self.early_data_sent {
            let protection = link.tls13_protection(suite, &client_secret)?;
            link.record.activate_write(protection);
        }
        tracing::debug!(suite = suite.name, psk = self.facts.psk_accepted, "handshake keys active");

        self.suite = Some(suite);
        self.schedule = Some(key_schedule);
        self.client_handshake_secret = Some(client_secret);
        self.server_handshake_secret = Some(server_secret);
        self.psk_schedule = None;

        link.negotiated.version = Some(ProtocolVersion::Tls13);
        link.negotiated.suite = Some(suite.suite);
        link.negotiated.resumed = self.facts.psk_accepted;
        Ok(())
    }

    fn handle_encrypted_extensions(
        &mut self,
        link: &mut Link<'_>,
        extensions: &Extensions,
    ) -> Result<()> {
        let accepted = extensions.early_data().is_some();
        if accepted && !self.early_data_sent {
            return Err(Error::IllegalParameter("early data accepted but not offered".into()));
        }
        self.facts.early_data_accepted = accepted;
        link.negotiated.early_data_accepted = accepted;
        if self.early_data_sent && !accepted {
            tracing::debug!("early data rejected");
            let secret = self
                .client_handshake_secret
                .as_ref()
                .ok_or_else(|| missing("client handshake secret"))?;
            let protection = link.tls13_protection(self.suite()?, secret)?;
            link.record.activate_write(protection);
            self.early_data_sent = false;
        }
        if extensions.server_names().is_some() {
            link.negotiated.server_name = link.config.server_name().map(str::to_string);
        }
        Ok(())
    }

    fn handle_certificate_verify(
        &mut self,
        link: &mut Link<'_>,
        scheme: SignatureScheme,
        signature: &[u8],
    ) -> Result<()> {
        if !scheme.allowed_in_tls13() {
            return Err(Error::IllegalParameter(format!(
                "{:?} is not allowed in TLS 1.3",
                scheme
            )));
        }
        let key = self
            .server_key
            .as_ref()
            .ok_or_else(|| missing("server certificate"))?;
        let transcript_hash =
            link.transcript
                .hash_partial(link.provider(), self.suite()?.hash, 1, &[])?;
        identity::verify_signature(
            link.provider(),
            key,
            scheme,
            &link.config.signature_schemes,
            &certificate_verify_input(Role::Server, &transcript_hash),
            signature,
        )
    }

    fn handle_finished(&mut self, link: &mut Link<'_>, received: &[u8]) -> Result<()> {
        let provider = link.provider();
        let suite = self.suite()?;
        let server_secret = self
            .server_handshake_secret
            .as_ref()
            .ok_or_else(|| missing("server handshake secret"))?;
        let before = link.transcript.hash_partial(provider, suite.hash, 1, &[])?;
        if !schedule::verify_finished(provider, suite.hash, server_secret, &before, received)? {
            return Err(Error::DecryptError("server Finished does not verify".into()));
        }

        let key_schedule = self.schedule.as_mut().ok_or_else(|| missing("key schedule"))?;
        key_schedule.input_master_secret(provider)?;
        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let (client_app, server_app) =
            key_schedule.application_traffic_secrets(provider, &transcript_hash)?;
        let protection = link.tls13_protection(suite, &server_app)?;
        link.record.activate_read(protection);

        let client_secret = self
            .client_handshake_secret
            .clone()
            .ok_or_else(|| missing("client handshake secret"))?;
        if self.facts.early_data_accepted {
            let message = HandshakeMessage::EndOfEarlyData;
            self.machine.sent(Event::of(&message), &self.facts)?;
            link.send_handshake_message(&message)?;
            let protection = link.tls13_protection(suite, &client_secret)?;
            link.record.activate_write(protection);
            self.early_data_sent = false;
        }
        if self.facts.certificate_requested {
            let message = HandshakeMessage::Certificate(Certificate {
                request_context: Some(self.certificate_context.clone()),
                entries: Vec::new(),
            });
            self.machine.sent(Event::of(&message), &self.facts)?;
            link.send_handshake_message(&message)?;
        }

        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let verify_data =
            schedule::finished_verify_data(provider, suite.hash, &client_secret, &transcript_hash)?;
        let message = HandshakeMessage::Finished(verify_data);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        let protection = link.tls13_protection(suite, &client_app)?;
        link.record.activate_write(protection);

        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let key_schedule = self.schedule.as_ref().ok_or_else(|| missing("key schedule"))?;
        self.resumption_master_secret =
            Some(key_schedule.resumption_master_secret(provider, &transcript_hash)?);
        self.client_traffic_secret = Some(client_app);
        self.server_traffic_secret = Some(server_app);
        self.client_handshake_secret = None;
        self.server_handshake_secret = None;

        self.machine.transition(Client13State::Connected, &self.facts)?;
        tracing::info!(
            suite = suite.name,
            resumed = self.facts.psk_accepted,
            early_data = self.facts.early_data_accepted,
            "TLS 1.3 handshake complete"
        );
        Ok(())
    }

    fn handle_new_session_ticket(&mut self, link: &mut Link<'_>, ticket: &NewSessionTicket) -> Result<()> {
        let suite = self.suite()?;
        let name = link.config.server_name();
        if let (true, Some(cache), Some(name), false) = (
            link.config.enable_session_resumption,
            link.sessions,
            name,
            ticket.lifetime == 0,
        ) {
            let resumption_master_secret = self
                .resumption_master_secret
                .as_ref()
                .ok_or_else(|| missing("resumption master secret"))?;
            let psk = schedule::resumption_psk(
                link.provider(),
                suite.hash,
                resumption_master_secret,
                &ticket.nonce,
            )?;
            cache.put(
                SessionKey::ServerName(name.to_string()),
                CachedSession::Ticket(Ticket {
                    server_names: vec![name.to_string()],
                    identity: ticket.ticket.clone(),
                    nonce: ticket.nonce.clone(),
                    lifetime: ticket.lifetime.min(MAX_TICKET_LIFETIME),
                    age_add: ticket.age_add,
                    psk,
                    hash: suite.hash,
                    suite: suite.suite,
                    max_early_data_size: ticket.max_early_data_size(),
                    created: Instant::now(),
                }),
            );
            tracing::debug!(server_name = name, lifetime = ticket.lifetime, "ticket stored");
        }
        self.machine.transition(Client13State::Connected, &self.facts)?;
        Ok(())
    }

    fn handle_key_update(&mut self, link: &mut Link<'_>, update_requested: bool) -> Result<()> {
        if !self.machine.is_connected() {
            return Err(Error::UnexpectedMessage("KeyUpdate during the handshake".into()));
        }
        let suite = self.suite()?;
        let current = self
            .server_traffic_secret
            .as_ref()
            .ok_or_else(|| missing("server traffic secret"))?;
        let next = schedule::next_traffic_secret(link.provider(), suite.hash, current)?;
        let protection = link.tls13_protection(suite, &next)?;
        link.record.activate_read(protection);
        self.server_traffic_secret = Some(next);
        tracing::debug!(update_requested, "peer updated its keys");
        if update_requested {
            self.update_keys(link, false)?;
        }
        Ok(())
    }

    fn fallback(&mut self, link: &mut Link<'_>) -> Result<Step> {
        if self.retried || !link.config.supports(ProtocolVersion::Tls12) {
            return Err(Error::ProtocolVersion(
                "server did not select TLS 1.3".into(),
            ));
        }
        let hello = self.hello.take().ok_or_else(|| missing("ClientHello"))?;
        if self.early_data_sent {
            link.record.reset();
        }
        tracing::debug!("server selected TLS 1.2");
        let handler = Client12Handler::after_fallback(&hello, self.cached_session.take())?;
        Ok(Step::Fallback(Box::new(handler)))
    }
}

impl ProtocolHandler for Client13Handler {
    fn role(&self) -> Role {
        Role::Client
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Tls13
    }

    fn state_name(&self) -> String {
        format!("{:?}", self.machine.state())
    }

    fn start(&mut self, link: &mut Link<'_>) -> Result<()> {
        self.send_client_hello(link)
    }

    fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            tls13: true,
            key_exchange: None,
        }
    }

    fn handle_message(
        &mut self,
        link: &mut Link<'_>,
        message: &HandshakeMessage,
        _raw: &[u8],
    ) -> Result<Step> {
        if let HandshakeMessage::KeyUpdate { update_requested } = message {
            self.handle_key_update(link, *update_requested)?;
            return Ok(Step::Continue);
        }
        if let HandshakeMessage::ServerHello(hello) = message {
            if hello.extensions.supported_versions().is_none() {
                return self.fallback(link);
            }
        }
        self.machine.received(Event::of(message), &self.facts)?;
        match message {
            HandshakeMessage::HelloRetryRequest(retry) => {
                self.handle_hello_retry_request(link, retry)?
            },
            HandshakeMessage::ServerHello(hello) => {
                if hello.extensions.supported_versions()
                    != Some(&SupportedVersions::Selected(ProtocolVersion::Tls13))
                {
                    return Err(Error::IllegalParameter(
                        "supported_versions does not select TLS 1.3".into(),
                    ));
                }
                self.handle_server_hello(link, hello)?
            },
            HandshakeMessage::EncryptedExtensions(extensions) => {
                self.handle_encrypted_extensions(link, extensions)?
            },
            HandshakeMessage::CertificateRequest(CertificateRequest::Tls13 { context, .. }) => {
                tracing::debug!("server requested a client certificate, an empty one will be sent");
                self.facts.certificate_requested = true;
                self.certificate_context = context.clone();
            },
            HandshakeMessage::Certificate(certificate) => {
                let chain = certificate.chain();
                let leaf = chain
                    .first()
                    .ok_or_else(|| Error::BadCertificate("server sent no certificate".into()))?;
                self.server_key = Some(x509::certificate_key(leaf)?);
                link.negotiated.peer_certificates = chain;
            },
            HandshakeMessage::CertificateVerify { scheme, signature } => {
                self.handle_certificate_verify(link, *scheme, signature)?
            },
            HandshakeMessage::Finished(verify_data) => self.handle_finished(link, verify_data)?,
            HandshakeMessage::NewSessionTicket(ticket) => {
                self.handle_new_session_ticket(link, ticket)?
            },
            other => {
                return Err(Error::UnexpectedMessage(format!(
                    "{} in a TLS 1.3 client handshake",
                    other.name()
                )))
            },
        }
        Ok(Step::Continue)
    }

    fn handle_change_cipher_spec(&mut self, _link: &mut Link<'_>) -> Result<()> {
        if self.machine.is_connected() {
            return Err(Error::UnexpectedMessage(
                "ChangeCipherSpec after the handshake".into(),
            ));
        }
        tracing::trace!("compatibility ChangeCipherSpec ignored");
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

    fn update_keys(&mut self, link: &mut Link<'_>, request_peer: bool) -> Result<()> {
        if !self.machine.is_connected() {
            return Err(Error::InvalidConfig("KeyUpdate needs an established connection".into()));
        }
        let suite = self.suite()?;
        link.send_untracked(&HandshakeMessage::KeyUpdate {
            update_requested: request_peer,
        })?;
        let current = self
            .client_traffic_secret
            .as_ref()
            .ok_or_else(|| missing("client traffic secret"))?;
        let next = schedule::next_traffic_secret(link.provider(), suite.hash, current)?;
        let protection = link.tls13_protection(suite, &next)?;
        link.record.activate_write(protection);
        self.client_traffic_secret = Some(next);
        tracing::debug!(request_peer, "write keys updated");
        Ok(())
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.facts = Facts::default();
        self.schedule = None;
        self.psk_schedule = None;
        self.share = None;
        self.client_handshake_secret = None;
        self.server_handshake_secret = None;
        self.client_traffic_secret = None;
        self.server_traffic_secret = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handler_is_idle() {
        let handler = Client13Handler::new();
        assert_eq!(handler.machine.state(), Client13State::Idle);
        assert!(!handler.is_connected());
        assert!(handler.decode_context().tls13);
    }

    #[test]
    fn test_compatibility_ccs_ignored_before_connected() {
        use crate::config::Config;
        use crate::handler::Negotiated;
        use crate::record::RecordLayer;
        use crate::transcript::Transcript;
        use std::sync::Arc;
        use weft_crypto_rustcrypto::RustCryptoProvider;

        let config = Config::builder(Arc::new(RustCryptoProvider::default()))
            .build()
            .unwrap();
        let mut record = RecordLayer::new();
        let mut transcript = Transcript::new();
        let mut transport = std::io::Cursor::new(Vec::new());
        let mut negotiated = Negotiated::default();
        let mut early = Vec::new();
        let mut link = Link {
            config: &config,
            record: &mut record,
            transcript: &mut transcript,
            transport: &mut transport,
            sessions: None,
            negotiated: &mut negotiated,
            early_data: &mut early,
        };
        let mut handler = Client13Handler::new();
        handler.handle_change_cipher_spec(&mut link).unwrap();
    }

    #[test]
    fn test_certificate_request_recorded() {
        use crate::config::Config;
        use crate::extensions::Extensions;
        use crate::handler::Negotiated;
        use crate::record::RecordLayer;
        use crate::transcript::Transcript;
        use std::sync::Arc;
        use weft_crypto_rustcrypto::RustCryptoProvider;

        let config = Config::builder(Arc::new(RustCryptoProvider::default()))
            .build()
            .unwrap();
        let mut record = RecordLayer::new();
        let mut transcript = Transcript::new();
        let mut transport = std::io::Cursor::new(Vec::new());
        let mut negotiated = Negotiated::default();
        let mut early = Vec::new();
        let mut link = Link {
            config: &config,
            record: &mut record,
            transcript: &mut transcript,
            transport: &mut transport,
            sessions: None,
            negotiated: &mut negotiated,
            early_data: &mut early,
        };
        let mut handler = Client13Handler::new();
        for state in [
            Client13State::ClientHelloSent,
            Client13State::ServerHelloReceived,
            Client13State::EncryptedExtensionsReceived,
        ] {
            handler.machine.transition(state, &handler.facts).unwrap();
        }

        let request = HandshakeMessage::CertificateRequest(CertificateRequest::Tls13 {
            context: vec![9, 9],
            extensions: Extensions::default(),
        });
        handler.handle_message(&mut link, &request, &[]).unwrap();
        assert!(handler.facts.certificate_requested);
        assert_eq!(handler.certificate_context, vec![9, 9]);
        assert_eq!(handler.machine.state(), Client13State::CertificateRequestReceived);
    }
}
