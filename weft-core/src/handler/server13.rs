//! TLS 1.3 server handshake.
//!
//! The whole server flight is produced in answer to the ClientHello:
//! ServerHello, then under the handshake keys EncryptedExtensions,
//! Certificate and CertificateVerify (full handshakes only) and Finished.
//! A ClientHello without a usable key share is answered with a
//! HelloRetryRequest carrying a cookie; a ClientHello that does not offer
//! TLS 1.3 is handed to the TLS 1.2 server when that version is enabled.

use std::time::Instant;

use crate::cipher::CipherSuiteDescriptor;
use crate::error::{Error, Result};
use crate::extensions::{
    Extension, Extensions, KeyShare, KeyShareEntry, PreSharedKey, PskOffer, SupportedVersions,
};
use crate::handler::{
    certificate_verify_input, Ephemeral, Link, ProtocolHandler, Server12Handler, Step,
};
use crate::key_schedule::tls13::{self as schedule, KeySchedule};
use crate::key_schedule::Secret;
use crate::messages::{
    Certificate, ClientHello, DecodeContext, HandshakeMessage, HelloRetryRequest,
    NewSessionTicket, ServerHello,
};
use crate::protocol::{
    HandshakeType, NamedGroup, ProtocolVersion, PskKeyExchangeMode, Role, SignatureScheme,
    MAX_FRAGMENT_LEN,
};
use crate::session::{CachedSession, SessionKey, Ticket};
use crate::state_machine::{Event, Facts, Machine, Server13State};

const COOKIE_LEN: usize = 32;
const TICKET_IDENTITY_LEN: usize = 32;

pub(crate) struct Server13Handler {
    machine: Machine<Server13State>,
    facts: Facts,
    suite: Option<&'static CipherSuiteDescriptor>,
    retried: bool,
    cookie: Vec<u8>,
    schedule: Option<KeySchedule>,
    client_handshake_secret: Option<Secret>,
    client_traffic_secret: Option<Secret>,
    server_traffic_secret: Option<Secret>,
    early_data_limit: Option<usize>,
    tickets_issued: u8,
}

/// A ticket the client presented that passed every check but the binder.
struct PskCandidate {
    index: usize,
    ticket: Ticket,
    mode: PskKeyExchangeMode,
    binder: Vec<u8>,
    offer: PskOffer,
}

fn missing(what: &'static str) -> Error {
    Error::Internal(format!("{} not available yet", what))
}

/// Early data budget to skip: the payload plus a record's worth of AEAD
/// and padding overhead per full fragment.
fn skip_budget(max_early_data: usize) -> usize {
    max_early_data + 256 * (max_early_data / MAX_FRAGMENT_LEN + 1)
}

impl Server13Handler {
    pub(crate) fn new() -> Self {
        Self {
            machine: Machine::new(),
            facts: Facts::default(),
            suite: None,
            retried: false,
            cookie: Vec::new(),
            schedule: None,
            client_handshake_secret: None,
            client_traffic_secret: None,
            server_traffic_secret: None,
            early_data_limit: None,
            tickets_issued: 0,
        }
    }

    fn suite(&self) -> Result<&'static CipherSuiteDescriptor> {
        self.suite.ok_or_else(|| missing("cipher suite"))
    }

    fn select_suite(&self, link: &Link<'_>, hello: &ClientHello) -> Result<&'static CipherSuiteDescriptor> {
        let chosen = link
            .config
            .suites_for(ProtocolVersion::Tls13)
            .find(|d| hello.cipher_suites.contains(&d.suite))
            .ok_or_else(|| Error::HandshakeFailure("no TLS 1.3 cipher suite in common".into()))?;
        match self.suite {
            Some(previous) if self.retried => {
                if hello.cipher_suites.contains(&previous.suite) {
                    Ok(previous)
                } else {
                    Err(Error::IllegalParameter(
                        "second ClientHello dropped the retried suite".into(),
                    ))
                }
            },
            _ => Ok(chosen),
        }
    }

    /// Offered tickets that are known, alive, plausibly aged and made for
    /// the selected suite's hash, in the client's order. Binders are not
    /// checked here.
    fn find_psks(
        &self,
        link: &Link<'_>,
        hello: &ClientHello,
        suite: &CipherSuiteDescriptor,
    ) -> Vec<PskCandidate> {
        let (Some(cache), true) = (link.sessions, link.config.enable_session_resumption) else {
            return Vec::new();
        };
        let Some(PreSharedKey::Offer(offer)) = hello.extensions.pre_shared_key() else {
            return Vec::new();
        };
        let Some(offered_modes) = hello.extensions.psk_modes() else {
            return Vec::new();
        };
        let Some(mode) = link
            .config
            .psk_modes
            .iter()
            .copied()
            .find(|m| offered_modes.contains(m))
        else {
            return Vec::new();
        };
        let client_names = hello.extensions.server_names();
        let now = Instant::now();

        offer.identities.iter().enumerate().filter_map(|(index, identity)| {
            let key = SessionKey::TicketIdentity(identity.identity.clone());
            let ticket = cache.get(&key)?.as_ticket()?.clone();
            let name_matches = match client_names {
                Some(names) => names.iter().any(|n| ticket.server_names.contains(n)),
                None => true,
            };
            let usable = ticket.is_valid(now)
                && ticket.age_is_plausible(identity.obfuscated_ticket_age, now)
                && ticket.hash == suite.hash
                && name_matches;
            if !usable {
                tracing::debug!(index, "ticket not usable");
                return None;
            }
            Some(PskCandidate {
                index,
                ticket,
                mode,
                binder: offer.binders.get(index)?.clone(),
                offer: offer.clone(),
            })
        })
        .collect()
    }

    /// Key schedule of the first candidate whose binder verifies. A binder
    /// that does not verify only disqualifies its own identity.
    fn accept_psk<'c>(
        &self,
        link: &Link<'_>,
        raw: &[u8],
        suite: &CipherSuiteDescriptor,
        candidates: &'c [PskCandidate],
    ) -> Result<Option<(&'c PskCandidate, KeySchedule)>> {
        for candidate in candidates {
            match self.verify_binder(link, raw, suite, candidate) {
                Ok(key_schedule) => return Ok(Some((candidate, key_schedule))),
                Err(Error::DecryptError(reason)) => {
                    tracing::debug!(index = candidate.index, %reason, "PSK identity skipped");
                },
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn verify_binder(
        &self,
        link: &Link<'_>,
        raw: &[u8],
        suite: &CipherSuiteDescriptor,
        candidate: &PskCandidate,
    ) -> Result<KeySchedule> {
        let provider = link.provider();
        let truncated = candidate.offer.truncate(raw)?;
        let transcript_hash = link.transcript.hash_partial(provider, suite.hash, 1, truncated)?;
        let key_schedule =
            KeySchedule::new(provider, suite.hash, Some(candidate.ticket.psk.as_bytes()))?;
        let binder_key = key_schedule.binder_key(provider)?;
        if !schedule::verify_finished(
            provider,
            suite.hash,
            &binder_key,
            &transcript_hash,
            &candidate.binder,
        )? {
            return Err(Error::DecryptError("PSK binder does not verify".into()));
        }
        Ok(key_schedule)
    }

    /// Our most preferred group the client supports, and the client's share
    /// for it if one was sent.
    fn select_group<'h>(
        &self,
        link: &Link<'_>,
        hello: &'h ClientHello,
    ) -> Option<(NamedGroup, Option<&'h KeyShareEntry>)> {
        let shares: &[KeyShareEntry] = match hello.extensions.key_share() {
            Some(KeyShare::ClientShares(shares)) => shares,
            _ => &[],
        };
        let client_groups = hello.extensions.supported_groups().unwrap_or(&[]);
        let ours = || {
            link.config
                .supported_groups
                .iter()
                .copied()
                .filter(|g| g.key_exchange_algorithm().is_some())
        };
        if let Some((group, share)) = ours().find_map(|g| {
            shares
                .iter()
                .find(|s| s.group == g)
                .map(|share| (g, share))
        }) {
            return Some((group, Some(share)));
        }
        ours()
            .find(|g| client_groups.contains(g))
            .map(|g| (g, None))
    }

    fn send_hello_retry_request(
        &mut self,
        link: &mut Link<'_>,
        hello: &ClientHello,
        suite: &'static CipherSuiteDescriptor,
        group: NamedGroup,
    ) -> Result<()> {
        self.cookie = link.random_vec(COOKIE_LEN)?;
        let mut extensions = Extensions::new();
        extensions.push(Extension::SupportedVersions(SupportedVersions::Selected(
            ProtocolVersion::Tls13,
        )));
        extensions.push(Extension::KeyShare(KeyShare::RetryGroup(group)));
        extensions.push(Extension::Cookie(self.cookie.clone()));
        let message = HandshakeMessage::HelloRetryRequest(HelloRetryRequest {
            session_id: hello.session_id.clone(),
            cipher_suite: suite.suite,
            extensions,
        });

        let provider = link.provider();
        link.transcript.collapse_client_hello(provider, suite.hash)?;
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        if hello.extensions.early_data().is_some() {
            link.record
                .skip_undecryptable(skip_budget(link.config.early_data.max_size() as usize));
        }
        tracing::debug!(group = ?group, "HelloRetryRequest sent");
        self.suite = Some(suite);
        self.retried = true;
        Ok(())
    }

    fn handle_client_hello(
        &mut self,
        link: &mut Link<'_>,
        hello: &ClientHello,
        raw: &[u8],
    ) -> Result<Step> {
        let offers_tls13 = matches!(
            hello.extensions.supported_versions(),
            Some(SupportedVersions::Offered(versions)) if versions.contains(&ProtocolVersion::Tls13)
        );
        if !offers_tls13 {
            if !self.retried && link.config.supports(ProtocolVersion::Tls12) {
                tracing::debug!("client does not offer TLS 1.3");
                return Ok(Step::Fallback(Box::new(Server12Handler::new())));
            }
            return Err(Error::ProtocolVersion("client does not offer TLS 1.3".into()));
        }
        self.machine
            .received(Event::Handshake(HandshakeType::ClientHello), &self.facts)?;

        if hello.compression_methods != [0] {
            return Err(Error::IllegalParameter(
                "TLS 1.3 requires null compression only".into(),
            ));
        }
        if self.retried && hello.extensions.cookie() != Some(self.cookie.as_slice()) {
            return Err(Error::IllegalParameter("cookie not echoed".into()));
        }
        let provider = link.provider();
        let suite = self.select_suite(link, hello)?;

        let candidates = self.find_psks(link, hello, suite);
        let (accepted_psk, psk_schedule) = match self.accept_psk(link, raw, suite, &candidates)? {
            Some((candidate, key_schedule)) => (Some(candidate), Some(key_schedule)),
            None => (None, None),
        };
        if accepted_psk.is_none() && hello.extensions.pre_shared_key().is_some() {
            tracing::debug!("no offered PSK is usable, full handshake");
        }
        let needs_share = accepted_psk.map_or(true, |c| c.mode == PskKeyExchangeMode::PskDheKe);
        let group = if needs_share {
            let (group, share) = self
                .select_group(link, hello)
                .ok_or_else(|| Error::HandshakeFailure("no key exchange group in common".into()))?;
            match share {
                Some(share) => Some((group, share.key_exchange.clone())),
                None if !self.retried => {
                    self.send_hello_retry_request(link, hello, suite, group)?;
                    return Ok(Step::Continue);
                },
                None => {
                    return Err(Error::IllegalParameter(
                        "second ClientHello lacks the requested key share".into(),
                    ))
                },
            }
        } else {
            None
        };

        // Tickets are single use.
        if let (Some(candidate), Some(cache)) = (accepted_psk, link.sessions) {
            cache.remove(&SessionKey::TicketIdentity(candidate.ticket.identity.clone()));
        }
        let mut key_schedule = match psk_schedule {
            Some(key_schedule) => key_schedule,
            None => KeySchedule::new(provider, suite.hash, None)?,
        };
        self.facts.psk_accepted = accepted_psk.is_some();

        let scheme = match accepted_psk {
            Some(_) => None,
            None => Some(self.choose_scheme(link, hello)?),
        };

        let early_offered = hello.extensions.early_data().is_some();
        let early_limit = accepted_psk
            .filter(|c| early_offered && c.index == 0 && !self.retried && c.ticket.suite == suite.suite)
            .map(|c| c.ticket.max_early_data_size.min(link.config.early_data.max_size()))
            .filter(|&limit| limit > 0);
        self.facts.early_data_accepted = early_limit.is_some();
        let early_secret = match early_limit {
            Some(_) => {
                let client_hello_hash = link.transcript.hash(provider, suite.hash)?;
                Some(key_schedule.client_early_traffic_secret(provider, &client_hello_hash)?)
            },
            None => None,
        };

        let mut server_hello = ServerHello::new(
            ProtocolVersion::Tls12,
            link.random()?,
            hello.session_id.clone(),
            suite.suite,
        );
        server_hello
            .extensions
            .push(Extension::SupportedVersions(SupportedVersions::Selected(ProtocolVersion::Tls13)));
        let shared = match &group {
            Some((group, client_share)) => {
                let ephemeral = Ephemeral::generate(provider, *group)?;
                let shared = ephemeral.agree(client_share)?;
                server_hello
                    .extensions
                    .push(Extension::KeyShare(KeyShare::ServerShare(KeyShareEntry {
                        group: *group,
                        key_exchange: ephemeral.public.clone(),
                    })));
                Some(shared)
            },
            None => None,
        };
        if let Some(candidate) = accepted_psk {
            server_hello
                .extensions
                .push(Extension::PreSharedKey(PreSharedKey::Selected(candidate.index as u16)));
        }
        let message = HandshakeMessage::ServerHello(server_hello);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        key_schedule.input_handshake_secret(provider, shared.as_ref().map(|s| s.as_bytes()))?;
        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let (client_secret, server_secret) =
            key_schedule.handshake_traffic_secrets(provider, &transcript_hash)?;
        let protection = link.tls13_protection(suite, &server_secret)?;
        link.record.activate_write(protection);
        let protection = link.tls13_protection(suite, early_secret.as_ref().unwrap_or(&client_secret))?;
        link.record.activate_read(protection);
        if early_offered && early_limit.is_none() {
            let advertised = candidates
                .iter()
                .map(|c| c.ticket.max_early_data_size)
                .fold(link.config.early_data.max_size(), u32::max);
            link.record.skip_undecryptable(skip_budget(advertised as usize));
            tracing::debug!("early data rejected");
        }

        let mut extensions = Extensions::new();
        if hello.extensions.server_names().is_some() && !link.config.server_names.is_empty() {
            extensions.push(Extension::ServerName(Vec::new()));
        }
        if early_limit.is_some() {
            extensions.push(Extension::EarlyData(None));
        }
        let message = HandshakeMessage::EncryptedExtensions(extensions);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        if let Some(scheme) = scheme {
            self.send_certificate(link, suite, scheme)?;
        }

        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let verify_data =
            schedule::finished_verify_data(provider, suite.hash, &server_secret, &transcript_hash)?;
        let message = HandshakeMessage::Finished(verify_data);
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        key_schedule.input_master_secret(provider)?;
        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let (client_app, server_app) =
            key_schedule.application_traffic_secrets(provider, &transcript_hash)?;
        let protection = link.tls13_protection(suite, &server_app)?;
        link.record.activate_write(protection);

        link.negotiated.version = Some(ProtocolVersion::Tls13);
        link.negotiated.suite = Some(suite.suite);
        link.negotiated.resumed = self.facts.psk_accepted;
        link.negotiated.early_data_accepted = self.facts.early_data_accepted;
        link.negotiated.server_name = hello
            .extensions
            .server_names()
            .and_then(|names| names.first().cloned());

        self.suite = Some(suite);
        self.schedule = Some(key_schedule);
        self.client_handshake_secret = Some(client_secret);
        self.client_traffic_secret = Some(client_app);
        self.server_traffic_secret = Some(server_app);
        self.early_data_limit = early_limit.map(|l| l as usize);
        tracing::debug!(
            suite = suite.name,
            psk = self.facts.psk_accepted,
            early_data = self.facts.early_data_accepted,
            "server flight sent"
        );
        Ok(Step::Continue)
    }

    fn choose_scheme(&self, link: &Link<'_>, hello: &ClientHello) -> Result<SignatureScheme> {
        let identity = link
            .config
            .identity
            .as_ref()
            .ok_or_else(|| Error::HandshakeFailure("no certificate configured".into()))?;
        identity
            .choose_scheme(hello.extensions.signature_algorithms(), true)
            .ok_or_else(|| Error::HandshakeFailure("no signature scheme in common".into()))
    }

    fn send_certificate(
        &mut self,
        link: &mut Link<'_>,
        suite: &CipherSuiteDescriptor,
        scheme: SignatureScheme,
    ) -> Result<()> {
        let provider = link.provider();
        let identity = link
            .config
            .identity
            .as_ref()
            .ok_or_else(|| Error::HandshakeFailure("no certificate configured".into()))?;
        let message = HandshakeMessage::Certificate(Certificate::tls13(identity.chain()));
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;

        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let signature = identity.sign(
            provider,
            scheme,
            &certificate_verify_input(Role::Server, &transcript_hash),
        )?;
        let message = HandshakeMessage::CertificateVerify { scheme, signature };
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_handshake_message(&message)?;
        Ok(())
    }

    fn handle_end_of_early_data(&mut self, link: &mut Link<'_>) -> Result<()> {
        let secret = self
            .client_handshake_secret
            .as_ref()
            .ok_or_else(|| missing("client handshake secret"))?;
        let protection = link.tls13_protection(self.suite()?, secret)?;
        link.record.activate_read(protection);
        self.early_data_limit = None;
        tracing::debug!("end of early data");
        Ok(())
    }

    fn handle_finished(&mut self, link: &mut Link<'_>, received: &[u8]) -> Result<()> {
        let provider = link.provider();
        let suite = self.suite()?;
        let client_secret = self
            .client_handshake_secret
            .as_ref()
            .ok_or_else(|| missing("client handshake secret"))?;
        let before = link.transcript.hash_partial(provider, suite.hash, 1, &[])?;
        if !schedule::verify_finished(provider, suite.hash, client_secret, &before, received)? {
            return Err(Error::DecryptError("client Finished does not verify".into()));
        }
        let client_app = self
            .client_traffic_secret
            .as_ref()
            .ok_or_else(|| missing("client traffic secret"))?;
        let protection = link.tls13_protection(suite, client_app)?;
        link.record.activate_read(protection);
        self.client_handshake_secret = None;
        self.early_data_limit = None;

        let transcript_hash = link.transcript.hash(provider, suite.hash)?;
        let key_schedule = self.schedule.as_ref().ok_or_else(|| missing("key schedule"))?;
        let resumption_master_secret =
            key_schedule.resumption_master_secret(provider, &transcript_hash)?;

        let issue_ticket = link.config.enable_session_resumption
            && link.sessions.is_some()
            && !link.config.server_names.is_empty()
            && link.config.ticket_lifetime > 0;
        if issue_ticket {
            self.send_ticket(link, suite, &resumption_master_secret)?;
        }
        self.machine.transition(Server13State::Connected, &self.facts)?;
        tracing::info!(
            suite = suite.name,
            resumed = self.facts.psk_accepted,
            early_data = self.facts.early_data_accepted,
            "TLS 1.3 handshake complete"
        );
        Ok(())
    }

    fn send_ticket(
        &mut self,
        link: &mut Link<'_>,
        suite: &CipherSuiteDescriptor,
        resumption_master_secret: &Secret,
    ) -> Result<()> {
        let provider = link.provider();
        let nonce = vec![self.tickets_issued];
        self.tickets_issued = self.tickets_issued.wrapping_add(1);
        let identity = link.random_vec(TICKET_IDENTITY_LEN)?;
        let random = link.random()?;
        let age_add = u32::from_be_bytes([random[0], random[1], random[2], random[3]]);
        let max_early_data = link.config.early_data.max_size();

        let mut extensions = Extensions::new();
        if max_early_data > 0 {
            extensions.push(Extension::EarlyData(Some(max_early_data)));
        }
        let message = HandshakeMessage::NewSessionTicket(NewSessionTicket {
            lifetime: link.config.ticket_lifetime,
            age_add,
            nonce: nonce.clone(),
            ticket: identity.clone(),
            extensions,
        });
        self.machine.sent(Event::of(&message), &self.facts)?;
        link.send_untracked(&message)?;

        let psk = schedule::resumption_psk(provider, suite.hash, resumption_master_secret, &nonce)?;
        if let Some(cache) = link.sessions {
            cache.put(
                SessionKey::TicketIdentity(identity.clone()),
                CachedSession::Ticket(Ticket {
                    server_names: link.config.server_names.clone(),
                    identity,
                    nonce,
                    lifetime: link.config.ticket_lifetime,
                    age_add,
                    psk,
                    hash: suite.hash,
                    suite: suite.suite,
                    max_early_data_size: max_early_data,
                    created: Instant::now(),
                }),
            );
        }
        tracing::debug!(lifetime = link.config.ticket_lifetime, "ticket issued");
        Ok(())
    }

    fn handle_key_update(&mut self, link: &mut Link<'_>, update_requested: bool) -> Result<()> {
        if !self.machine.is_connected() {
            return Err(Error::UnexpectedMessage("KeyUpdate during the handshake".into()));
        }
        let suite = self.suite()?;
        let current = self
            .client_traffic_secret
            .as_ref()
            .ok_or_else(|| missing("client traffic secret"))?;
        let next = schedule::next_traffic_secret(link.provider(), suite.hash, current)?;
        let protection = link.tls13_protection(suite, &next)?;
        link.record.activate_read(protection);
        self.client_traffic_secret = Some(next);
        tracing::debug!(update_requested, "peer updated its keys");
        if update_requested {
            self.update_keys(link, false)?;
        }
        Ok(())
    }
}

impl ProtocolHandler for Server13Handler {
    fn role(&self) -> Role {
        Role::Server
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Tls13
    }

    fn state_name(&self) -> String {
        format!("{:?}", self.machine.state())
    }

    fn start(&mut self, _link: &mut Link<'_>) -> Result<()> {
        Ok(())
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
        raw: &[u8],
    ) -> Result<Step> {
        match message {
            HandshakeMessage::ClientHello(hello) => self.handle_client_hello(link, hello, raw),
            HandshakeMessage::KeyUpdate { update_requested } => {
                self.handle_key_update(link, *update_requested)?;
                Ok(Step::Continue)
            },
            other => {
                self.machine.received(Event::of(other), &self.facts)?;
                match other {
                    HandshakeMessage::EndOfEarlyData => self.handle_end_of_early_data(link)?,
                    HandshakeMessage::Finished(verify_data) => {
                        self.handle_finished(link, verify_data)?
                    },
                    _ => {
                        return Err(Error::UnexpectedMessage(format!(
                            "{} in a TLS 1.3 server handshake",
                            other.name()
                        )))
                    },
                }
                Ok(Step::Continue)
            },
        }
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

    fn early_data_limit(&self) -> Option<usize> {
        self.early_data_limit
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
            .server_traffic_secret
            .as_ref()
            .ok_or_else(|| missing("server traffic secret"))?;
        let next = schedule::next_traffic_secret(link.provider(), suite.hash, current)?;
        let protection = link.tls13_protection(suite, &next)?;
        link.record.activate_write(protection);
        self.server_traffic_secret = Some(next);
        tracing::debug!(request_peer, "write keys updated");
        Ok(())
    }

    fn reset(&mut self) {
        self.machine.reset();
        self.facts = Facts::default();
        self.schedule = None;
        self.client_handshake_secret = None;
        self.client_traffic_secret = None;
        self.server_traffic_secret = None;
        self.early_data_limit = None;
    }
}
