//! A TLS connection over a blocking transport.
//!
//! [`Connection`] owns everything one handshake needs: the configuration,
//! the record layer, the transcript and the active protocol handler. It
//! reads one record at a time, dispatches it by content type and, for
//! handshake messages, hands the decoded message to the handler together
//! with a [`Link`] to its own state.
//!
//! Version fallback replaces the handler in place; the transcript and the
//! record layer are kept.
//!
//! ```no_run
//! use std::net::TcpStream;
//! use std::sync::Arc;
//! use weft_core::{Config, Connection};
//! use weft_crypto_rustcrypto::RustCryptoProvider;
//!
//! # fn main() -> weft_core::Result<()> {
//! let config = Config::builder(Arc::new(RustCryptoProvider::default()))
//!     .with_server_name("example.com")
//!     .build()?;
//! let stream = TcpStream::connect("example.com:443")?;
//! let mut conn = Connection::client(Arc::new(config), stream);
//! conn.connect()?;
//! conn.write_application_data(b"GET / HTTP/1.0\r\n\r\n")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::alert::Alert;
use crate::cipher::CipherSuite;
use crate::config::Config;
use crate::error::{AlertDescription, Error, Result};
use crate::handler::{
    Client12Handler, Client13Handler, Link, Negotiated, ProtocolHandler, Server12Handler,
    Server13Handler, Step,
};
use crate::messages::{HandshakeFrame, HandshakeMessage};
use crate::protocol::{ContentType, HandshakeType, ProtocolVersion, Role};
use crate::record::RecordLayer;
use crate::session::SessionCache;
use crate::transcript::Transcript;
use crate::transport::Transport;

/// What [`Connection::receive_next_message`] processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    /// A handshake message of this type
    Handshake(HandshakeType),
    /// A ChangeCipherSpec record
    ChangeCipherSpec,
    /// A warning alert other than close_notify
    Alert(Alert),
    /// Application data, now buffered for reading
    ApplicationData(usize),
    /// 0-RTT data, buffered for [`Connection::take_early_data`]
    EarlyData(usize),
    /// The peer sent close_notify
    Closed,
}

/// The part of a connection a handler may touch.
struct Channel<T> {
    config: Arc<Config>,
    transport: T,
    record: RecordLayer,
    transcript: Transcript,
    sessions: Option<Arc<dyn SessionCache>>,
    negotiated: Negotiated,
    early_data: Vec<u8>,
}

impl<T: Transport> Channel<T> {
    fn link(&mut self) -> Link<'_> {
        Link {
            config: &self.config,
            record: &mut self.record,
            transcript: &mut self.transcript,
            transport: &mut self.transport,
            sessions: self.sessions.as_deref(),
            negotiated: &mut self.negotiated,
            early_data: &mut self.early_data,
        }
    }
}

/// One TLS 1.2 or TLS 1.3 connection, client or server.
pub struct Connection<T: Transport> {
    role: Role,
    handler: Box<dyn ProtocolHandler>,
    channel: Channel<T>,
    frame: HandshakeFrame,
    incoming: BytesMut,
    early_received: BytesMut,
    handshake_done: bool,
    close_sent: bool,
    peer_closed: bool,
    failed: Option<Error>,
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.handler.state_name())
            .field("negotiated", &self.channel.negotiated.version)
            .field("record", &self.channel.record)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Connection<T> {
    /// A client connection. Nothing is sent until [`connect`](Self::connect).
    pub fn client(config: Arc<Config>, transport: T) -> Self {
        let handler: Box<dyn ProtocolHandler> = if config.supports(ProtocolVersion::Tls13) {
            Box::new(Client13Handler::new())
        } else {
            Box::new(Client12Handler::new())
        };
        Self::new(Role::Client, handler, config, transport)
    }

    /// A server connection. Nothing is read until [`accept`](Self::accept).
    pub fn server(config: Arc<Config>, transport: T) -> Self {
        let handler: Box<dyn ProtocolHandler> = if config.supports(ProtocolVersion::Tls13) {
            Box::new(Server13Handler::new())
        } else {
            Box::new(Server12Handler::new())
        };
        Self::new(Role::Server, handler, config, transport)
    }

    fn new(role: Role, handler: Box<dyn ProtocolHandler>, config: Arc<Config>, transport: T) -> Self {
        let mut record = RecordLayer::new();
        record.set_max_fragment(config.max_record_size);
        Self {
            role,
            handler,
            channel: Channel {
                config,
                transport,
                record,
                transcript: Transcript::new(),
                sessions: None,
                negotiated: Negotiated::default(),
                early_data: Vec::new(),
            },
            frame: HandshakeFrame::new(),
            incoming: BytesMut::new(),
            early_received: BytesMut::new(),
            handshake_done: false,
            close_sent: false,
            peer_closed: false,
            failed: None,
        }
    }

    /// Share a session cache with other connections.
    pub fn with_session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.channel.sessions = Some(cache);
        self
    }

    /// Client: run the handshake to completion.
    pub fn connect(&mut self) -> Result<()> {
        if self.role != Role::Client {
            return Err(Error::InvalidConfig("connect() on a server connection".into()));
        }
        self.check_usable()?;
        let mut link = self.channel.link();
        if let Err(e) = self.handler.start(&mut link) {
            return Err(self.fail(e));
        }
        self.drive_handshake()
    }

    /// Server: run the handshake to completion.
    pub fn accept(&mut self) -> Result<()> {
        if self.role != Role::Server {
            return Err(Error::InvalidConfig("accept() on a client connection".into()));
        }
        self.check_usable()?;
        self.drive_handshake()
    }

    fn check_usable(&self) -> Result<()> {
        match &self.failed {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn drive_handshake(&mut self) -> Result<()> {
        while !self.handler.is_connected() {
            match self.receive_next_message()? {
                Incoming::Closed => return Err(self.fail(Error::ConnectionClosed)),
                Incoming::Alert(alert) if alert.description == AlertDescription::NoRenegotiation => {
                    return Err(self.fail(Error::HandshakeFailure(
                        "peer declined to renegotiate".into(),
                    )))
                },
                _ => {},
            }
        }
        Ok(())
    }

    /// Process exactly one handshake message or one non-handshake record.
    ///
    /// Blocks until the transport yields it. Any error is fatal: the
    /// matching alert is sent and the connection stays failed.
    pub fn receive_next_message(&mut self) -> Result<Incoming> {
        self.check_usable()?;
        match self.process_next() {
            Ok(incoming) => Ok(incoming),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn process_next(&mut self) -> Result<Incoming> {
        loop {
            if let Some(raw) = self.frame.pop()? {
                return self.dispatch_handshake(raw);
            }
            let record = self
                .channel
                .record
                .read_record(&mut self.channel.transport)?;
            match record.content_type {
                ContentType::Handshake => self.frame.push(&record.fragment),
                ContentType::ChangeCipherSpec => {
                    if record.fragment != [1] {
                        return Err(Error::decode("malformed ChangeCipherSpec"));
                    }
                    if !self.frame.is_empty() {
                        return Err(Error::UnexpectedMessage(
                            "ChangeCipherSpec inside a handshake message".into(),
                        ));
                    }
                    debug!(state = %self.handler.state_name(), "change_cipher_spec in");
                    let mut link = self.channel.link();
                    self.handler.handle_change_cipher_spec(&mut link)?;
                    return Ok(Incoming::ChangeCipherSpec);
                },
                ContentType::Alert => return self.dispatch_alert(&record.fragment),
                ContentType::ApplicationData => return self.dispatch_application_data(record.fragment),
            }
        }
    }

    fn dispatch_handshake(&mut self, raw: Vec<u8>) -> Result<Incoming> {
        let message = HandshakeMessage::decode(&raw, &self.handler.decode_context())?;
        let typ = message.typ();
        debug!(
            message = message.name(),
            len = raw.len(),
            state = %self.handler.state_name(),
            "handshake in"
        );
        let post_handshake = matches!(
            message,
            HandshakeMessage::HelloRequest
                | HandshakeMessage::NewSessionTicket(_)
                | HandshakeMessage::KeyUpdate { .. }
        );
        if !post_handshake {
            self.channel.transcript.push(&raw);
        }

        let mut link = self.channel.link();
        if let Step::Fallback(handler) = self.handler.handle_message(&mut link, &message, &raw)? {
            debug!(
                from = self.handler.version().name(),
                to = handler.version().name(),
                "version fallback"
            );
            self.handler = handler;
            if let Step::Fallback(_) = self.handler.handle_message(&mut link, &message, &raw)? {
                return Err(Error::Internal("repeated version fallback".into()));
            }
        }

        if self.handler.is_connected() && !self.handshake_done {
            self.handshake_done = true;
        }
        Ok(Incoming::Handshake(typ))
    }

    fn dispatch_alert(&mut self, fragment: &[u8]) -> Result<Incoming> {
        let alert = Alert::decode(fragment)?;
        if alert.description == AlertDescription::CloseNotify {
            debug!("close_notify in");
            if self.handler.is_connected() {
                self.handler.close_received()?;
            }
            self.peer_closed = true;
            return Ok(Incoming::Closed);
        }
        if alert.is_fatal() {
            return Err(Error::AlertReceived(alert.description));
        }
        warn!(description = ?alert.description, "warning alert received");
        Ok(Incoming::Alert(alert))
    }

    fn dispatch_application_data(&mut self, fragment: Vec<u8>) -> Result<Incoming> {
        let len = fragment.len();
        if let Some(limit) = self.handler.early_data_limit() {
            if self.early_received.len() + len > limit {
                return Err(Error::UnexpectedMessage(format!(
                    "early data beyond the {} byte limit",
                    limit
                )));
            }
            trace!(len, "early data in");
            self.early_received.extend_from_slice(&fragment);
            return Ok(Incoming::EarlyData(len));
        }
        let renegotiating = self.handshake_done && self.handler.version() == ProtocolVersion::Tls12;
        if !self.handler.is_connected() && !renegotiating {
            return Err(Error::UnexpectedMessage(
                "application data before the handshake completed".into(),
            ));
        }
        trace!(len, "application data in");
        self.incoming.extend_from_slice(&fragment);
        Ok(Incoming::ApplicationData(len))
    }

    /// Send the fatal alert for `error`, if it has one, and poison the
    /// connection.
    fn fail(&mut self, error: Error) -> Error {
        if let Some(description) = error.alert() {
            let mut link = self.channel.link();
            if let Err(e) = link.send_alert(Alert::fatal(description)) {
                debug!(error = %e, "could not send fatal alert");
            }
        }
        warn!(
            error = %error,
            state = %self.handler.state_name(),
            role = ?self.role,
            "connection failed"
        );
        self.handler.reset();
        self.failed = Some(error.clone());
        error
    }

    /// Send application data, fragmented to the maximum record size.
    pub fn write_application_data(&mut self, data: &[u8]) -> Result<()> {
        self.check_usable()?;
        if !self.handshake_done {
            return Err(Error::InvalidConfig("handshake not complete".into()));
        }
        if self.close_sent {
            return Err(Error::ConnectionClosed);
        }
        let result = self.channel.record.write_record(
            &mut self.channel.transport,
            ContentType::ApplicationData,
            data,
        );
        result.map_err(|e| self.fail(e))
    }

    /// Read buffered application data, processing records until some is
    /// available. Returns 0 once the peer has sent close_notify.
    pub fn read_application_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_usable()?;
        if !self.handshake_done {
            return Err(Error::InvalidConfig("handshake not complete".into()));
        }
        while self.incoming.is_empty() {
            if self.peer_closed {
                return Ok(0);
            }
            if let Incoming::Closed = self.receive_next_message()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.incoming.len());
        buf[..n].copy_from_slice(&self.incoming[..n]);
        self.incoming.advance(n);
        Ok(n)
    }

    /// Send close_notify. Further writes fail; reads drain what the peer
    /// still sends.
    pub fn close(&mut self) -> Result<()> {
        if self.close_sent || self.failed.is_some() {
            return Ok(());
        }
        if self.handler.is_connected() {
            self.handler.close_sent()?;
        }
        let mut link = self.channel.link();
        link.send_alert(Alert::close_notify())?;
        self.close_sent = true;
        Ok(())
    }

    /// Client, TLS 1.2: start a secure renegotiation and run it to completion.
    pub fn renegotiate(&mut self) -> Result<()> {
        self.check_usable()?;
        let mut link = self.channel.link();
        match self.handler.renegotiate(&mut link) {
            Ok(()) => {},
            Err(e @ Error::InvalidConfig(_)) => return Err(e),
            Err(e) => return Err(self.fail(e)),
        }
        self.drive_handshake()?;
        info!("renegotiation complete");
        Ok(())
    }

    /// TLS 1.3: switch to the next write keys, optionally asking the peer
    /// to do the same.
    pub fn update_keys(&mut self, request_peer: bool) -> Result<()> {
        self.check_usable()?;
        let mut link = self.channel.link();
        match self.handler.update_keys(&mut link, request_peer) {
            Ok(()) => Ok(()),
            Err(e @ Error::InvalidConfig(_)) => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Client: data to send as 0-RTT early data if a ticket allows it.
    /// Must be called before [`connect`](Self::connect).
    pub fn set_early_data(&mut self, data: &[u8]) {
        self.channel.early_data = data.to_vec();
    }

    /// Whether the server accepted our early data (client) or we accepted
    /// the client's (server).
    pub fn early_data_accepted(&self) -> bool {
        self.channel.negotiated.early_data_accepted
    }

    /// Server: the early data received so far.
    pub fn take_early_data(&mut self) -> Vec<u8> {
        self.early_received.split().to_vec()
    }

    /// Side of this connection.
    pub fn role(&self) -> Role {
        self.role
    }

    /// True once the handshake (or renegotiation) has completed.
    pub fn is_connected(&self) -> bool {
        self.handler.is_connected()
    }

    /// Current handshake state, for diagnostics.
    pub fn state(&self) -> String {
        self.handler.state_name()
    }

    /// Negotiated version.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.channel.negotiated.version
    }

    /// Negotiated suite.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.channel.negotiated.suite
    }

    /// Whether the handshake resumed a session or ticket.
    pub fn is_resumed(&self) -> bool {
        self.channel.negotiated.resumed
    }

    /// Peer chain, leaf first. Empty when resumed.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.channel.negotiated.peer_certificates
    }

    /// Client: the name the server acknowledged. Server: the name the
    /// client asked for.
    pub fn server_name(&self) -> Option<&str> {
        self.channel.negotiated.server_name.as_deref()
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.channel.config
    }

    /// The underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.channel.transport
    }

    /// The underlying transport, mutably. Writing to it directly corrupts
    /// the record stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.channel.transport
    }
}

impl<T: Transport> io::Read for Connection<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_application_data(buf)?)
    }
}

impl<T: Transport> io::Write for Connection<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_application_data(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    fn config() -> Arc<Config> {
        Arc::new(
            Config::builder(Arc::new(RustCryptoProvider::default()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_initial_handler_follows_versions() {
        let conn = Connection::client(config(), Cursor::new(Vec::new()));
        assert_eq!(conn.state(), "Idle");
        assert!(!conn.is_connected());

        let only12 = Arc::new(
            Config::builder(Arc::new(RustCryptoProvider::default()))
                .with_protocol_versions(&[ProtocolVersion::Tls12])
                .build()
                .unwrap(),
        );
        let conn = Connection::server(only12, Cursor::new(Vec::new()));
        assert_eq!(conn.handler.version(), ProtocolVersion::Tls12);
    }

    #[test]
    fn test_write_before_handshake_is_rejected() {
        let mut conn = Connection::client(config(), Cursor::new(Vec::new()));
        assert!(matches!(
            conn.write_application_data(b"x"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_client_hello_is_sent_on_connect() {
        let mut conn = Connection::client(config(), Cursor::new(Vec::new()));
        // The cursor has nothing to read, so the handshake stops after the
        // first flight.
        assert_eq!(conn.connect(), Err(Error::ConnectionClosed));
        let written = conn.get_ref().get_ref();
        assert_eq!(written[0], ContentType::Handshake.to_u8());
        assert_eq!(written[5], HandshakeType::ClientHello.to_u8());
        assert!(conn.receive_next_message().is_err());
    }

    #[test]
    fn test_fatal_alert_from_peer() {
        let mut wire = vec![ContentType::Alert.to_u8(), 3, 3, 0, 2];
        wire.extend_from_slice(&Alert::fatal(AlertDescription::HandshakeFailure).encode());
        let mut conn = Connection::server(config(), Cursor::new(wire));
        assert_eq!(
            conn.accept(),
            Err(Error::AlertReceived(AlertDescription::HandshakeFailure))
        );
    }

    #[test]
    fn test_application_data_before_handshake() {
        let wire = vec![ContentType::ApplicationData.to_u8(), 3, 3, 0, 1, 0x42];
        let mut conn = Connection::server(config(), Cursor::new(wire));
        assert!(matches!(conn.accept(), Err(Error::UnexpectedMessage(_))));
    }
}
