//! TLS client over TCP.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use weft_core::{Config, Connection, Error, Result, SessionCache};

/// Port used when `host[:port]` names no port.
pub const DEFAULT_PORT: u16 = 443;

/// A connected TLS client.
///
/// Reads and writes go through the TLS connection; use
/// [`connection`](Self::connection) for negotiated parameters.
#[derive(Debug)]
pub struct TlsClient {
    connection: Connection<TcpStream>,
}

impl TlsClient {
    /// Open a TCP connection to `addr` and run the handshake.
    pub fn connect(addr: impl ToSocketAddrs, config: Arc<Config>) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::handshake(Connection::client(config, stream))
    }

    /// Like [`connect`](Self::connect), resuming from and storing into
    /// `cache`.
    pub fn connect_with_cache(
        addr: impl ToSocketAddrs,
        config: Arc<Config>,
        cache: Arc<dyn SessionCache>,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::handshake(Connection::client(config, stream).with_session_cache(cache))
    }

    fn handshake(mut connection: Connection<TcpStream>) -> Result<Self> {
        connection.connect()?;
        tracing::debug!(
            version = ?connection.protocol_version(),
            suite = ?connection.cipher_suite(),
            "client connected"
        );
        Ok(Self { connection })
    }

    /// The underlying TLS connection.
    pub fn connection(&self) -> &Connection<TcpStream> {
        &self.connection
    }

    /// The underlying TLS connection, mutably.
    pub fn connection_mut(&mut self) -> &mut Connection<TcpStream> {
        &mut self.connection
    }

    /// Send close_notify.
    pub fn close(&mut self) -> Result<()> {
        self.connection.close()
    }

    /// Give up the wrapper.
    pub fn into_inner(self) -> Connection<TcpStream> {
        self.connection
    }
}

impl Read for TlsClient {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connection.read(buf)
    }
}

impl Write for TlsClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.connection.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.connection.flush()
    }
}

/// Split `host[:port]` into its host and port, defaulting the port to
/// `default_port`. Bracketed IPv6 literals (`[::1]:443`) are accepted.
pub fn split_host_port(target: &str, default_port: u16) -> Result<(String, u16)> {
    let invalid = || Error::InvalidConfig(format!("invalid address '{}'", target));
    if target.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None if tail.is_empty() => default_port,
            None => return Err(invalid()),
        };
        return Ok((host.to_string(), port));
    }

    match target.rsplit_once(':') {
        // A bare IPv6 address has several colons and no port.
        Some((host, _)) if host.contains(':') => Ok((target.to_string(), default_port)),
        Some((host, port)) if !host.is_empty() => {
            Ok((host.to_string(), port.parse().map_err(|_| invalid())?))
        },
        Some(_) => Err(invalid()),
        None => Ok((target.to_string(), default_port)),
    }
}
