//! TLS server over TCP.

use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use weft_core::{Config, Connection, Error, InMemorySessionCache, Result};

/// A listening TLS server.
///
/// Every accepted connection shares the server's session cache, so
/// clients can resume sessions and tickets across connections.
#[derive(Debug)]
pub struct TlsServer {
    listener: TcpListener,
    config: Arc<Config>,
    sessions: Arc<InMemorySessionCache>,
}

impl TlsServer {
    /// Bind to `addr`. The configuration must carry an identity.
    pub fn bind(addr: impl ToSocketAddrs, config: Arc<Config>) -> Result<Self> {
        if config.identity.is_none() {
            return Err(Error::InvalidConfig("server configuration has no identity".into()));
        }
        let listener = TcpListener::bind(addr)?;
        tracing::info!(addr = ?listener.local_addr().ok(), "listening");
        Ok(Self {
            listener,
            config,
            sessions: Arc::new(InMemorySessionCache::default()),
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The cache shared by accepted connections.
    pub fn session_cache(&self) -> &Arc<InMemorySessionCache> {
        &self.sessions
    }

    /// Wait for a client and complete its handshake.
    ///
    /// A failed handshake is returned as an error; the server stays usable.
    pub fn accept(&self) -> Result<(Connection<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.listener.accept()?;
        tracing::debug!(%peer, "accepted");
        let mut connection =
            Connection::server(self.config.clone(), stream).with_session_cache(self.sessions.clone());
        connection.accept()?;
        Ok((connection, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TlsClient;
    use crate::default_provider;
    use std::io::{Read, Write};
    use std::thread;
    use weft_core::{Identity, ProtocolVersion};

    const IDENTITY: &str = include_str!("../../weft-core/tests/data/ed25519.pem");

    fn server_config() -> Arc<Config> {
        Arc::new(
            Config::builder(default_provider())
                .with_identity(Identity::from_pem(IDENTITY).unwrap())
                .with_server_name("localhost")
                .build()
                .unwrap(),
        )
    }

    fn client_config() -> Arc<Config> {
        Arc::new(
            Config::builder(default_provider())
                .with_server_name("localhost")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_bind_requires_identity() {
        let result = TlsServer::bind("127.0.0.1:0", client_config());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_echo_over_tcp() {
        let server = TlsServer::bind("127.0.0.1:0", server_config()).unwrap();
        let addr = server.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut conn, _) = server.accept().unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&buf).unwrap();
            let mut rest = Vec::new();
            conn.read_to_end(&mut rest).unwrap();
            assert!(rest.is_empty());
        });

        let mut client = TlsClient::connect(addr, client_config()).unwrap();
        assert_eq!(client.connection().protocol_version(), Some(ProtocolVersion::Tls13));
        client.write_all(b"hello").unwrap();
        let mut echoed = [0u8; 5];
        client.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"hello");
        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_second_connection_resumes() {
        let server = TlsServer::bind("127.0.0.1:0", server_config()).unwrap();
        let addr = server.local_addr().unwrap();
        let client_cache = Arc::new(InMemorySessionCache::default());

        let handle = thread::spawn(move || {
            let mut resumed = Vec::new();
            for _ in 0..2 {
                let (mut conn, _) = server.accept().unwrap();
                resumed.push(conn.is_resumed());
                let mut byte = [0u8; 1];
                conn.read_exact(&mut byte).unwrap();
                conn.write_all(&byte).unwrap();
                let mut rest = Vec::new();
                conn.read_to_end(&mut rest).unwrap();
            }
            resumed
        });

        for _ in 0..2 {
            let mut client =
                TlsClient::connect_with_cache(addr, client_config(), client_cache.clone()).unwrap();
            client.write_all(b"x").unwrap();
            // The ticket arrives ahead of the echo.
            let mut byte = [0u8; 1];
            client.read_exact(&mut byte).unwrap();
            client.close().unwrap();
        }
        assert_eq!(handle.join().unwrap(), vec![false, true]);
    }
}
