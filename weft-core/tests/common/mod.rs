//! Shared helpers for the end-to-end tests: fixtures, configurations and a
//! socket-pair runner with the server on its own thread.

#![allow(dead_code)]

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use weft_core::weft_crypto::CryptoProvider;
use weft_core::{
    CipherSuite, Config, ConfigBuilder, Connection, Error, Identity, InMemorySessionCache,
    ProtocolVersion, Result, Transport,
};
use weft_crypto_rustcrypto::RustCryptoProvider;

pub const RSA_PEM: &str = include_str!("../data/rsa2048.pem");
pub const ECDSA_PEM: &str = include_str!("../data/ecdsa_p256.pem");
pub const ED25519_PEM: &str = include_str!("../data/ed25519.pem");
pub const DH_PEM: &str = include_str!("../data/dh2048.pem");

pub const SERVER_NAME: &str = "localhost";

const IO_TIMEOUT: Duration = Duration::from_secs(20);

pub fn provider() -> Arc<dyn CryptoProvider> {
    Arc::new(RustCryptoProvider::default())
}

pub fn identity(pem: &str) -> Identity {
    Identity::from_pem(pem).expect("fixture identity")
}

pub fn client_config() -> ConfigBuilder {
    Config::builder(provider()).with_server_name(SERVER_NAME)
}

pub fn server_config(pem: &str) -> ConfigBuilder {
    Config::builder(provider())
        .with_identity(identity(pem))
        .with_server_name(SERVER_NAME)
}

pub fn build(builder: ConfigBuilder) -> Arc<Config> {
    Arc::new(builder.build().expect("valid configuration"))
}

pub fn cache() -> Arc<InMemorySessionCache> {
    Arc::new(InMemorySessionCache::default())
}

/// Route engine logs to the test harness; `RUST_LOG=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run `client` on this thread and `server` on a new one over a connected
/// socket pair. The client's socket is closed before the server is joined.
pub fn run_pair<RC, RS>(
    client: impl FnOnce(UnixStream) -> RC,
    server: impl FnOnce(UnixStream) -> RS + Send + 'static,
) -> (RC, RS)
where
    RS: Send + 'static,
{
    init_tracing();
    let (c, s) = UnixStream::pair().expect("socket pair");
    c.set_read_timeout(Some(IO_TIMEOUT)).expect("timeout");
    s.set_read_timeout(Some(IO_TIMEOUT)).expect("timeout");
    let handle = thread::spawn(move || server(s));
    let client_result = client(c);
    let server_result = handle.join().expect("server thread panicked");
    (client_result, server_result)
}

/// What one side saw.
#[derive(Debug)]
pub struct Summary {
    pub version: Option<ProtocolVersion>,
    pub suite: Option<CipherSuite>,
    pub resumed: bool,
    pub early_data_accepted: bool,
    pub early_data: Vec<u8>,
    pub peer_certificates: usize,
    pub server_name: Option<String>,
}

impl Summary {
    pub fn of<T: Transport>(conn: &Connection<T>) -> Self {
        Self {
            version: conn.protocol_version(),
            suite: conn.cipher_suite(),
            resumed: conn.is_resumed(),
            early_data_accepted: conn.early_data_accepted(),
            early_data: Vec::new(),
            peer_certificates: conn.peer_certificates().len(),
            server_name: conn.server_name().map(str::to_owned),
        }
    }
}

/// Read exactly `n` bytes of application data.
pub fn read_exact<T: Transport>(conn: &mut Connection<T>, n: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let k = conn.read_application_data(&mut out[filled..])?;
        if k == 0 {
            return Err(Error::ConnectionClosed);
        }
        filled += k;
    }
    Ok(out)
}

/// Client side of a ping/pong exchange: connect, send "ping", expect
/// "pong", close.
pub fn client_echo(
    config: Arc<Config>,
    cache: Arc<InMemorySessionCache>,
    early_data: Option<&'static [u8]>,
) -> impl FnOnce(UnixStream) -> Result<Summary> {
    move |stream| {
        let mut conn = Connection::client(config, stream).with_session_cache(cache);
        if let Some(data) = early_data {
            conn.set_early_data(data);
        }
        conn.connect()?;
        conn.write_application_data(b"ping")?;
        let reply = read_exact(&mut conn, 4)?;
        assert_eq!(reply, b"pong");
        let summary = Summary::of(&conn);
        conn.close()?;
        Ok(summary)
    }
}

/// Server side of a ping/pong exchange: accept, expect "ping", send
/// "pong", wait for close_notify.
pub fn server_echo(
    config: Arc<Config>,
    cache: Arc<InMemorySessionCache>,
) -> impl FnOnce(UnixStream) -> Result<Summary> + Send + 'static {
    move |stream| {
        let mut conn = Connection::server(config, stream).with_session_cache(cache);
        conn.accept()?;
        let request = read_exact(&mut conn, 4)?;
        assert_eq!(request, b"ping");
        conn.write_application_data(b"pong")?;
        let mut summary = Summary::of(&conn);
        summary.early_data = conn.take_early_data();
        let mut rest = [0u8; 16];
        assert_eq!(conn.read_application_data(&mut rest)?, 0);
        Ok(summary)
    }
}

/// One full ping/pong connection with the given configurations and caches.
pub fn exchange(
    client: &Arc<Config>,
    client_cache: &Arc<InMemorySessionCache>,
    server: &Arc<Config>,
    server_cache: &Arc<InMemorySessionCache>,
    early_data: Option<&'static [u8]>,
) -> (Result<Summary>, Result<Summary>) {
    run_pair(
        client_echo(client.clone(), client_cache.clone(), early_data),
        server_echo(server.clone(), server_cache.clone()),
    )
}
