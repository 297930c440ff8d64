//! # weft
//!
//! TLS 1.2 and TLS 1.3 over blocking TCP.
//!
//! The protocol engine lives in [`weft_core`]; this crate adds the default
//! crypto provider and small client and server helpers over
//! [`std::net::TcpStream`].
//!
//! ## Client
//!
//! ```rust,no_run
//! use std::io::{Read, Write};
//! use weft::{Config, TlsClient};
//!
//! # fn main() -> weft::Result<()> {
//! let config = Config::builder(weft::default_provider())
//!     .with_server_name("example.com")
//!     .build()?;
//! let mut client = TlsClient::connect("example.com:443", config.into())?;
//! client.write_all(b"GET / HTTP/1.0\r\n\r\n")?;
//! let mut response = Vec::new();
//! client.read_to_end(&mut response)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Server
//!
//! ```rust,no_run
//! use weft::{Config, Identity, TlsServer};
//!
//! # fn main() -> weft::Result<()> {
//! let config = Config::builder(weft::default_provider())
//!     .with_identity(Identity::from_pem_file("server.pem")?)
//!     .build()?;
//! let server = TlsServer::bind("0.0.0.0:8443", config.into())?;
//! loop {
//!     let (mut connection, peer) = server.accept()?;
//!     // Serve `connection`...
//! #   let _ = (&mut connection, peer);
//! }
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

use std::sync::Arc;

// Re-export the engine
pub use weft_core::{
    self, AlertDescription, CipherSuite, Config, ConfigBuilder, Connection, DhParameters,
    EarlyData, Error, Identity, InMemorySessionCache, NamedGroup, ProtocolVersion, Result, Role,
    SessionCache,
};

// Re-export crypto interface and default backend
pub use weft_crypto;
pub use weft_crypto_rustcrypto::RustCryptoProvider;

pub mod client;
pub mod server;

pub use client::TlsClient;
pub use server::TlsServer;

/// weft version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the weft version.
pub fn version() -> &'static str {
    VERSION
}

/// The RustCrypto-backed provider, ready for [`Config::builder`].
pub fn default_provider() -> Arc<dyn weft_crypto::CryptoProvider> {
    Arc::new(RustCryptoProvider::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert!(ver.starts_with("0."));
    }

    #[test]
    fn test_default_provider_builds_config() {
        let config = Config::builder(default_provider()).build().unwrap();
        assert_eq!(
            config.protocol_versions,
            vec![ProtocolVersion::Tls13, ProtocolVersion::Tls12]
        );
    }
}
