//! # weft-core
//!
//! TLS 1.2 and TLS 1.3 protocol engine.
//!
//! This crate provides the protocol components of weft:
//! - Handshake state machines, one per role and version
//! - Protocol handlers that build and check handshake messages
//! - Message and extension encoding
//! - Record layer with per-direction protection
//! - TLS 1.2 PRF and TLS 1.3 key schedule
//! - Session and ticket resumption
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Public API (weft)               │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │       weft-core (this crate)            │
//! │  ┌──────────────────────────────────┐   │
//! │  │   Connection                     │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Protocol Handlers              │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   State Machines                 │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Messages / Key Schedule        │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Record Layer                   │   │
//! │  └──────────────────────────────────┘   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │      weft-crypto (trait interface)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A [`Connection`] is driven synchronously over any blocking
//! [`Transport`]. Connections share nothing but an optional
//! [`SessionCache`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

// Re-export crypto interface
pub use weft_crypto;

#[macro_use]
pub mod codec;

pub mod alert;
pub mod cipher;
pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
mod handler;
pub mod identity;
pub mod key_schedule;
pub mod messages;
pub mod pem;
pub mod protocol;
pub mod record;
pub mod session;
pub mod state_machine;
pub mod transcript;
pub mod transport;
pub mod x509;

// Re-exports
pub use alert::{Alert, AlertLevel};
pub use cipher::{CipherSuite, CipherSuiteDescriptor};
pub use config::{Config, ConfigBuilder, DhParameters, EarlyData};
pub use connection::{Connection, Incoming};
pub use error::{AlertDescription, Error, ProtocolFault, Result};
pub use identity::Identity;
pub use protocol::{ContentType, HandshakeType, NamedGroup, ProtocolVersion, Role, SignatureScheme};
pub use session::{CachedSession, InMemorySessionCache, Session, SessionCache, SessionKey, Ticket};
pub use transport::Transport;
