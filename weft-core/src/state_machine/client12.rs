//! TLS 1.2 client states.
//!
//! ```text
//! Idle -> ClientHelloSent -> ServerHelloReceived
//!   full:     -> CertificateReceived [-> ServerKeyExchangeReceived]
//!             -> ServerHelloDoneReceived -> ClientKeyExchangeSent
//!             -> ChangeCipherSpecSent -> FinishedSent
//!             -> ChangeCipherSpecReceived -> FinishedReceived -> Connected
//!   resumed:  -> ChangeCipherSpecReceived -> FinishedReceived
//!             -> ChangeCipherSpecSent -> FinishedSent -> Connected
//! Connected -> CloseReceived | CloseSent | ClientHelloSent (renegotiation)
//! ```

use super::{Event, Facts, StateTable};
use crate::protocol::HandshakeType;

/// TLS 1.2 client handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Client12State {
    /// Nothing sent yet
    Idle,
    /// ClientHello sent
    ClientHelloSent,
    /// ServerHello received
    ServerHelloReceived,
    /// Server Certificate received
    CertificateReceived,
    /// ServerKeyExchange received
    ServerKeyExchangeReceived,
    /// ServerHelloDone received
    ServerHelloDoneReceived,
    /// ClientKeyExchange sent
    ClientKeyExchangeSent,
    /// ChangeCipherSpec sent
    ChangeCipherSpecSent,
    /// Finished sent
    FinishedSent,
    /// ChangeCipherSpec received
    ChangeCipherSpecReceived,
    /// Server Finished received
    FinishedReceived,
    /// Handshake complete
    Connected,
    /// close_notify received
    CloseReceived,
    /// close_notify sent
    CloseSent,
}

impl StateTable for Client12State {
    const IDLE: Self = Client12State::Idle;

    const ALL: &'static [Self] = &[
        Client12State::Idle,
        Client12State::ClientHelloSent,
        Client12State::ServerHelloReceived,
        Client12State::CertificateReceived,
        Client12State::ServerKeyExchangeReceived,
        Client12State::ServerHelloDoneReceived,
        Client12State::ClientKeyExchangeSent,
        Client12State::ChangeCipherSpecSent,
        Client12State::FinishedSent,
        Client12State::ChangeCipherSpecReceived,
        Client12State::FinishedReceived,
        Client12State::Connected,
        Client12State::CloseReceived,
        Client12State::CloseSent,
    ];

    fn permits(self, next: Self, facts: &Facts) -> bool {
        use Client12State::*;
        match (self, next) {
            (Idle, ClientHelloSent) => true,
            (ClientHelloSent, ServerHelloReceived) => true,
            (ServerHelloReceived, CertificateReceived) => !facts.resuming,
            (ServerHelloReceived, ChangeCipherSpecReceived) => facts.resuming,
            (CertificateReceived, ServerKeyExchangeReceived) => facts.needs_server_key_exchange,
            (CertificateReceived, ServerHelloDoneReceived) => !facts.needs_server_key_exchange,
            (ServerKeyExchangeReceived, ServerHelloDoneReceived) => true,
            (ServerHelloDoneReceived, ClientKeyExchangeSent) => true,
            (ClientKeyExchangeSent, ChangeCipherSpecSent) => true,
            (ChangeCipherSpecSent, FinishedSent) => true,
            (FinishedSent, ChangeCipherSpecReceived) => !facts.resuming,
            (FinishedSent, Connected) => facts.resuming,
            (ChangeCipherSpecReceived, FinishedReceived) => true,
            (FinishedReceived, Connected) => !facts.resuming,
            (FinishedReceived, ChangeCipherSpecSent) => facts.resuming,
            (Connected, CloseReceived | CloseSent | ClientHelloSent) => true,
            _ => false,
        }
    }

    fn on_send(event: Event) -> Option<Self> {
        match event {
            Event::Handshake(HandshakeType::ClientHello) => Some(Client12State::ClientHelloSent),
            Event::Handshake(HandshakeType::ClientKeyExchange) => {
                Some(Client12State::ClientKeyExchangeSent)
            },
            Event::Handshake(HandshakeType::Finished) => Some(Client12State::FinishedSent),
            Event::ChangeCipherSpec => Some(Client12State::ChangeCipherSpecSent),
            Event::CloseNotify => Some(Client12State::CloseSent),
            _ => None,
        }
    }

    fn on_receive(event: Event) -> Option<Self> {
        match event {
            Event::Handshake(HandshakeType::ServerHello) => Some(Client12State::ServerHelloReceived),
            Event::Handshake(HandshakeType::Certificate) => Some(Client12State::CertificateReceived),
            Event::Handshake(HandshakeType::ServerKeyExchange) => {
                Some(Client12State::ServerKeyExchangeReceived)
            },
            Event::Handshake(HandshakeType::ServerHelloDone) => {
                Some(Client12State::ServerHelloDoneReceived)
            },
            Event::Handshake(HandshakeType::Finished) => Some(Client12State::FinishedReceived),
            Event::ChangeCipherSpec => Some(Client12State::ChangeCipherSpecReceived),
            Event::CloseNotify => Some(Client12State::CloseReceived),
            _ => None,
        }
    }

    fn is_connected(self) -> bool {
        self == Client12State::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{always, check_table, Machine};
    use Client12State::*;

    #[test]
    fn test_table_is_exact() {
        check_table::<Client12State>(&[
            (Idle, ClientHelloSent, always),
            (ClientHelloSent, ServerHelloReceived, always),
            (ServerHelloReceived, CertificateReceived, |f| !f.resuming),
            (ServerHelloReceived, ChangeCipherSpecReceived, |f| f.resuming),
            (CertificateReceived, ServerKeyExchangeReceived, |f| f.needs_server_key_exchange),
            (CertificateReceived, ServerHelloDoneReceived, |f| !f.needs_server_key_exchange),
            (ServerKeyExchangeReceived, ServerHelloDoneReceived, always),
            (ServerHelloDoneReceived, ClientKeyExchangeSent, always),
            (ClientKeyExchangeSent, ChangeCipherSpecSent, always),
            (ChangeCipherSpecSent, FinishedSent, always),
            (FinishedSent, ChangeCipherSpecReceived, |f| !f.resuming),
            (FinishedSent, Connected, |f| f.resuming),
            (ChangeCipherSpecReceived, FinishedReceived, always),
            (FinishedReceived, Connected, |f| !f.resuming),
            (FinishedReceived, ChangeCipherSpecSent, |f| f.resuming),
            (Connected, CloseReceived, always),
            (Connected, CloseSent, always),
            (Connected, ClientHelloSent, always),
        ]);
    }

    #[test]
    fn test_full_handshake_with_key_exchange() {
        let facts = Facts {
            needs_server_key_exchange: true,
            ..Facts::default()
        };
        let mut machine = Machine::<Client12State>::new();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        for typ in [
            HandshakeType::ServerHello,
            HandshakeType::Certificate,
            HandshakeType::ServerKeyExchange,
            HandshakeType::ServerHelloDone,
        ] {
            machine.received(Event::Handshake(typ), &facts).unwrap();
        }
        machine
            .sent(Event::Handshake(HandshakeType::ClientKeyExchange), &facts)
            .unwrap();
        machine.sent(Event::ChangeCipherSpec, &facts).unwrap();
        machine.sent(Event::Handshake(HandshakeType::Finished), &facts).unwrap();
        machine.received(Event::ChangeCipherSpec, &facts).unwrap();
        machine
            .received(Event::Handshake(HandshakeType::Finished), &facts)
            .unwrap();
        machine.transition(Connected, &facts).unwrap();
        assert!(machine.is_connected());
    }

    #[test]
    fn test_skipped_key_exchange_is_rejected() {
        let facts = Facts {
            needs_server_key_exchange: true,
            ..Facts::default()
        };
        let mut machine = Machine::<Client12State>::new();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        machine
            .received(Event::Handshake(HandshakeType::ServerHello), &facts)
            .unwrap();
        machine
            .received(Event::Handshake(HandshakeType::Certificate), &facts)
            .unwrap();
        assert!(machine
            .received(Event::Handshake(HandshakeType::ServerHelloDone), &facts)
            .is_err());
    }
}
