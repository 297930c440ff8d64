//! TLS 1.2 server states.

use super::{Event, Facts, StateTable};
use crate::protocol::HandshakeType;

/// TLS 1.2 server handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Server12State {
    /// Waiting for a ClientHello
    Idle,
    /// ClientHello received
    ClientHelloReceived,
    /// ServerHello sent
    ServerHelloSent,
    /// Certificate sent
    CertificateSent,
    /// ServerKeyExchange sent
    ServerKeyExchangeSent,
    /// ServerHelloDone sent
    ServerHelloDoneSent,
    /// ClientKeyExchange received
    ClientKeyExchangeReceived,
    /// ChangeCipherSpec received
    ChangeCipherSpecReceived,
    /// Client Finished received
    FinishedReceived,
    /// ChangeCipherSpec sent
    ChangeCipherSpecSent,
    /// Finished sent
    FinishedSent,
    /// Handshake complete
    Connected,
    /// close_notify sent
    CloseSent,
    /// close_notify received
    CloseReceived,
}

impl StateTable for Server12State {
    const IDLE: Self = Server12State::Idle;

    const ALL: &'static [Self] = &[
        Server12State::Idle,
        Server12State::ClientHelloReceived,
        Server12State::ServerHelloSent,
        Server12State::CertificateSent,
        Server12State::ServerKeyExchangeSent,
        Server12State::ServerHelloDoneSent,
        Server12State::ClientKeyExchangeReceived,
        Server12State::ChangeCipherSpecReceived,
        Server12State::FinishedReceived,
        Server12State::ChangeCipherSpecSent,
        Server12State::FinishedSent,
        Server12State::Connected,
        Server12State::CloseSent,
        Server12State::CloseReceived,
    ];

    fn permits(self, next: Self, facts: &Facts) -> bool {
        use Server12State::*;
        match (self, next) {
            (Idle, ClientHelloReceived) => true,
            (ClientHelloReceived, ServerHelloSent) => true,
            (ServerHelloSent, CertificateSent) => !facts.resuming,
            (ServerHelloSent, ChangeCipherSpecSent) => facts.resuming,
            (CertificateSent, ServerKeyExchangeSent) => facts.needs_server_key_exchange,
            (CertificateSent, ServerHelloDoneSent) => !facts.needs_server_key_exchange,
            (ServerKeyExchangeSent, ServerHelloDoneSent) => true,
            (ServerHelloDoneSent, ClientKeyExchangeReceived) => true,
            (ClientKeyExchangeReceived, ChangeCipherSpecReceived) => true,
            (ChangeCipherSpecReceived, FinishedReceived) => true,
            (FinishedReceived, ChangeCipherSpecSent) => !facts.resuming,
            (FinishedReceived, Connected) => facts.resuming,
            (ChangeCipherSpecSent, FinishedSent) => true,
            (FinishedSent, Connected) => !facts.resuming,
            (FinishedSent, ChangeCipherSpecReceived) => facts.resuming,
            (Connected, CloseSent | CloseReceived | ClientHelloReceived) => true,
            _ => false,
        }
    }

    fn on_send(event: Event) -> Option<Self> {
        use Server12State::*;
        match event {
            Event::Handshake(HandshakeType::ServerHello) => Some(ServerHelloSent),
            Event::Handshake(HandshakeType::Certificate) => Some(CertificateSent),
            Event::Handshake(HandshakeType::ServerKeyExchange) => Some(ServerKeyExchangeSent),
            Event::Handshake(HandshakeType::ServerHelloDone) => Some(ServerHelloDoneSent),
            Event::Handshake(HandshakeType::Finished) => Some(FinishedSent),
            Event::ChangeCipherSpec => Some(ChangeCipherSpecSent),
            Event::CloseNotify => Some(CloseSent),
            _ => None,
        }
    }

    fn on_receive(event: Event) -> Option<Self> {
        use Server12State::*;
        match event {
            Event::Handshake(HandshakeType::ClientHello) => Some(ClientHelloReceived),
            Event::Handshake(HandshakeType::ClientKeyExchange) => Some(ClientKeyExchangeReceived),
            Event::Handshake(HandshakeType::Finished) => Some(FinishedReceived),
            Event::ChangeCipherSpec => Some(ChangeCipherSpecReceived),
            Event::CloseNotify => Some(CloseReceived),
            _ => None,
        }
    }

    fn is_connected(self) -> bool {
        self == Server12State::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{always, check_table, Machine};
    use Server12State::*;

    #[test]
    fn test_table_is_exact() {
        check_table::<Server12State>(&[
            (Idle, ClientHelloReceived, always),
            (ClientHelloReceived, ServerHelloSent, always),
            (ServerHelloSent, CertificateSent, |f| !f.resuming),
            (ServerHelloSent, ChangeCipherSpecSent, |f| f.resuming),
            (CertificateSent, ServerKeyExchangeSent, |f| f.needs_server_key_exchange),
            (CertificateSent, ServerHelloDoneSent, |f| !f.needs_server_key_exchange),
            (ServerKeyExchangeSent, ServerHelloDoneSent, always),
            (ServerHelloDoneSent, ClientKeyExchangeReceived, always),
            (ClientKeyExchangeReceived, ChangeCipherSpecReceived, always),
            (ChangeCipherSpecReceived, FinishedReceived, always),
            (FinishedReceived, ChangeCipherSpecSent, |f| !f.resuming),
            (FinishedReceived, Connected, |f| f.resuming),
            (ChangeCipherSpecSent, FinishedSent, always),
            (FinishedSent, Connected, |f| !f.resuming),
            (FinishedSent, ChangeCipherSpecReceived, |f| f.resuming),
            (Connected, CloseSent, always),
            (Connected, CloseReceived, always),
            (Connected, ClientHelloReceived, always),
        ]);
    }

    #[test]
    fn test_resumed_handshake() {
        let facts = Facts {
            resuming: true,
            ..Facts::default()
        };
        let mut machine = Machine::<Server12State>::new();
        machine
            .received(Event::Handshake(HandshakeType::ClientHello), &facts)
            .unwrap();
        machine
            .sent(Event::Handshake(HandshakeType::ServerHello), &facts)
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
    fn test_certificate_not_allowed_when_resuming() {
        let facts = Facts {
            resuming: true,
            ..Facts::default()
        };
        let mut machine = Machine::<Server12State>::new();
        machine
            .received(Event::Handshake(HandshakeType::ClientHello), &facts)
            .unwrap();
        machine
            .sent(Event::Handshake(HandshakeType::ServerHello), &facts)
            .unwrap();
        assert!(machine
            .sent(Event::Handshake(HandshakeType::Certificate), &facts)
            .is_err());
    }

    #[test]
    fn test_renegotiation_from_connected() {
        let mut machine = Machine::<Server12State>::new();
        let facts = Facts::default();
        for state in [
            ClientHelloReceived,
            ServerHelloSent,
            CertificateSent,
            ServerHelloDoneSent,
            ClientKeyExchangeReceived,
            ChangeCipherSpecReceived,
            FinishedReceived,
            ChangeCipherSpecSent,
            FinishedSent,
            Connected,
            ClientHelloReceived,
        ] {
            machine.transition(state, &facts).unwrap();
        }
    }
}
