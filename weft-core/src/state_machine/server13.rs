//! TLS 1.3 server states.

use super::{Event, Facts, StateTable};
use crate::protocol::HandshakeType;

/// TLS 1.3 server handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Server13State {
    /// Waiting for a ClientHello
    Idle,
    /// ClientHello received
    ClientHelloReceived,
    /// HelloRetryRequest sent
    HelloRetryRequestSent,
    /// ServerHello sent
    ServerHelloSent,
    /// EncryptedExtensions sent
    EncryptedExtensionsSent,
    /// Certificate sent
    CertificateSent,
    /// CertificateVerify sent
    CertificateVerifySent,
    /// Server Finished sent
    FinishedSent,
    /// EndOfEarlyData received
    EndOfEarlyDataReceived,
    /// Client Finished received
    FinishedReceived,
    /// Handshake complete
    Connected,
    /// NewSessionTicket sent
    NewSessionTicketSent,
    /// close_notify received
    CloseReceived,
    /// close_notify sent
    CloseSent,
}

impl StateTable for Server13State {
    const IDLE: Self = Server13State::Idle;

    const ALL: &'static [Self] = &[
        Server13State::Idle,
        Server13State::ClientHelloReceived,
        Server13State::HelloRetryRequestSent,
        Server13State::ServerHelloSent,
        Server13State::EncryptedExtensionsSent,
        Server13State::CertificateSent,
        Server13State::CertificateVerifySent,
        Server13State::FinishedSent,
        Server13State::EndOfEarlyDataReceived,
        Server13State::FinishedReceived,
        Server13State::Connected,
        Server13State::NewSessionTicketSent,
        Server13State::CloseReceived,
        Server13State::CloseSent,
    ];

    fn permits(self, next: Self, facts: &Facts) -> bool {
        use Server13State::*;
        match (self, next) {
            (Idle | HelloRetryRequestSent, ClientHelloReceived) => true,
            (ClientHelloReceived, ServerHelloSent | HelloRetryRequestSent) => true,
            (ServerHelloSent, EncryptedExtensionsSent) => true,
            (EncryptedExtensionsSent, FinishedSent) => facts.psk_accepted,
            (EncryptedExtensionsSent, CertificateSent) => !facts.psk_accepted,
            (CertificateSent, CertificateVerifySent) => true,
            (CertificateVerifySent, FinishedSent) => true,
            (FinishedSent, EndOfEarlyDataReceived) => facts.early_data_accepted,
            (FinishedSent, FinishedReceived) => !facts.early_data_accepted,
            (EndOfEarlyDataReceived, FinishedReceived) => true,
            (FinishedReceived, Connected | NewSessionTicketSent) => true,
            (NewSessionTicketSent, Connected | NewSessionTicketSent) => true,
            (Connected, CloseReceived | CloseSent | NewSessionTicketSent) => true,
            _ => false,
        }
    }

    fn on_send(event: Event) -> Option<Self> {
        use Server13State::*;
        match event {
            Event::Handshake(HandshakeType::ServerHello) => Some(ServerHelloSent),
            Event::HelloRetryRequest => Some(HelloRetryRequestSent),
            Event::Handshake(HandshakeType::EncryptedExtensions) => Some(EncryptedExtensionsSent),
            Event::Handshake(HandshakeType::Certificate) => Some(CertificateSent),
            Event::Handshake(HandshakeType::CertificateVerify) => Some(CertificateVerifySent),
            Event::Handshake(HandshakeType::Finished) => Some(FinishedSent),
            Event::Handshake(HandshakeType::NewSessionTicket) => Some(NewSessionTicketSent),
            Event::CloseNotify => Some(CloseSent),
            _ => None,
        }
    }

    fn on_receive(event: Event) -> Option<Self> {
        use Server13State::*;
        match event {
            Event::Handshake(HandshakeType::ClientHello) => Some(ClientHelloReceived),
            Event::Handshake(HandshakeType::EndOfEarlyData) => Some(EndOfEarlyDataReceived),
            Event::Handshake(HandshakeType::Finished) => Some(FinishedReceived),
            Event::CloseNotify => Some(CloseReceived),
            _ => None,
        }
    }

    fn is_connected(self) -> bool {
        matches!(
            self,
            Server13State::Connected | Server13State::NewSessionTicketSent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{always, check_table, Machine};
    use Server13State::*;

    #[test]
    fn test_table_is_exact() {
        check_table::<Server13State>(&[
            (Idle, ClientHelloReceived, always),
            (HelloRetryRequestSent, ClientHelloReceived, always),
            (ClientHelloReceived, ServerHelloSent, always),
            (ClientHelloReceived, HelloRetryRequestSent, always),
            (ServerHelloSent, EncryptedExtensionsSent, always),
            (EncryptedExtensionsSent, FinishedSent, |f| f.psk_accepted),
            (EncryptedExtensionsSent, CertificateSent, |f| !f.psk_accepted),
            (CertificateSent, CertificateVerifySent, always),
            (CertificateVerifySent, FinishedSent, always),
            (FinishedSent, EndOfEarlyDataReceived, |f| f.early_data_accepted),
            (FinishedSent, FinishedReceived, |f| !f.early_data_accepted),
            (EndOfEarlyDataReceived, FinishedReceived, always),
            (FinishedReceived, Connected, always),
            (FinishedReceived, NewSessionTicketSent, always),
            (NewSessionTicketSent, Connected, always),
            (NewSessionTicketSent, NewSessionTicketSent, always),
            (Connected, CloseReceived, always),
            (Connected, CloseSent, always),
            (Connected, NewSessionTicketSent, always),
        ]);
    }

    #[test]
    fn test_psk_with_early_data() {
        let facts = Facts {
            psk_accepted: true,
            early_data_accepted: true,
            ..Facts::default()
        };
        let mut machine = Machine::<Server13State>::new();
        machine
            .received(Event::Handshake(HandshakeType::ClientHello), &facts)
            .unwrap();
        machine
            .sent(Event::Handshake(HandshakeType::ServerHello), &facts)
            .unwrap();
        machine
            .sent(Event::Handshake(HandshakeType::EncryptedExtensions), &facts)
            .unwrap();
        machine.sent(Event::Handshake(HandshakeType::Finished), &facts).unwrap();
        assert!(machine
            .received(Event::Handshake(HandshakeType::Finished), &facts)
            .is_err());
        machine
            .received(Event::Handshake(HandshakeType::EndOfEarlyData), &facts)
            .unwrap();
        machine
            .received(Event::Handshake(HandshakeType::Finished), &facts)
            .unwrap();
        machine
            .sent(Event::Handshake(HandshakeType::NewSessionTicket), &facts)
            .unwrap();
        assert!(machine.is_connected());
    }

    #[test]
    fn test_hello_retry_loop() {
        let facts = Facts::default();
        let mut machine = Machine::<Server13State>::new();
        machine
            .received(Event::Handshake(HandshakeType::ClientHello), &facts)
            .unwrap();
        machine.sent(Event::HelloRetryRequest, &facts).unwrap();
        assert!(machine
            .sent(Event::Handshake(HandshakeType::ServerHello), &facts)
            .is_err());
        machine
            .received(Event::Handshake(HandshakeType::ClientHello), &facts)
            .unwrap();
        machine
            .sent(Event::Handshake(HandshakeType::ServerHello), &facts)
            .unwrap();
    }
}
