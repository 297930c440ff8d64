//! TLS 1.3 client states.
//!
//! ```text
//! Idle -> ClientHelloSent -> [HelloRetryRequestReceived -> ClientHelloSent]
//!      -> ServerHelloReceived -> EncryptedExtensionsReceived
//!      -> [CertificateRequestReceived] -> CertificateReceived
//!      -> CertificateVerifyReceived -> FinishedReceived        (no PSK)
//!      -> FinishedReceived                                      (PSK)
//!      -> [EndOfEarlyDataSent] -> [CertificateSent] -> FinishedSent -> Connected
//! ```

use super::{Event, Facts, StateTable};
use crate::protocol::HandshakeType;

/// TLS 1.3 client handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Client13State {
    /// Nothing sent yet
    Idle,
    /// ClientHello sent
    ClientHelloSent,
    /// HelloRetryRequest received
    HelloRetryRequestReceived,
    /// ServerHello received
    ServerHelloReceived,
    /// EncryptedExtensions received
    EncryptedExtensionsReceived,
    /// CertificateRequest received
    CertificateRequestReceived,
    /// Server Certificate received
    CertificateReceived,
    /// Server CertificateVerify received
    CertificateVerifyReceived,
    /// Server Finished received
    FinishedReceived,
    /// EndOfEarlyData sent
    EndOfEarlyDataSent,
    /// Client Certificate sent
    CertificateSent,
    /// Client Finished sent
    FinishedSent,
    /// Handshake complete
    Connected,
    /// NewSessionTicket received
    NewSessionTicketReceived,
    /// close_notify received
    CloseReceived,
    /// close_notify sent
    CloseSent,
}

impl StateTable for Client13State {
    const IDLE: Self = Client13State::Idle;

    const ALL: &'static [Self] = &[
        Client13State::Idle,
        Client13State::ClientHelloSent,
        Client13State::HelloRetryRequestReceived,
        Client13State::ServerHelloReceived,
        Client13State::EncryptedExtensionsReceived,
        Client13State::CertificateRequestReceived,
        Client13State::CertificateReceived,
        Client13State::CertificateVerifyReceived,
        Client13State::FinishedReceived,
        Client13State::EndOfEarlyDataSent,
        Client13State::CertificateSent,
        Client13State::FinishedSent,
        Client13State::Connected,
        Client13State::NewSessionTicketReceived,
        Client13State::CloseReceived,
        Client13State::CloseSent,
    ];

    fn permits(self, next: Self, facts: &Facts) -> bool {
        use Client13State::*;
        let early = facts.early_data_accepted;
        let requested = facts.certificate_requested;
        match (self, next) {
            (Idle, ClientHelloSent) => true,
            (ClientHelloSent, ServerHelloReceived | HelloRetryRequestReceived) => true,
            (HelloRetryRequestReceived, ClientHelloSent) => true,
            (ServerHelloReceived, EncryptedExtensionsReceived) => true,
            (EncryptedExtensionsReceived, FinishedReceived) => facts.psk_accepted,
            (EncryptedExtensionsReceived, CertificateRequestReceived | CertificateReceived) => {
                !facts.psk_accepted
            },
            (CertificateRequestReceived, CertificateReceived) => true,
            (CertificateReceived, CertificateVerifyReceived) => true,
            (CertificateVerifyReceived, FinishedReceived) => true,
            (FinishedReceived, EndOfEarlyDataSent) => early,
            (FinishedReceived, CertificateSent) => !early && requested,
            (FinishedReceived, FinishedSent) => !early && !requested,
            (EndOfEarlyDataSent, CertificateSent) => requested,
            (EndOfEarlyDataSent, FinishedSent) => !requested,
            (CertificateSent, FinishedSent) => true,
            (FinishedSent, Connected) => true,
            (Connected, CloseReceived | CloseSent | NewSessionTicketReceived) => true,
            (
                NewSessionTicketReceived,
                Connected | NewSessionTicketReceived | CloseReceived | CloseSent,
            ) => true,
            _ => false,
        }
    }

    fn on_send(event: Event) -> Option<Self> {
        use Client13State::*;
        match event {
            Event::Handshake(HandshakeType::ClientHello) => Some(ClientHelloSent),
            Event::Handshake(HandshakeType::EndOfEarlyData) => Some(EndOfEarlyDataSent),
            Event::Handshake(HandshakeType::Certificate) => Some(CertificateSent),
            Event::Handshake(HandshakeType::Finished) => Some(FinishedSent),
            Event::CloseNotify => Some(CloseSent),
            _ => None,
        }
    }

    fn on_receive(event: Event) -> Option<Self> {
        use Client13State::*;
        match event {
            Event::Handshake(HandshakeType::ServerHello) => Some(ServerHelloReceived),
            Event::HelloRetryRequest => Some(HelloRetryRequestReceived),
            Event::Handshake(HandshakeType::EncryptedExtensions) => {
                Some(EncryptedExtensionsReceived)
            },
            Event::Handshake(HandshakeType::CertificateRequest) => {
                Some(CertificateRequestReceived)
            },
            Event::Handshake(HandshakeType::Certificate) => Some(CertificateReceived),
            Event::Handshake(HandshakeType::CertificateVerify) => Some(CertificateVerifyReceived),
            Event::Handshake(HandshakeType::Finished) => Some(FinishedReceived),
            Event::Handshake(HandshakeType::NewSessionTicket) => Some(NewSessionTicketReceived),
            Event::CloseNotify => Some(CloseReceived),
            _ => None,
        }
    }

    fn is_connected(self) -> bool {
        matches!(
            self,
            Client13State::Connected | Client13State::NewSessionTicketReceived
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{always, check_table, Machine};
    use Client13State::*;

    #[test]
    fn test_table_is_exact() {
        check_table::<Client13State>(&[
            (Idle, ClientHelloSent, always),
            (ClientHelloSent, ServerHelloReceived, always),
            (ClientHelloSent, HelloRetryRequestReceived, always),
            (HelloRetryRequestReceived, ClientHelloSent, always),
            (ServerHelloReceived, EncryptedExtensionsReceived, always),
            (EncryptedExtensionsReceived, FinishedReceived, |f| f.psk_accepted),
            (EncryptedExtensionsReceived, CertificateRequestReceived, |f| !f.psk_accepted),
            (EncryptedExtensionsReceived, CertificateReceived, |f| !f.psk_accepted),
            (CertificateRequestReceived, CertificateReceived, always),
            (CertificateReceived, CertificateVerifyReceived, always),
            (CertificateVerifyReceived, FinishedReceived, always),
            (FinishedReceived, EndOfEarlyDataSent, |f| f.early_data_accepted),
            (FinishedReceived, CertificateSent, |f| {
                !f.early_data_accepted && f.certificate_requested
            }),
            (FinishedReceived, FinishedSent, |f| {
                !f.early_data_accepted && !f.certificate_requested
            }),
            (EndOfEarlyDataSent, CertificateSent, |f| f.certificate_requested),
            (EndOfEarlyDataSent, FinishedSent, |f| !f.certificate_requested),
            (CertificateSent, FinishedSent, always),
            (FinishedSent, Connected, always),
            (Connected, CloseReceived, always),
            (Connected, CloseSent, always),
            (Connected, NewSessionTicketReceived, always),
            (NewSessionTicketReceived, Connected, always),
            (NewSessionTicketReceived, NewSessionTicketReceived, always),
            (NewSessionTicketReceived, CloseReceived, always),
            (NewSessionTicketReceived, CloseSent, always),
        ]);
    }

    #[test]
    fn test_hello_retry_then_full_handshake() {
        let facts = Facts::default();
        let mut machine = Machine::<Client13State>::new();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        machine.received(Event::HelloRetryRequest, &facts).unwrap();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        for typ in [
            HandshakeType::ServerHello,
            HandshakeType::EncryptedExtensions,
            HandshakeType::Certificate,
            HandshakeType::CertificateVerify,
            HandshakeType::Finished,
        ] {
            machine.received(Event::Handshake(typ), &facts).unwrap();
        }
        machine.sent(Event::Handshake(HandshakeType::Finished), &facts).unwrap();
        machine.transition(Connected, &facts).unwrap();
        machine
            .received(Event::Handshake(HandshakeType::NewSessionTicket), &facts)
            .unwrap();
        assert!(machine.is_connected());
    }

    #[test]
    fn test_psk_skips_certificate() {
        let facts = Facts {
            psk_accepted: true,
            ..Facts::default()
        };
        let mut machine = Machine::<Client13State>::new();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        machine
            .received(Event::Handshake(HandshakeType::ServerHello), &facts)
            .unwrap();
        machine
            .received(Event::Handshake(HandshakeType::EncryptedExtensions), &facts)
            .unwrap();
        assert!(!machine.can_transition(CertificateReceived, &facts));
        machine
            .received(Event::Handshake(HandshakeType::Finished), &facts)
            .unwrap();
    }

    #[test]
    fn test_second_hello_retry_is_rejected() {
        let facts = Facts::default();
        let mut machine = Machine::<Client13State>::new();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        machine.received(Event::HelloRetryRequest, &facts).unwrap();
        assert!(machine.received(Event::HelloRetryRequest, &facts).is_err());
    }
}
