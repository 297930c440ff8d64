//! Handshake state machines.
//!
//! One closed state enum per role and version. Each enum implements
//! [`StateTable`]: a fixed adjacency table that may consult connection
//! [`Facts`], plus the mapping from a sent or received message to the state
//! it leads to. [`Machine`] enforces the table and reports an illegal move
//! as a [`ProtocolFault`] instead of trapping.
//!
//! Two rules hold for every table: any state may return to idle (reset),
//! and idle is the only state that may transition to itself.

pub mod client12;
pub mod client13;
pub mod server12;
pub mod server13;

use core::fmt;

use tracing::debug;

use crate::error::ProtocolFault;
use crate::messages::HandshakeMessage;
use crate::protocol::HandshakeType;

pub use client12::Client12State;
pub use client13::Client13State;
pub use server12::Server12State;
pub use server13::Server13State;

/// Connection-level facts some transitions depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facts {
    /// The handshake resumes a cached session (TLS 1.2)
    pub resuming: bool,
    /// The negotiated suite sends a ServerKeyExchange (TLS 1.2)
    pub needs_server_key_exchange: bool,
    /// The server accepted a PSK (TLS 1.3)
    pub psk_accepted: bool,
    /// The server asked for a client certificate (TLS 1.3)
    pub certificate_requested: bool,
    /// The server accepted 0-RTT data (TLS 1.3)
    pub early_data_accepted: bool,
}

/// Something that moves a state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A handshake message of this type
    Handshake(HandshakeType),
    /// A ServerHello carrying the HelloRetryRequest random
    HelloRetryRequest,
    /// A ChangeCipherSpec record
    ChangeCipherSpec,
    /// A close_notify alert
    CloseNotify,
}

impl Event {
    /// The event a handshake message produces.
    pub fn of(message: &HandshakeMessage) -> Self {
        match message {
            HandshakeMessage::HelloRetryRequest(_) => Event::HelloRetryRequest,
            other => Event::Handshake(other.typ()),
        }
    }
}

/// Adjacency table of one role and version.
pub trait StateTable: Copy + Eq + fmt::Debug + Send + 'static {
    /// The start and reset state.
    const IDLE: Self;

    /// Every state, for exhaustive checks.
    const ALL: &'static [Self];

    /// Whether `self -> next` is in the table, ignoring the reset rules.
    fn permits(self, next: Self, facts: &Facts) -> bool;

    /// State reached by sending `event`, if the role ever sends it.
    fn on_send(event: Event) -> Option<Self>;

    /// State reached by receiving `event`, if the role ever receives it.
    fn on_receive(event: Event) -> Option<Self>;

    /// True in the state where application data flows.
    fn is_connected(self) -> bool;
}

/// A state machine over the table `S`.
#[derive(Debug, Clone)]
pub struct Machine<S: StateTable> {
    state: S,
}

impl<S: StateTable> Default for Machine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateTable> Machine<S> {
    /// A machine in the idle state.
    pub fn new() -> Self {
        Self { state: S::IDLE }
    }

    /// Current state.
    pub fn state(&self) -> S {
        self.state
    }

    /// Whether `next` may follow the current state.
    pub fn can_transition(&self, next: S, facts: &Facts) -> bool {
        next == S::IDLE || self.state.permits(next, facts)
    }

    /// Move to `next`, or report the illegal pair.
    pub fn transition(&mut self, next: S, facts: &Facts) -> Result<(), ProtocolFault> {
        if !self.can_transition(next, facts) {
            return Err(self.fault(format!("{:?}", next)));
        }
        debug!(from = ?self.state, to = ?next, "handshake state");
        self.state = next;
        Ok(())
    }

    /// Apply the state a sent event leads to.
    pub fn sent(&mut self, event: Event, facts: &Facts) -> Result<(), ProtocolFault> {
        match S::on_send(event) {
            Some(next) => self.transition(next, facts),
            None => Err(self.fault(format!("send {:?}", event))),
        }
    }

    /// Apply the state a received event leads to.
    pub fn received(&mut self, event: Event, facts: &Facts) -> Result<(), ProtocolFault> {
        match S::on_receive(event) {
            Some(next) => self.transition(next, facts),
            None => Err(self.fault(format!("receive {:?}", event))),
        }
    }

    /// Return to idle.
    pub fn reset(&mut self) {
        self.state = S::IDLE;
    }

    /// True in the connected state.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn fault(&self, to: String) -> ProtocolFault {
        ProtocolFault {
            from: format!("{:?}", self.state),
            to,
        }
    }
}

/// Every combination of facts, for exhaustive table tests.
#[cfg(test)]
pub(crate) fn all_facts() -> Vec<Facts> {
    (0u8..32)
        .map(|bits| Facts {
            resuming: bits & 1 != 0,
            needs_server_key_exchange: bits & 2 != 0,
            psk_accepted: bits & 4 != 0,
            certificate_requested: bits & 8 != 0,
            early_data_accepted: bits & 16 != 0,
        })
        .collect()
}

/// Check a table against an explicit edge list for every pair of states
/// under every combination of facts.
#[cfg(test)]
pub(crate) fn check_table<S: StateTable>(edges: &[(S, S, fn(&Facts) -> bool)]) {
    for facts in all_facts() {
        for &from in S::ALL {
            for &to in S::ALL {
                let listed = edges
                    .iter()
                    .any(|(f, t, guard)| *f == from && *t == to && guard(&facts));
                let expected = to == S::IDLE || listed;
                let machine = Machine { state: from };
                assert_eq!(
                    machine.can_transition(to, &facts),
                    expected,
                    "{:?} -> {:?} with {:?}",
                    from,
                    to,
                    facts
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn always(_: &Facts) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_names_both_states() {
        let mut machine = Machine::<Client12State>::new();
        let fault = machine
            .transition(Client12State::Connected, &Facts::default())
            .unwrap_err();
        assert_eq!(fault.from, "Idle");
        assert_eq!(fault.to, "Connected");
        assert_eq!(machine.state(), Client12State::Idle);
    }

    #[test]
    fn test_unmapped_event_is_fault() {
        let mut machine = Machine::<Server13State>::new();
        let fault = machine
            .received(Event::Handshake(HandshakeType::ServerHelloDone), &Facts::default())
            .unwrap_err();
        assert!(fault.to.contains("ServerHelloDone"));
    }

    #[test]
    fn test_reset_from_anywhere() {
        let facts = Facts::default();
        let mut machine = Machine::<Client13State>::new();
        machine.sent(Event::Handshake(HandshakeType::ClientHello), &facts).unwrap();
        machine.transition(Client13State::Idle, &facts).unwrap();
        machine.transition(Client13State::Idle, &facts).unwrap();
        assert_eq!(machine.state(), Client13State::Idle);
    }

    #[test]
    fn test_event_of_hello_retry_request() {
        use crate::cipher::CipherSuite;
        use crate::extensions::Extensions;
        use crate::messages::server_hello::HelloRetryRequest;

        let hrr = HandshakeMessage::HelloRetryRequest(HelloRetryRequest {
            session_id: Vec::new(),
            cipher_suite: CipherSuite::Tls13Aes128GcmSha256,
            extensions: Extensions::new(),
        });
        assert_eq!(Event::of(&hrr), Event::HelloRetryRequest);
        assert_eq!(
            Event::of(&HandshakeMessage::ServerHelloDone),
            Event::Handshake(HandshakeType::ServerHelloDone)
        );
    }
}
