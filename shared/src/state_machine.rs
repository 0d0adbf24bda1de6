//! Connection State Machine
//!
//! Defines the link states and which events may move between them.

use std::fmt;

/// State of the logical link to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; only an explicit connect leaves this state
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Caller asked for a connection
    ConnectRequested,
    /// Transport reported open
    Opened,
    /// Transport error, abnormal close, connect timeout or missed pong
    Lost {
        /// Auto-reconnect is enabled and attempts remain
        will_retry: bool,
    },
    /// Peer closed the link with a normal-closure code
    PeerClosed,
    /// Caller asked for disconnect
    DisconnectRequested,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed (or stayed, for idempotent events)
    Success {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Transition was invalid from current state
    Invalid {
        from: ConnectionState,
        event: LinkEvent,
    },
}

impl TransitionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The connection state machine
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    current_state: ConnectionState,
}

impl ConnectionStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkEvent) -> TransitionResult {
        let from = self.current_state;
        match next_state(from, event) {
            Some(to) => {
                self.current_state = to;
                TransitionResult::Success { from, to }
            }
            None => TransitionResult::Invalid { from, event },
        }
    }
}

/// Get the next state for a given event, if the transition is valid
fn next_state(from: ConnectionState, event: LinkEvent) -> Option<ConnectionState> {
    use ConnectionState::*;
    use LinkEvent::*;

    match (from, event) {
        (Disconnected | Failed, ConnectRequested) => Some(Connecting),

        (Connecting | Reconnecting, Opened) => Some(Connected),

        (Connecting | Connected | Reconnecting, Lost { will_retry: true }) => Some(Reconnecting),
        (Connecting | Connected | Reconnecting, Lost { will_retry: false }) => Some(Failed),

        (Connecting | Connected | Reconnecting, PeerClosed) => Some(Disconnected),

        // Disconnect is always honoured
        (_, DisconnectRequested) => Some(Disconnected),

        _ => None,
    }
}

/// Check if a transition from one state to another is generally valid
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    match (from, to) {
        (_, Disconnected) => true,
        (Disconnected | Failed, Connecting) => true,
        (Connecting | Reconnecting, Connected) => true,
        (Connecting | Connected | Reconnecting, Reconnecting | Failed) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = ConnectionStateMachine::new();
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_reconnect_flow() {
        let mut fsm = ConnectionStateMachine::new();

        fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(fsm.state(), ConnectionState::Connecting);

        fsm.process_event(LinkEvent::Opened);
        assert_eq!(fsm.state(), ConnectionState::Connected);

        fsm.process_event(LinkEvent::Lost { will_retry: true });
        assert_eq!(fsm.state(), ConnectionState::Reconnecting);

        // A failed retry keeps us reconnecting
        fsm.process_event(LinkEvent::Lost { will_retry: true });
        assert_eq!(fsm.state(), ConnectionState::Reconnecting);

        fsm.process_event(LinkEvent::Opened);
        assert_eq!(fsm.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_failed_is_terminal_until_connect() {
        let mut fsm = ConnectionStateMachine::new();
        fsm.process_event(LinkEvent::ConnectRequested);
        fsm.process_event(LinkEvent::Lost { will_retry: false });
        assert_eq!(fsm.state(), ConnectionState::Failed);

        let result = fsm.process_event(LinkEvent::Opened);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), ConnectionState::Failed);

        let result = fsm.process_event(LinkEvent::ConnectRequested);
        assert!(result.is_success());
        assert_eq!(fsm.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_peer_close_goes_to_disconnected() {
        let mut fsm = ConnectionStateMachine::new();
        fsm.process_event(LinkEvent::ConnectRequested);
        fsm.process_event(LinkEvent::Opened);
        fsm.process_event(LinkEvent::PeerClosed);
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_disconnect_from_any_state() {
        for setup in [
            vec![],
            vec![LinkEvent::ConnectRequested],
            vec![LinkEvent::ConnectRequested, LinkEvent::Opened],
            vec![LinkEvent::ConnectRequested, LinkEvent::Lost { will_retry: true }],
            vec![LinkEvent::ConnectRequested, LinkEvent::Lost { will_retry: false }],
        ] {
            let mut fsm = ConnectionStateMachine::new();
            for event in setup {
                fsm.process_event(event);
            }
            let result = fsm.process_event(LinkEvent::DisconnectRequested);
            assert!(result.is_success());
            assert_eq!(fsm.state(), ConnectionState::Disconnected);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        let mut fsm = ConnectionStateMachine::new();

        // Nothing to lose or open while disconnected
        assert!(!fsm.process_event(LinkEvent::Opened).is_success());
        assert!(!fsm.process_event(LinkEvent::Lost { will_retry: true }).is_success());
        assert_eq!(fsm.state(), ConnectionState::Disconnected);

        // Connect is not re-entrant
        fsm.process_event(LinkEvent::ConnectRequested);
        assert!(!fsm.process_event(LinkEvent::ConnectRequested).is_success());
    }

    #[test]
    fn test_every_machine_transition_is_valid() {
        use ConnectionState::*;
        let states = [Disconnected, Connecting, Connected, Reconnecting, Failed];
        let events = [
            LinkEvent::ConnectRequested,
            LinkEvent::Opened,
            LinkEvent::Lost { will_retry: true },
            LinkEvent::Lost { will_retry: false },
            LinkEvent::PeerClosed,
            LinkEvent::DisconnectRequested,
        ];
        for from in states {
            for event in events {
                if let Some(to) = next_state(from, event) {
                    assert!(is_valid_transition(from, to), "{from} -> {to} via {event:?}");
                }
            }
        }
    }
}
