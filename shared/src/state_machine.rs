//! Connection Lifecycle State Machine
//!
//! Defines the forward-only path from "no link" to "ready for command
//! traffic". `Failed` is terminal: nothing leaves it, the process restarts.

use std::fmt;

/// Stage of the connection sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    LinkPending,
    LinkUp,
    AddressPending,
    Resolving,
    TransportConnecting,
    HandshakePending,
    Ready,
    Failed,
}

impl ConnectionState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stimuli that drive the connection sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Association request issued
    Start,
    /// Association request rejected by the radio
    AssociationRejected,
    /// Link-up signal observed
    LinkUp,
    /// Started waiting for an address lease
    AwaitAddress,
    /// Address lease observed
    AddressAssigned,
    /// Backend hostname resolved to at least one candidate
    Resolved,
    /// Backend hostname could not be resolved
    ResolutionFailed,
    /// A candidate address accepted the transport connection
    TransportConnected,
    /// Every candidate address refused the transport connection
    CandidatesExhausted,
    /// Message-channel upgrade succeeded
    HandshakeComplete,
    /// Message-channel upgrade failed or timed out
    HandshakeFailed,
    /// Wireless link dropped while ready
    LinkLost,
    /// Receive loop reported a closed or broken channel
    ChannelFailed,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(ConnectionState),
    /// Transition was invalid from current state; state is unchanged
    Invalid {
        from: ConnectionState,
        event: LifecycleEvent,
    },
}

/// The connection lifecycle state machine
#[derive(Debug)]
pub struct ConnectionStateMachine {
    current_state: ConnectionState,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            current_state: ConnectionState::Idle,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LifecycleEvent) -> TransitionResult {
        match next_state(self.current_state, event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }
}

/// Get the next state for a given event, if the transition is valid
fn next_state(from: ConnectionState, event: LifecycleEvent) -> Option<ConnectionState> {
    use ConnectionState as S;
    use LifecycleEvent as E;

    match (from, event) {
        (S::Idle, E::Start) => Some(S::LinkPending),

        (S::LinkPending, E::LinkUp) => Some(S::LinkUp),
        (S::LinkPending, E::AssociationRejected) => Some(S::Failed),

        (S::LinkUp, E::AwaitAddress) => Some(S::AddressPending),

        (S::AddressPending, E::AddressAssigned) => Some(S::Resolving),

        (S::Resolving, E::Resolved) => Some(S::TransportConnecting),
        (S::Resolving, E::ResolutionFailed) => Some(S::Failed),

        (S::TransportConnecting, E::TransportConnected) => Some(S::HandshakePending),
        (S::TransportConnecting, E::CandidatesExhausted) => Some(S::Failed),

        (S::HandshakePending, E::HandshakeComplete) => Some(S::Ready),
        (S::HandshakePending, E::HandshakeFailed) => Some(S::Failed),

        (S::Ready, E::LinkLost | E::ChannelFailed) => Some(S::Failed),

        _ => None,
    }
}

/// Check if a direct move from one state to another appears in the table
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState as S;

    match (from, to) {
        (S::Idle, S::LinkPending)
        | (S::LinkPending, S::LinkUp)
        | (S::LinkUp, S::AddressPending)
        | (S::AddressPending, S::Resolving)
        | (S::Resolving, S::TransportConnecting)
        | (S::TransportConnecting, S::HandshakePending)
        | (S::HandshakePending, S::Ready) => true,

        (
            S::LinkPending | S::Resolving | S::TransportConnecting | S::HandshakePending | S::Ready,
            S::Failed,
        ) => true,

        _ => false,
    }
}
