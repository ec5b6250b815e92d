//! Connection lifecycle state machine
//!
//! [`ConnectionState::on_event`] is a pure transition function. The
//! connection manager feeds it events under a single lock and performs the
//! returned [`Action`]; a `None` result means the event does not move the
//! machine and nobody is notified.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Never connected
    #[default]
    None,
    /// First connection attempt in flight
    Connecting,
    /// Socket established and streaming
    Open,
    /// Socket lost, reconnecting in the background
    Retrying,
    /// Attempt failed or a fatal fault ended the session; `connect` may be called again
    Closed,
    /// Closed by the owner; terminal
    Stopped,
}

/// Severity of a socket fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Worth reconnecting
    Transient,
    /// Reconnecting cannot help
    Fatal,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Owner asked for a connection
    ConnectRequested,
    /// Handshake completed
    Established,
    /// Handshake failed or timed out
    AttemptFailed(FaultKind),
    /// Established socket went away
    Dropped(FaultKind),
    /// Bounded reconnection loop gave up
    RetriesExhausted,
    /// Owner closed the client
    StopRequested,
}

/// Side effect the connection manager performs for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start a handshake
    OpenSocket,
    /// Send the start sentinel and spawn the per-connection tasks
    StartPipeline,
    /// Wait for the retry policy, then attempt again
    ScheduleRetry,
    /// Hand the fault to the caller
    SurfaceError,
    /// Cancel every task and drop the socket
    Teardown,
}

/// Result of a successful [`ConnectionState::on_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub next: ConnectionState,
    /// Side effect to perform
    pub action: Action,
}

impl Transition {
    fn to(next: ConnectionState, action: Action) -> Option<Self> {
        Some(Self { next, action })
    }
}

impl ConnectionState {
    /// Apply `event`, returning the transition if the state changes
    pub fn on_event(self, event: ConnectionEvent) -> Option<Transition> {
        use Action::*;
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Stopped, _) => Option::None,
            (_, StopRequested) => Transition::to(Stopped, Teardown),

            (None | Closed, ConnectRequested) => Transition::to(Connecting, OpenSocket),

            (Connecting | Retrying, Established) => Transition::to(Open, StartPipeline),
            (Connecting, AttemptFailed(_)) => Transition::to(Closed, SurfaceError),

            (Open, Dropped(FaultKind::Transient)) => Transition::to(Retrying, ScheduleRetry),
            (Open, Dropped(FaultKind::Fatal)) => Transition::to(Closed, SurfaceError),

            (Retrying, AttemptFailed(FaultKind::Fatal) | RetriesExhausted) => {
                Transition::to(Closed, SurfaceError)
            }

            _ => Option::None,
        }
    }

    /// A socket exists or is being re-established
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Retrying)
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        *self == ConnectionState::Stopped
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::None => "NONE",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Retrying => "RETRYING",
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}
