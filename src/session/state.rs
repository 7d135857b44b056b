use std::fmt;

use serde::Serialize;

// --- FSM Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A login attempt (or identity swap) started.
    Login,
    /// The connection reported itself ready.
    Ready,
    LoginFailed,
    /// The remote side went away.
    Disconnected,
    Disable,
    Destroy,
}

// --- FSM Implementation ---

impl ConnectionState {
    pub fn on_event(self, event: Event) -> ConnectionState {
        match (self, event) {
            // Terminal
            (ConnectionState::Destroyed, _) => ConnectionState::Destroyed,
            (_, Event::Destroy) => ConnectionState::Destroyed,

            (_, Event::Login) => ConnectionState::Connecting,
            (_, Event::Ready) => ConnectionState::Connected,

            (ConnectionState::Connecting, Event::LoginFailed) => ConnectionState::Disconnected,

            (_, Event::Disconnected) | (_, Event::Disable) => ConnectionState::Disconnected,

            // Default: remain in current state
            (state, _) => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, ConnectionState::Destroyed)
    }

    /// States in which the session owns no subscriptions and no timers.
    pub fn is_released(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Destroyed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
