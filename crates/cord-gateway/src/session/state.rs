//! Session lifecycle states

use crate::error::TransportError;
use crate::protocol::CloseFrame;

/// Where a shard is in its connect / reconnect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Fresh,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    Connected,
    Disconnecting,
    RetryWaiting,
    Terminated,
}

impl SessionState {
    /// A transport is open or being opened
    #[must_use]
    pub const fn has_transport(self) -> bool {
        matches!(
            self,
            Self::Connecting
                | Self::AwaitingHello
                | Self::Identifying
                | Self::Resuming
                | Self::Connected
        )
    }

    /// HELLO was processed and heartbeats are running
    #[must_use]
    pub const fn is_heartbeating(self) -> bool {
        matches!(self, Self::Identifying | Self::Resuming | Self::Connected)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fresh => "Fresh",
            Self::Connecting => "Connecting",
            Self::AwaitingHello => "AwaitingHello",
            Self::Identifying => "Identifying",
            Self::Resuming => "Resuming",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::RetryWaiting => "RetryWaiting",
            Self::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a transport step, fed back into the state machine
#[derive(Debug, Clone)]
pub enum ConnectionOutcome {
    /// Handshake completed, no application data exchanged yet
    Opened,
    /// Peer closed with a code
    Closed(CloseFrame),
    /// Connect or I/O failure
    Failed(TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fresh() {
        assert_eq!(SessionState::default(), SessionState::Fresh);
    }

    #[test]
    fn test_transport_states() {
        assert!(SessionState::Connecting.has_transport());
        assert!(SessionState::Connected.has_transport());
        assert!(!SessionState::RetryWaiting.has_transport());
        assert!(!SessionState::Terminated.has_transport());
    }

    #[test]
    fn test_heartbeating_states() {
        assert!(!SessionState::AwaitingHello.is_heartbeating());
        assert!(SessionState::Resuming.is_heartbeating());
    }
}
