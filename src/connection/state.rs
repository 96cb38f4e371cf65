//! Connection state and observable events.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::transport::CloseCode;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the managed connection.
///
/// Written only by the operate task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No live binding.
    #[default]
    Disconnected,
    /// Resolving the endpoint or waiting for the handshake.
    Connecting,
    /// Handshake complete; the outbound queue is drained every tick.
    Open,
    /// Tearing down the previous binding before a new attempt.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if messages can be sent.
    #[inline]
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
        })
    }
}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Notification broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The current binding opened.
    Connected,
    /// The current binding reported an error.
    Error(String),
    /// The current binding closed with the given code.
    Disconnected(CloseCode),
}

// ============================================================================
// Tests
// ============================================================================
