//! Transport events, close codes and binding identity.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{self, ErrorKind};

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::UrlError;

// ============================================================================
// BindingId
// ============================================================================

/// Identity of one transport binding.
///
/// Assigned by the connection manager, strictly increasing per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(u64);

impl BindingId {
    /// Creates an id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the id that follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// CloseCode
// ============================================================================

/// WebSocket close status code (RFC 6455 Section 7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint going away.
    pub const AWAY: Self = Self(1001);
    /// Close frame carried no status.
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);

    /// Returns `true` for 1006, the code reported when the link drops
    /// or the server was never reached.
    #[inline]
    #[must_use]
    pub fn is_abnormal(self) -> bool {
        self == Self::ABNORMAL
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TransportError
// ============================================================================

/// Classification of a transport error, used only to pick a log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The remote server could not be reached.
    Unreachable,
    /// Anything else.
    Other,
}

/// Error reported by a binding through [`TransportEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Classification.
    pub kind: TransportErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// Creates an unreachable-server error.
    #[inline]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Unreachable,
            message: message.into(),
        }
    }

    /// Creates an unclassified error.
    #[inline]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            message: message.into(),
        }
    }

    /// Returns `true` if the server could not be reached.
    #[inline]
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.kind == TransportErrorKind::Unreachable
    }
}

impl From<&WsError> for TransportError {
    fn from(err: &WsError) -> Self {
        match err {
            WsError::Io(io) if is_unreachable_io(io) => Self::unreachable(err.to_string()),
            WsError::Url(UrlError::UnableToConnect(_)) => Self::unreachable(err.to_string()),
            _ => Self::other(err.to_string()),
        }
    }
}

/// Socket failures meaning nothing answered at the address.
///
/// Name resolution failures carry no dedicated kind on every platform, so
/// they are recognised by the resolver's message.
fn is_unreachable_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::AddrNotAvailable
            | ErrorKind::TimedOut
            | ErrorKind::NotFound
    ) || err.to_string().contains("failed to lookup address")
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Event reported by a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is open.
    Open,
    /// A payload arrived. The bytes are owned by the event.
    Message(Vec<u8>),
    /// Something went wrong.
    Error(TransportError),
    /// The channel closed.
    Close(CloseCode),
}

// ============================================================================
// EventSink
// ============================================================================

/// Sender half handed to a binding, stamping every event with its id.
#[derive(Debug, Clone)]
pub struct EventSink {
    binding: BindingId,
    tx: mpsc::UnboundedSender<(BindingId, TransportEvent)>,
}

impl EventSink {
    /// Creates a sink for `binding`.
    #[inline]
    #[must_use]
    pub fn new(binding: BindingId, tx: mpsc::UnboundedSender<(BindingId, TransportEvent)>) -> Self {
        Self { binding, tx }
    }

    /// Returns the id stamped on events from this sink.
    #[inline]
    #[must_use]
    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// Emits an event. Returns `false` if the manager is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.binding, event)).is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
