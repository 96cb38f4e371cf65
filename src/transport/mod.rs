//! Transport binding layer.
//!
//! A transport binding is one socket-like channel for one connection
//! attempt. The connection manager creates a fresh binding per attempt
//! through a [`TransportFactory`] and never reuses it.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────────┐   (BindingId, TransportEvent)   ┌──────────────────┐
//! │  Binding task    │ ──────────── mpsc ────────────► │  Operate task    │
//! │  (any thread)    │                                 │  (owns state)    │
//! └──────────────────┘                                 └──────────────────┘
//! ```
//!
//! Bindings never touch connection state. They push events into an
//! [`EventSink`] tagged with their [`BindingId`]; the operate task drops
//! events whose id is not the current one.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Event types, close codes, binding identity |
//! | `websocket` | Default binding over `tokio-tungstenite` |

// ============================================================================
// Submodules
// ============================================================================

/// Transport events and binding identity.
pub mod event;

/// WebSocket binding.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{BindingId, CloseCode, EventSink, TransportError, TransportErrorKind, TransportEvent};
pub use websocket::{WebSocketTransport, WebSocketTransportFactory};

// ============================================================================
// Transport
// ============================================================================

/// A socket-like channel for a single connection attempt.
///
/// # Contract
///
/// - `connect` initiates the attempt and returns promptly. Progress is
///   reported through the sink: `Open` on success, `Error` then `Close` on
///   failure.
/// - `send` delivers one text frame or fails.
/// - `close` is best-effort; the caller discards its error.
/// - Events may be emitted from any task or thread.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Starts connecting to `url`, reporting progress through `events`.
    async fn connect(&self, url: &str, events: EventSink);

    /// Sends one text frame.
    async fn send(&self, text: String) -> Result<()>;

    /// Closes the channel.
    async fn close(&self) -> Result<()>;
}

// ============================================================================
// TransportFactory
// ============================================================================

/// Creates one fresh [`Transport`] per connection attempt.
pub trait TransportFactory: Send + Sync + 'static {
    /// Creates a new, unconnected binding.
    fn create(&self) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Arc<dyn Transport> + Send + Sync + 'static,
{
    fn create(&self) -> Arc<dyn Transport> {
        self()
    }
}
