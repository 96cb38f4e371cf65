//! Neuro SDK Link - self-healing WebSocket link for game integrations.
//!
//! This library keeps one persistent, auto-reconnecting WebSocket
//! connection to a command server and arbitrates message flow between
//! application threads and the network.
//!
//! # Architecture
//!
//! - **Endpoint resolution**: launch URL parameter → discovery request →
//!   environment variable, re-run on every connect attempt
//! - **Operate task**: one tokio task owns the connection state; transport
//!   callbacks and host commands reach it over channels
//! - **Outbound queue**: producers enqueue from any thread; the operate task
//!   drains it every tick and requeues failures
//! - **Dispatcher**: inbound `{command, data}` payloads are routed to
//!   application code
//!
//! # Quick Start
//!
//! ```no_run
//! use neuro_sdk_link::{ConnectionManager, OutgoingMessage, Result};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Endpoint comes from NEURO_SDK_WS_URL unless a launch location is set
//!     let manager = ConnectionManager::builder()
//!         .game("Tic Tac Toe")
//!         .dispatcher(|command: &str, data: Option<Value>| {
//!             println!("{command}: {data:?}");
//!         })
//!         .start()?;
//!
//!     // Delivered once the connection opens, retried on failure
//!     manager.send(OutgoingMessage::new("startup"));
//!     manager.send(OutgoingMessage::with_data(
//!         "context",
//!         json!({ "message": "Game started", "silent": true }),
//!     ));
//!
//!     let _ = tokio::signal::ctrl_c().await;
//!     manager.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | Connection manager, state machine, builder |
//! | [`endpoint`] | Layered endpoint resolution |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Message envelopes and the [`Dispatcher`] contract |
//! | [`queue`] | Thread-safe outbound queue |
//! | [`transport`] | Transport binding contract and WebSocket binding |

// ============================================================================
// Modules
// ============================================================================

/// Connection lifecycle management.
///
/// Use [`ConnectionManager::builder()`] to configure and start a manager.
pub mod connection;

/// Endpoint resolution from launch location, discovery and environment.
pub mod endpoint;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Message envelopes and dispatch.
pub mod protocol;

/// Outbound message queue.
pub mod queue;

/// Transport binding layer.
///
/// Implement [`transport::Transport`] to plug in a different socket.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{
    ConnectionEvent, ConnectionManager, ConnectionManagerBuilder, ConnectionState,
    ReconnectPolicy,
};

// Endpoint types
pub use endpoint::{
    EnvScope, Endpoint, EndpointResolver, EndpointSource, EnvironmentSource, ResolverConfig,
    StaticEnvironment, SystemEnvironment,
};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{Dispatcher, IncomingMessage, OutgoingMessage};

// Queue
pub use queue::OutboundQueue;

// Transport types
pub use transport::{
    CloseCode, Transport, TransportError, TransportEvent, TransportFactory, WebSocketTransport,
};
