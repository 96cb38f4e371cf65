//! Wire message types and the dispatch contract.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `OutgoingMessage` | Local → Remote | Command produced by the application |
//! | `IncomingMessage` | Remote → Local | Command routed to the [`Dispatcher`] |
//!
//! Every message is a JSON object with a string `command` and an arbitrary
//! `data` field.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatch` | Dispatcher trait for inbound commands |
//! | `message` | Envelope types and decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Dispatcher contract.
pub mod dispatch;

/// Envelope types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatch::{Dispatcher, NoopDispatcher};
pub use message::{IncomingMessage, OutgoingMessage};
