//! Connection lifecycle management.
//!
//! # State Machine
//!
//! ```text
//!                 start / reconnect()
//!  Disconnected ───────────────────────► Connecting ──open──► Open
//!       ▲  ▲                                  │                 │
//!       │  └──── resolution failed ───────────┘                 │
//!       │                                                       │
//!       └──── error / close ── wait interval ── Connecting ◄────┘
//! ```
//!
//! Every attempt gets a fresh transport binding with a new
//! [`BindingId`](crate::transport::BindingId). Events and scheduled
//! reconnects that belong to an older binding are ignored.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Manager configuration and startup |
//! | `config` | Reconnect policy and timing |
//! | `manager` | Public handle |
//! | `state` | States and observer events |
//! | `worker` | Operate task owning the state |

// ============================================================================
// Submodules
// ============================================================================

/// Manager builder.
pub mod builder;

/// Manager settings.
pub mod config;

/// Public handle.
pub mod manager;

/// States and events.
pub mod state;

mod worker;

#[cfg(test)]
mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use config::{ConnectionConfig, ReconnectPolicy};
pub use manager::ConnectionManager;
pub use state::{ConnectionEvent, ConnectionState};
