//! Dispatcher contract for inbound commands.
//!
//! The connection manager decodes each inbound payload and hands the
//! command name and payload to a [`Dispatcher`]. What the command means is
//! entirely up to the application.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::debug;

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes a decoded inbound command to application logic.
///
/// Called on the manager's operate task, one command at a time. Long work
/// should be spawned rather than run inline, since dispatch holds up the
/// operate cycle.
pub trait Dispatcher: Send + Sync + 'static {
    /// Handles one command.
    fn handle(&self, command: &str, data: Option<Value>);
}

impl<F> Dispatcher for F
where
    F: Fn(&str, Option<Value>) + Send + Sync + 'static,
{
    fn handle(&self, command: &str, data: Option<Value>) {
        self(command, data);
    }
}

// ============================================================================
// NoopDispatcher
// ============================================================================

/// Dispatcher that logs and drops every command.
///
/// Used when no dispatcher is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl Dispatcher for NoopDispatcher {
    fn handle(&self, command: &str, _data: Option<Value>) {
        debug!(command, "No dispatcher configured, dropping command");
    }
}

// ============================================================================
// Tests
// ============================================================================
