//! Connection manager settings.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Wait between a lost connection and the next attempt.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Operate cycle period, roughly one frame at 60 Hz.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Buffered observer events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// How long to wait before reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same wait every time.
    Fixed(Duration),
    /// Doubling wait from `base`, capped at `max`, reset once a connection
    /// opens.
    Backoff {
        /// First wait, and the minimum for every wait.
        base: Duration,
        /// Upper bound.
        max: Duration,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl ReconnectPolicy {
    /// Wait before reconnect number `attempt` (0-based since last open).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(interval) => interval,
            Self::Backoff { base, max } => {
                let factor = 2u32.saturating_pow(attempt);
                base.saturating_mul(factor).min(max).max(base)
            }
        }
    }

    fn base(&self) -> Duration {
        match *self {
            Self::Fixed(interval) => interval,
            Self::Backoff { base, .. } => base,
        }
    }

    /// Checks the policy can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero wait or an inverted range.
    pub fn validate(&self) -> Result<()> {
        if self.base().is_zero() {
            return Err(Error::config("Reconnect interval must be greater than zero"));
        }
        if let Self::Backoff { base, max } = *self
            && max < base
        {
            return Err(Error::config(format!(
                "Reconnect backoff max ({max:?}) is below base ({base:?})"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Settings consumed by the operate task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Game name stamped on outgoing messages.
    pub game: Option<String>,
    /// Reconnect wait policy.
    pub reconnect: ReconnectPolicy,
    /// Operate cycle period.
    pub tick_interval: Duration,
    /// Observer channel capacity.
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            game: None,
            reconnect: ReconnectPolicy::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    /// Validates every setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.reconnect.validate()?;

        if self.tick_interval.is_zero() {
            return Err(Error::config("Tick interval must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(Error::config("Event capacity must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
