//! Error types for the Neuro SDK link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use neuro_sdk_link::{ConnectionManager, OutgoingMessage, Result};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     manager.send_immediate(OutgoingMessage::new("actions/force")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Resolution | [`Error::NoEndpointFound`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::NotOpen`] |
//! | Send | [`Error::Send`] |
//! | Decode | [`Error::Decode`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |
//!
//! No error produced here is fatal to the host. The connection manager turns
//! each of them into a log line plus a recovery action.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by the manager builder when settings are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// No endpoint could be resolved from any source.
    ///
    /// Carries a remediation hint suited to the hosting environment.
    #[error("No WebSocket endpoint found: {remediation}")]
    NoEndpointFound {
        /// What the operator should configure.
        remediation: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The manager has shut down and no longer accepts commands.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An immediate send was attempted while the connection was not open.
    #[error("Connection is not open (state: {state})")]
    NotOpen {
        /// State observed when the send was rejected.
        state: String,
    },

    // ========================================================================
    // Send Errors
    // ========================================================================
    /// The transport rejected an outbound message.
    #[error("Send failed: {message}")]
    Send {
        /// Description of the send failure.
        message: String,
    },

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// An inbound payload could not be decoded into a command.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket protocol error, e.g. a failed close handshake.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the discovery request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a no-endpoint error with a remediation hint.
    #[inline]
    pub fn no_endpoint_found(remediation: impl Into<String>) -> Self {
        Self::NoEndpointFound {
            remediation: remediation.into(),
        }
    }

    /// Creates a not-open error for the given state.
    #[inline]
    pub fn not_open(state: impl ToString) -> Self {
        Self::NotOpen {
            state: state.to_string(),
        }
    }

    /// Creates a send error.
    #[inline]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a resolution error.
    #[inline]
    #[must_use]
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::NoEndpointFound { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::NotOpen { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the failure may go away on a later attempt.
    ///
    /// Resolution is retried from scratch on the next connect cycle and
    /// send failures on the next open connection.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoEndpointFound { .. }
                | Self::NotOpen { .. }
                | Self::Send { .. }
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
