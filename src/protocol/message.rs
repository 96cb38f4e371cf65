//! Outgoing and incoming message types.
//!
//! # Format
//!
//! Both directions share one envelope:
//!
//! ```json
//! {
//!   "command": "actions/register",
//!   "game": "My Game",
//!   "data": { ... }
//! }
//! ```
//!
//! `game` is only written on outgoing messages and only when configured.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// OutgoingMessage
// ============================================================================

/// A message produced by the application for the remote end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    /// Command name understood by the remote end.
    pub command: String,

    /// Game name, stamped by the manager when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,

    /// Command payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OutgoingMessage {
    /// Creates a message with no payload.
    #[inline]
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            game: None,
            data: None,
        }
    }

    /// Creates a message with a payload.
    #[inline]
    #[must_use]
    pub fn with_data(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            game: None,
            data: Some(data),
        }
    }

    /// Serializes the message, stamping `game` if it is not already set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn encode(&self, game: Option<&str>) -> Result<String> {
        if self.game.is_some() || game.is_none() {
            return Ok(serde_json::to_string(self)?);
        }

        let stamped = Self {
            game: game.map(str::to_string),
            ..self.clone()
        };
        Ok(serde_json::to_string(&stamped)?)
    }
}

// ============================================================================
// IncomingMessage
// ============================================================================

/// A command received from the remote end.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncomingMessage {
    /// Command name.
    pub command: String,

    /// Optional payload, passed to the dispatcher untouched.
    #[serde(default)]
    pub data: Option<Value>,
}

impl IncomingMessage {
    /// Decodes raw transport bytes into a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not UTF-8, not a JSON
    /// object, or lack a string `command` field.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::decode(format!("payload is not UTF-8: {e}")))?;
        Self::parse(text)
    }

    /// Parses a text payload into a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `command` is missing or not a string.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::decode(format!("{e}: {text}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
