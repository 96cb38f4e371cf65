//! Builder pattern for connection manager configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use neuro_sdk_link::ConnectionManager;
//!
//! # async fn example() -> neuro_sdk_link::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .game("Tic Tac Toe")
//!     .reconnect_interval(Duration::from_secs(3))
//!     .dispatcher(|command: &str, _data: Option<serde_json::Value>| {
//!         println!("received {command}");
//!     })
//!     .start()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;
use url::Url;

use crate::endpoint::{EndpointResolver, EnvironmentSource, ResolverConfig, SystemEnvironment};
use crate::error::{Error, Result};
use crate::protocol::{Dispatcher, NoopDispatcher};
use crate::queue::OutboundQueue;
use crate::transport::{TransportFactory, WebSocketTransportFactory};

use super::config::{ConnectionConfig, ReconnectPolicy};
use super::manager::ConnectionManager;
use super::state::ConnectionState;
use super::worker::{Command, Worker};

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create one. [`start`](Self::start)
/// consumes the builder and spawns the single operate task that backs every
/// clone of the returned handle.
pub struct ConnectionManagerBuilder {
    config: ConnectionConfig,
    resolver: ResolverConfig,
    environment: Arc<dyn EnvironmentSource>,
    factory: Arc<dyn TransportFactory>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Default for ConnectionManagerBuilder {
    fn default() -> Self {
        Self {
            config: ConnectionConfig::default(),
            resolver: ResolverConfig::default(),
            environment: Arc::new(SystemEnvironment::new()),
            factory: Arc::new(WebSocketTransportFactory),
            dispatcher: Arc::new(NoopDispatcher),
        }
    }
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the location the process was launched from.
    ///
    /// Enables the launch parameter and discovery sources.
    #[inline]
    #[must_use]
    pub fn launch_location(mut self, location: impl Into<String>) -> Self {
        self.resolver.launch_location = Some(location.into());
        self
    }

    /// Sets the game name stamped on outgoing messages.
    #[inline]
    #[must_use]
    pub fn game(mut self, name: impl Into<String>) -> Self {
        self.config.game = Some(name.into());
        self
    }

    /// Uses a fixed reconnect interval.
    #[inline]
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect = ReconnectPolicy::Fixed(interval);
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Sets the operate cycle period.
    #[inline]
    #[must_use]
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Sets the observer channel capacity.
    #[inline]
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Sets the launch query key (default `WebSocketURL`).
    #[inline]
    #[must_use]
    pub fn parameter_key(mut self, key: impl Into<String>) -> Self {
        self.resolver.parameter_key = key.into();
        self
    }

    /// Sets the environment variable name (default `NEURO_SDK_WS_URL`).
    #[inline]
    #[must_use]
    pub fn variable_name(mut self, name: impl Into<String>) -> Self {
        self.resolver.variable_name = name.into();
        self
    }

    /// Sets the discovery request timeout.
    #[inline]
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.resolver.discovery_timeout = timeout;
        self
    }

    /// Sets the environment source.
    #[inline]
    #[must_use]
    pub fn environment(mut self, environment: impl EnvironmentSource) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    /// Sets the transport factory (default: WebSocket).
    #[inline]
    #[must_use]
    pub fn transport_factory(mut self, factory: impl TransportFactory) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Sets the inbound command dispatcher.
    #[inline]
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Validates the settings, spawns the operate task and starts the first
    /// connect cycle.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a setting is invalid
    /// - [`Error::Http`] if the discovery client cannot be built
    pub fn start(self) -> Result<ConnectionManager> {
        self.validate()?;

        let resolver = EndpointResolver::with_environment(self.resolver, self.environment)?;
        let queue = Arc::new(OutboundQueue::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (resolution_tx, resolution_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(self.config.event_capacity);

        let worker = Worker::new(
            self.config,
            resolver,
            self.factory,
            self.dispatcher,
            Arc::clone(&queue),
            state_tx,
            events_tx.clone(),
            transport_tx,
            resolution_tx,
        );
        tokio::spawn(worker.run(command_rx, transport_rx, resolution_rx));

        // Receiver is alive: the task was just spawned with it.
        let _ = command_tx.send(Command::Connect);
        debug!("Connection manager started");

        Ok(ConnectionManager::new(command_tx, queue, state_rx, events_tx))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionManagerBuilder {
    fn validate(&self) -> Result<()> {
        self.config.validate()?;

        if self.resolver.parameter_key.trim().is_empty() {
            return Err(Error::config(
                "Launch parameter key must not be empty.\n\
                 Example: ConnectionManager::builder().parameter_key(\"WebSocketURL\")",
            ));
        }
        if self.resolver.variable_name.trim().is_empty() {
            return Err(Error::config(
                "Environment variable name must not be empty.\n\
                 Example: ConnectionManager::builder().variable_name(\"NEURO_SDK_WS_URL\")",
            ));
        }
        if self.resolver.discovery_timeout.is_zero() {
            return Err(Error::config("Discovery timeout must be greater than zero"));
        }
        if let Some(location) = self.resolver.launch_location.as_deref()
            && let Err(e) = Url::parse(location)
        {
            return Err(Error::config(format!(
                "Launch location is not a valid URL ({e}): {location}\n\
                 Example: ConnectionManager::builder().launch_location(\"http://localhost:8080/?WebSocketURL=ws://localhost:8000\")"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
