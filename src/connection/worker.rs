//! Operate task.
//!
//! The single context that owns connection state. Four inputs are
//! multiplexed in one `select!` loop:
//!
//! - Host commands (connect, immediate send, shutdown)
//! - Transport events tagged with their [`BindingId`]
//! - Endpoint resolutions tagged with the attempt they belong to
//! - The operate tick and the pending reconnect deadline
//!
//! Nothing else mutates state, so no lock guards it. Endpoint resolution
//! may wait on the discovery request, so it runs in its own task and
//! reports back instead of blocking the loop.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{Level, debug, error, info, trace, warn};

use crate::endpoint::{Endpoint, EndpointResolver};
use crate::error::{Error, Result};
use crate::protocol::{Dispatcher, IncomingMessage, OutgoingMessage};
use crate::queue::OutboundQueue;
use crate::transport::{
    BindingId, CloseCode, EventSink, Transport, TransportError, TransportEvent, TransportFactory,
};

use super::config::ConnectionConfig;
use super::state::{ConnectionEvent, ConnectionState};

// ============================================================================
// Types
// ============================================================================

/// Channel carrying transport events into the operate task.
pub(crate) type TransportEvents = mpsc::UnboundedReceiver<(BindingId, TransportEvent)>;

/// Outcome of resolving the endpoint for one attempt.
pub(crate) type Resolution = (BindingId, Result<Endpoint>);

/// Channel carrying resolutions into the operate task.
pub(crate) type Resolutions = mpsc::UnboundedReceiver<Resolution>;

// ============================================================================
// Command
// ============================================================================

/// Requests from [`super::ConnectionManager`] handles.
pub(crate) enum Command {
    /// Start a new connect cycle, superseding any current binding.
    Connect,
    /// Send now, bypassing the queue.
    SendNow {
        message: OutgoingMessage,
        reply_tx: oneshot::Sender<Result<()>>,
    },
    /// Close the binding and stop.
    Shutdown,
}

// ============================================================================
// Worker
// ============================================================================

/// The binding currently allowed to drive state.
struct Current {
    id: BindingId,
    transport: Arc<dyn Transport>,
}

/// A reconnect scheduled after `for_binding` was lost.
#[derive(Debug, Clone, Copy)]
struct PendingReconnect {
    at: Instant,
    for_binding: BindingId,
}

pub(crate) struct Worker {
    config: ConnectionConfig,
    resolver: Arc<EndpointResolver>,
    factory: Arc<dyn TransportFactory>,
    dispatcher: Arc<dyn Dispatcher>,
    queue: Arc<OutboundQueue<OutgoingMessage>>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    transport_tx: mpsc::UnboundedSender<(BindingId, TransportEvent)>,
    resolution_tx: mpsc::UnboundedSender<Resolution>,
    /// Resolution task of the latest attempt, while it runs.
    resolving: Option<JoinHandle<()>>,
    current: Option<Current>,
    /// Id of the latest attempt, bumped before resolution.
    latest: BindingId,
    reconnect: Option<PendingReconnect>,
    /// Reconnects since the last successful open.
    reconnect_attempts: u32,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: ConnectionConfig,
        resolver: EndpointResolver,
        factory: Arc<dyn TransportFactory>,
        dispatcher: Arc<dyn Dispatcher>,
        queue: Arc<OutboundQueue<OutgoingMessage>>,
        state_tx: watch::Sender<ConnectionState>,
        events_tx: broadcast::Sender<ConnectionEvent>,
        transport_tx: mpsc::UnboundedSender<(BindingId, TransportEvent)>,
        resolution_tx: mpsc::UnboundedSender<Resolution>,
    ) -> Self {
        Self {
            config,
            resolver: Arc::new(resolver),
            factory,
            dispatcher,
            queue,
            state: ConnectionState::Disconnected,
            state_tx,
            events_tx,
            transport_tx,
            resolution_tx,
            resolving: None,
            current: None,
            latest: BindingId::new(0),
            reconnect: None,
            reconnect_attempts: 0,
        }
    }

    /// Runs until shutdown or until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut transport_rx: TransportEvents,
        mut resolution_rx: Resolutions,
    ) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let reconnect_at = self.reconnect.map(|pending| pending.at);

            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(Command::Connect) => self.connect_cycle().await,

                        Some(Command::SendNow { message, reply_tx }) => {
                            let result = self.send_now(message).await;
                            let _ = reply_tx.send(result);
                        }

                        Some(Command::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }

                        None => {
                            debug!("All manager handles dropped");
                            break;
                        }
                    }
                }

                Some((binding, event)) = transport_rx.recv() => {
                    self.handle_transport_event(binding, event);
                }

                Some((binding, result)) = resolution_rx.recv() => {
                    self.handle_resolution(binding, result).await;
                }

                _ = ticker.tick() => self.operate_cycle().await,

                () = wait_until(reconnect_at) => self.fire_reconnect().await,
            }
        }

        self.shutdown().await;
        debug!("Operate task terminated");
    }

    // ========================================================================
    // State
    // ========================================================================

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "State transition");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn notify(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    // ========================================================================
    // Connect / Reconnect
    // ========================================================================

    /// Closes the current binding and starts resolving a fresh attempt.
    async fn connect_cycle(&mut self) {
        self.close_current().await;
        self.abort_resolution();

        let binding = self.latest.next();
        self.latest = binding;
        self.set_state(ConnectionState::Connecting);

        let resolver = Arc::clone(&self.resolver);
        let resolution_tx = self.resolution_tx.clone();
        self.resolving = Some(tokio::spawn(async move {
            let result = resolver.resolve().await;
            // The operate task may be gone after shutdown.
            let _ = resolution_tx.send((binding, result));
        }));
    }

    fn abort_resolution(&mut self) {
        if let Some(task) = self.resolving.take() {
            task.abort();
        }
    }

    /// Creates and connects a binding once its endpoint is known.
    async fn handle_resolution(&mut self, binding: BindingId, result: Result<Endpoint>) {
        if binding != self.latest {
            trace!(binding = %binding, latest = %self.latest, "Ignoring superseded resolution");
            return;
        }
        self.resolving = None;

        let endpoint = match result {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!(binding = %binding, error = %e, "Connect attempt dropped");
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        let transport = self.factory.create();
        self.current = Some(Current {
            id: binding,
            transport: Arc::clone(&transport),
        });

        debug!(binding = %binding, url = %endpoint, "Connecting");
        let sink = EventSink::new(binding, self.transport_tx.clone());
        transport.connect(endpoint.url(), sink).await;
    }

    /// Best-effort close of the current binding, if any.
    async fn close_current(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };

        self.set_state(ConnectionState::Closing);
        if let Err(e) = current.transport.close().await {
            debug!(binding = %current.id, error = %e, "Ignoring close failure");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Releases the lost binding and schedules one reconnect for it.
    fn on_link_lost(&mut self, binding: BindingId) {
        self.set_state(ConnectionState::Disconnected);

        if let Some(lost) = self.current.take() {
            tokio::spawn(async move {
                if let Err(e) = lost.transport.close().await {
                    debug!(binding = %lost.id, error = %e, "Ignoring close failure");
                }
            });
        }

        let delay = self.config.reconnect.delay(self.reconnect_attempts);
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.reconnect = Some(PendingReconnect {
            at: Instant::now() + delay,
            for_binding: binding,
        });

        info!(binding = %binding, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
    }

    async fn fire_reconnect(&mut self) {
        let Some(pending) = self.reconnect.take() else {
            return;
        };

        if pending.for_binding != self.latest {
            debug!(
                binding = %pending.for_binding,
                latest = %self.latest,
                "Reconnect superseded by a newer attempt"
            );
            return;
        }

        info!(binding = %pending.for_binding, "Reconnecting");
        self.connect_cycle().await;
    }

    // ========================================================================
    // Transport Events
    // ========================================================================

    fn handle_transport_event(&mut self, binding: BindingId, event: TransportEvent) {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.id == binding);
        // Lost but not yet superseded: late errors and closes still reach
        // observers, nothing else does.
        let is_lost = !is_current
            && binding == self.latest
            && self
                .reconnect
                .is_some_and(|pending| pending.for_binding == binding);

        let ignored = match &event {
            TransportEvent::Open | TransportEvent::Message(_) => !is_current,
            TransportEvent::Error(_) | TransportEvent::Close(_) => !is_current && !is_lost,
        };
        if ignored {
            trace!(binding = %binding, ?event, "Ignoring event from inactive binding");
            return;
        }

        match event {
            TransportEvent::Open => {
                self.set_state(ConnectionState::Open);
                self.reconnect_attempts = 0;
                info!(binding = %binding, "Connected");
                self.notify(ConnectionEvent::Connected);
            }

            TransportEvent::Message(bytes) => self.dispatch(&bytes),

            TransportEvent::Error(err) => {
                if error_log_level(&err) == Level::INFO {
                    info!(binding = %binding, error = %err, "Server unreachable");
                } else {
                    error!(binding = %binding, error = %err, "Transport error");
                }
                self.notify(ConnectionEvent::Error(err.message));
                if is_current {
                    self.on_link_lost(binding);
                }
            }

            TransportEvent::Close(code) => {
                if close_log_level(code) == Level::INFO {
                    info!(binding = %binding, code = code.0, "Connection dropped");
                } else {
                    warn!(binding = %binding, code = code.0, "Connection closed");
                }
                self.notify(ConnectionEvent::Disconnected(code));
                if is_current {
                    self.on_link_lost(binding);
                }
            }
        }
    }

    /// Decodes and routes one inbound payload. Bad payloads are dropped.
    fn dispatch(&self, bytes: &[u8]) {
        match IncomingMessage::decode(bytes) {
            Ok(message) => {
                trace!(command = %message.command, "Dispatching");
                self.dispatcher.handle(&message.command, message.data);
            }
            Err(e) => warn!(error = %e, "Discarding malformed inbound message"),
        }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    fn open_transport(&self) -> Option<Arc<dyn Transport>> {
        if !self.state.is_open() {
            return None;
        }
        self.current
            .as_ref()
            .map(|current| Arc::clone(&current.transport))
    }

    /// Drains the queue through the open binding; failures go back on it.
    async fn operate_cycle(&mut self) {
        let Some(transport) = self.open_transport() else {
            return;
        };

        let batch = self.queue.drain();
        if batch.is_empty() {
            return;
        }

        trace!(count = batch.len(), "Draining outbound queue");
        let game = self.config.game.as_deref();

        for message in batch {
            let text = match message.encode(game) {
                Ok(text) => text,
                Err(e) => {
                    error!(command = %message.command, error = %e, "Dropping unencodable message");
                    continue;
                }
            };

            if let Err(e) = transport.send(text).await {
                warn!(command = %message.command, error = %e, "Send failed, requeueing");
                self.queue.enqueue(message);
            }
        }
    }

    async fn send_now(&mut self, message: OutgoingMessage) -> Result<()> {
        let Some(transport) = self.open_transport() else {
            error!(command = %message.command, state = %self.state, "Immediate send while not open, dropping");
            return Err(Error::not_open(self.state));
        };

        let text = message.encode(self.config.game.as_deref())?;
        transport.send(text).await.inspect_err(|e| {
            error!(command = %message.command, error = %e, "Immediate send failed, dropping");
        })
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    async fn shutdown(&mut self) {
        self.reconnect = None;
        self.abort_resolution();
        self.close_current().await;
        self.set_state(ConnectionState::Disconnected);
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Sleeps until `deadline`, or forever if there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Unreachable servers are expected while the remote end is down.
pub(crate) fn error_log_level(err: &TransportError) -> Level {
    if err.is_unreachable() {
        Level::INFO
    } else {
        Level::ERROR
    }
}

/// 1006 is what a dropped link or a missing server reports.
pub(crate) fn close_log_level(code: CloseCode) -> Level {
    if code.is_abnormal() {
        Level::INFO
    } else {
        Level::WARN
    }
}

// ============================================================================
// Tests
// ============================================================================
