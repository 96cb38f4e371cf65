//! Connection manager handle.
//!
//! [`ConnectionManager`] is a cheap, cloneable handle to the operate task.
//! Hand clones to every component that needs to talk to the remote end.
//!
//! # Send Paths
//!
//! | Method | Queue | Requires `Open` | On failure |
//! |--------|-------|-----------------|------------|
//! | [`send`](ConnectionManager::send) | yes | no | requeued, retried next cycle |
//! | [`send_immediate`](ConnectionManager::send_immediate) | no | yes | error returned, message dropped |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::OutgoingMessage;
use crate::queue::OutboundQueue;

use super::builder::ConnectionManagerBuilder;
use super::state::{ConnectionEvent, ConnectionState};
use super::worker::Command;

// ============================================================================
// ConnectionManager
// ============================================================================

/// Handle to a running connection manager.
///
/// # Thread Safety
///
/// `ConnectionManager` is `Send + Sync`. Queued sends may be issued from any
/// thread without entering the runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    /// Channel to the operate task.
    command_tx: mpsc::UnboundedSender<Command>,
    /// Outbound queue (shared with the operate task).
    queue: Arc<OutboundQueue<OutgoingMessage>>,
    /// Latest published state.
    state_rx: watch::Receiver<ConnectionState>,
    /// Observer channel.
    events_tx: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionManager {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    pub(crate) fn new(
        command_tx: mpsc::UnboundedSender<Command>,
        queue: Arc<OutboundQueue<OutgoingMessage>>,
        state_rx: watch::Receiver<ConnectionState>,
        events_tx: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            command_tx,
            queue,
            state_rx,
            events_tx,
        }
    }

    /// Queues a message for the next operate cycle.
    ///
    /// Never fails. A message whose send fails is requeued until it goes
    /// through or the queue is cleared.
    #[inline]
    pub fn send(&self, message: OutgoingMessage) {
        self.queue.enqueue(message);
    }

    /// Sends a message now, bypassing the queue.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOpen`] if the connection is not open; the message is
    ///   dropped and the queue is untouched
    /// - [`Error::Send`] if the transport rejects the message
    /// - [`Error::ConnectionClosed`] if the manager has stopped
    pub async fn send_immediate(&self, message: OutgoingMessage) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::SendNow { message, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        reply_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Starts a new connect cycle, superseding the current connection and
    /// any pending reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the manager has stopped.
    pub fn reconnect(&self) -> Result<()> {
        self.command_tx
            .send(Command::Connect)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the connection and stops the operate task.
    ///
    /// Queued messages stay in the queue.
    pub fn stop(&self) {
        if self.command_tx.send(Command::Shutdown).is_err() {
            debug!("Connection manager already stopped");
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Returns `true` if the connection is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Returns a receiver that tracks state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribes to connection events.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    /// Returns the number of queued messages.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Drops every queued message and returns how many were dropped.
    pub fn clear_queue(&self) -> usize {
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!(dropped, "Cleared outbound queue");
        }
        dropped
    }

    /// Returns `true` once the operate task has exited.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.command_tx.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::time::{sleep, timeout};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::connection::ReconnectPolicy;
    use crate::connection::mock::MockHub;
    use crate::endpoint::{EnvScope, StaticEnvironment};
    use crate::transport::{CloseCode, TransportError, TransportEvent};

    const URL: &str = "ws://127.0.0.1:8000";
    const RECONNECT: Duration = Duration::from_secs(3);

    type Received = Arc<parking_lot::Mutex<Vec<(String, Option<Value>)>>>;

    fn env() -> StaticEnvironment {
        StaticEnvironment::new().with(EnvScope::Process, "NEURO_SDK_WS_URL", URL)
    }

    fn start(hub: &Arc<MockHub>) -> (ConnectionManager, Received) {
        let received: Received = Arc::default();
        let sink = Arc::clone(&received);

        let manager = ConnectionManager::builder()
            .environment(env())
            .transport_factory(hub.factory())
            .reconnect_interval(RECONNECT)
            .dispatcher(move |command: &str, data: Option<Value>| {
                sink.lock().push((command.to_string(), data));
            })
            .start()
            .unwrap();

        (manager, received)
    }

    /// Lets the operate task run a few cycles.
    async fn settle() {
        sleep(Duration::from_millis(50)).await;
    }

    async fn open(hub: &Arc<MockHub>, index: usize) {
        settle().await;
        hub.get(index).emit(TransportEvent::Open);
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_connects_to_resolved_endpoint() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        let mut events = manager.subscribe();

        settle().await;
        assert_eq!(hub.count(), 1);
        assert_eq!(hub.get(0).url().as_deref(), Some(URL));
        assert_eq!(manager.state(), ConnectionState::Connecting);

        open(&hub, 0).await;
        assert!(manager.is_open());
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_send_is_delivered_when_open() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);

        manager.send(OutgoingMessage::new("startup"));
        settle().await;
        assert_eq!(manager.pending_count(), 1);
        assert!(hub.get(0).sent().is_empty());

        open(&hub, 0).await;
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(hub.get(0).sent(), vec![r#"{"command":"startup"}"#.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_is_retried_next_cycle() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        hub.get(0).fail_next(1);
        manager.send(OutgoingMessage::with_data("context", json!({"message": "hi"})));
        settle().await;

        let transport = hub.get(0);
        assert_eq!(transport.attempts(), 2);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_name_is_stamped() {
        let hub = MockHub::new();
        let manager = ConnectionManager::builder()
            .environment(env())
            .transport_factory(hub.factory())
            .game("Chess")
            .start()
            .unwrap();
        open(&hub, 0).await;

        manager.send(OutgoingMessage::new("startup"));
        settle().await;

        let sent: Value = serde_json::from_str(&hub.get(0).sent()[0]).unwrap();
        assert_eq!(sent["game"], "Chess");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_send_requires_open() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        settle().await;

        manager.send(OutgoingMessage::new("queued"));
        let err = manager
            .send_immediate(OutgoingMessage::new("now"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotOpen { .. }));
        assert_eq!(manager.pending_count(), 1);
        assert_eq!(hub.get(0).attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_send_when_open() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        manager
            .send_immediate(OutgoingMessage::new("now"))
            .await
            .unwrap();
        assert_eq!(hub.get(0).sent(), vec![r#"{"command":"now"}"#.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_send_failure_is_not_retried() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        hub.get(0).fail_next(1);
        let err = manager
            .send_immediate(OutgoingMessage::new("now"))
            .await
            .unwrap_err();
        settle().await;

        assert!(matches!(err, Error::Send { .. }));
        assert_eq!(hub.get(0).attempts(), 1);
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_commands_are_dispatched() {
        let hub = MockHub::new();
        let (_manager, received) = start(&hub);
        open(&hub, 0).await;

        let transport = hub.get(0);
        transport.emit(TransportEvent::Message(
            br#"{"command":"action","data":{"id":"1"}}"#.to_vec(),
        ));
        transport.emit(TransportEvent::Message(br#"{"command":"actions/reregister_all"}"#.to_vec()));
        settle().await;

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], ("action".to_string(), Some(json!({"id": "1"}))));
        assert_eq!(received[1], ("actions/reregister_all".to_string(), None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_inbound_is_discarded() {
        let hub = MockHub::new();
        let (manager, received) = start(&hub);
        open(&hub, 0).await;

        let transport = hub.get(0);
        transport.emit(TransportEvent::Message(br#"{"data":{}}"#.to_vec()));
        transport.emit(TransportEvent::Message(b"not json".to_vec()));
        transport.emit(TransportEvent::Message(vec![0xff, 0x00]));
        transport.emit(TransportEvent::Message(br#"{"command":"ok"}"#.to_vec()));
        settle().await;

        assert!(manager.is_open());
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_one_reconnect() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        let mut events = manager.subscribe();
        open(&hub, 0).await;
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        hub.get(0).emit(TransportEvent::Close(CloseCode::ABNORMAL));
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Disconnected(CloseCode::ABNORMAL)
        );
        assert_eq!(hub.count(), 1);

        sleep(RECONNECT).await;
        assert_eq!(hub.count(), 2);
        assert_eq!(manager.state(), ConnectionState::Connecting);

        sleep(RECONNECT * 5).await;
        assert_eq!(hub.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_releases_binding_before_reconnect() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        let lost = hub.get(0);
        lost.emit(TransportEvent::Close(CloseCode::ABNORMAL));
        settle().await;
        assert!(lost.is_closed());

        lost.emit(TransportEvent::Open);
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        sleep(RECONNECT).await;
        assert_eq!(hub.count(), 2);
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_abnormal_close_also_reconnects() {
        let hub = MockHub::new();
        let (_manager, _) = start(&hub);
        open(&hub, 0).await;

        hub.get(0).emit(TransportEvent::Close(CloseCode::NORMAL));
        sleep(RECONNECT + Duration::from_millis(100)).await;

        assert_eq!(hub.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_then_close_reconnects_once() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        let mut events = manager.subscribe();
        settle().await;

        let transport = hub.get(0);
        transport.emit(TransportEvent::Error(TransportError::unreachable("refused")));
        transport.emit(TransportEvent::Close(CloseCode::ABNORMAL));
        settle().await;

        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Error("refused".into())
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Disconnected(CloseCode::ABNORMAL)
        );

        sleep(RECONNECT * 2).await;
        assert_eq!(hub.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_binding_events_are_ignored() {
        let hub = MockHub::new();
        let (manager, received) = start(&hub);
        settle().await;

        manager.reconnect().unwrap();
        settle().await;
        assert_eq!(hub.count(), 2);
        assert!(hub.get(0).is_closed());

        let stale = hub.get(0);
        stale.emit(TransportEvent::Open);
        stale.emit(TransportEvent::Message(br#"{"command":"ghost"}"#.to_vec()));
        stale.emit(TransportEvent::Close(CloseCode::NORMAL));
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert!(received.lock().is_empty());

        sleep(RECONNECT * 2).await;
        assert_eq!(hub.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_connect_supersedes_pending_reconnect() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        hub.get(0).emit(TransportEvent::Close(CloseCode::ABNORMAL));
        settle().await;

        manager.reconnect().unwrap();
        settle().await;
        assert_eq!(hub.count(), 2);

        sleep(RECONNECT * 2).await;
        assert_eq!(hub.count(), 2);

        hub.get(1).emit(TransportEvent::Open);
        settle().await;
        assert!(manager.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_failure_is_not_retried() {
        let hub = MockHub::new();
        let manager = ConnectionManager::builder()
            .environment(StaticEnvironment::new())
            .transport_factory(hub.factory())
            .start()
            .unwrap();

        sleep(RECONNECT * 3).await;
        assert_eq!(hub.count(), 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_policy_grows_between_attempts() {
        let hub = MockHub::new();
        let _manager = ConnectionManager::builder()
            .environment(env())
            .transport_factory(hub.factory())
            .reconnect_policy(ReconnectPolicy::Backoff {
                base: Duration::from_secs(1),
                max: Duration::from_secs(4),
            })
            .start()
            .unwrap();
        settle().await;

        hub.get(0).emit(TransportEvent::Close(CloseCode::ABNORMAL));
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(hub.count(), 2);

        hub.get(1).emit(TransportEvent::Close(CloseCode::ABNORMAL));
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(hub.count(), 2);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(hub.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_transport() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        manager.send(OutgoingMessage::new("kept"));
        manager.stop();
        settle().await;

        assert!(hub.get(0).is_closed());
        assert!(manager.is_stopped());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.pending_count(), 1);
        assert!(matches!(
            manager.send_immediate(OutgoingMessage::new("late")).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(manager.reconnect().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_queue() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);

        manager.send(OutgoingMessage::new("a"));
        manager.send(OutgoingMessage::new("b"));
        assert_eq!(manager.clear_queue(), 2);
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_from_foreign_thread() {
        let hub = MockHub::new();
        let (manager, _) = start(&hub);
        open(&hub, 0).await;

        let producer = manager.clone();
        std::thread::spawn(move || {
            for i in 0..10 {
                producer.send(OutgoingMessage::with_data("context", json!(i)));
            }
        })
        .join()
        .unwrap();
        settle().await;

        assert_eq!(hub.get(0).sent().len(), 10);
    }

    // Real time: the discovery server answers on its own runtime.

    async fn slow_discovery(delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/$env/NEURO_SDK_WS_URL"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("ws://discovered:9000")
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    async fn wait_for_binding(hub: &Arc<MockHub>) {
        timeout(Duration::from_secs(5), async {
            while hub.count() == 0 {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_commands_are_served_while_discovery_is_pending() {
        let server = slow_discovery(Duration::from_secs(2)).await;
        let hub = MockHub::new();
        let manager = ConnectionManager::builder()
            .launch_location(server.uri())
            .environment(StaticEnvironment::new())
            .transport_factory(hub.factory())
            .start()
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.state(), ConnectionState::Connecting);

        let result = timeout(
            Duration::from_millis(500),
            manager.send_immediate(OutgoingMessage::new("now")),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(Error::NotOpen { .. })));
        assert_eq!(hub.count(), 0);

        wait_for_binding(&hub).await;
        assert_eq!(hub.get(0).url().as_deref(), Some("ws://discovered:9000"));
    }

    #[tokio::test]
    async fn test_reconnect_during_discovery_supersedes_attempt() {
        let server = slow_discovery(Duration::from_millis(800)).await;
        let hub = MockHub::new();
        let manager = ConnectionManager::builder()
            .launch_location(server.uri())
            .environment(StaticEnvironment::new())
            .transport_factory(hub.factory())
            .start()
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        manager.reconnect().unwrap();

        wait_for_binding(&hub).await;
        sleep(Duration::from_millis(1200)).await;
        assert_eq!(hub.count(), 1);

        manager.stop();
        sleep(Duration::from_millis(50)).await;
        assert!(manager.is_stopped());
    }
}
