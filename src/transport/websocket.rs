//! WebSocket transport binding.
//!
//! Default [`Transport`] implementation over `tokio-tungstenite`.
//!
//! # Lifecycle
//!
//! 1. `connect` spawns a task running the handshake
//! 2. On success the write half is parked for `send`, `Open` is emitted
//! 3. The task forwards every frame as an owned `Message` event
//! 4. When the stream ends the task emits `Close` with the peer's code,
//!    or `1006` if the link dropped without a close frame
//!
//! A failed handshake emits `Error` followed by `Close(1006)`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::event::{CloseCode, EventSink, TransportError, TransportEvent};
use super::{Transport, TransportFactory};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsWriter = SplitSink<WsStream, Message>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// One WebSocket client connection attempt.
#[derive(Default)]
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Write half, present while the socket is open.
    writer: AsyncMutex<Option<WsWriter>>,
    /// Handshake and read task.
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Creates an unconnected binding.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the handshake then pumps inbound frames until the stream ends.
    async fn run(inner: Arc<Inner>, url: String, events: EventSink) {
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                debug!(binding = %events.binding(), url = %url, error = %e, "WebSocket handshake failed");
                events.emit(TransportEvent::Error(TransportError::from(&e)));
                events.emit(TransportEvent::Close(CloseCode::ABNORMAL));
                return;
            }
        };

        let (writer, mut reader) = stream.split();
        *inner.writer.lock().await = Some(writer);

        debug!(binding = %events.binding(), url = %url, "WebSocket connected");
        events.emit(TransportEvent::Open);

        let code = loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(text.as_str().as_bytes().to_vec()));
                }

                Some(Ok(Message::Binary(bytes))) => {
                    events.emit(TransportEvent::Message(bytes.to_vec()));
                }

                Some(Ok(Message::Close(frame))) => {
                    trace!(binding = %events.binding(), ?frame, "Close frame received");
                    break frame.map_or(CloseCode::NO_STATUS, |f| CloseCode(u16::from(f.code)));
                }

                Some(Err(e)) => {
                    events.emit(TransportEvent::Error(TransportError::from(&e)));
                    break CloseCode::ABNORMAL;
                }

                None => break CloseCode::ABNORMAL,

                // Ping, Pong, Frame
                Some(Ok(_)) => {}
            }
        };

        inner.writer.lock().await.take();
        events.emit(TransportEvent::Close(code));
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str, events: EventSink) {
        let handle = tokio::spawn(Self::run(Arc::clone(&self.inner), url.to_string(), events));

        if let Some(previous) = self.inner.task.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn send(&self, text: String) -> Result<()> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| Error::send("WebSocket is not connected"))?;

        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::send(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        let writer = self.inner.writer.lock().await.take();
        let task = self.inner.task.lock().take();

        let result = match writer {
            Some(mut writer) => writer.close().await.map_err(Error::from),
            None => Ok(()),
        };

        if let Some(task) = task {
            task.abort();
        }

        result
    }
}

// ============================================================================
// WebSocketTransportFactory
// ============================================================================

/// Factory producing a fresh [`WebSocketTransport`] per attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransportFactory;

impl TransportFactory for WebSocketTransportFactory {
    fn create(&self) -> Arc<dyn Transport> {
        Arc::new(WebSocketTransport::new())
    }
}

// ============================================================================
// Tests
// ============================================================================
