//! Scripted transport for state machine tests.
//!
//! Bindings never open on their own; tests drive them through
//! [`MockTransport::emit`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::error::{Error, Result};
use crate::transport::{EventSink, Transport, TransportEvent, TransportFactory};

// ============================================================================
// MockTransport
// ============================================================================

#[derive(Default)]
pub(crate) struct MockTransport {
    url: Mutex<Option<String>>,
    sink: Mutex<Option<EventSink>>,
    sent: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failures: AtomicUsize,
    closed: AtomicBool,
}

impl MockTransport {
    pub(crate) fn emit(&self, event: TransportEvent) {
        let sink = self.sink.lock().clone().expect("binding was never connected");
        sink.emit(event);
    }

    /// Makes the next `count` sends fail.
    pub(crate) fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub(crate) fn url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str, events: EventSink) {
        *self.url.lock() = Some(url.to_string());
        *self.sink.lock() = Some(events);
    }

    async fn send(&self, text: String) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::send("mock send failure"));
        }

        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Err(Error::WebSocket(WsError::AlreadyClosed))
    }
}

// ============================================================================
// MockHub
// ============================================================================

/// Records every binding the manager creates.
#[derive(Default)]
pub(crate) struct MockHub {
    transports: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockHub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::default()
    }

    pub(crate) fn factory(self: &Arc<Self>) -> impl TransportFactory + use<> {
        let hub = Arc::clone(self);
        move || -> Arc<dyn Transport> {
            let transport = Arc::new(MockTransport::default());
            hub.transports.lock().push(Arc::clone(&transport));
            transport
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.transports.lock().len()
    }

    pub(crate) fn get(&self, index: usize) -> Arc<MockTransport> {
        Arc::clone(&self.transports.lock()[index])
    }
}
