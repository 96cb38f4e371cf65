//! Outbound message queue.
//!
//! Unbounded FIFO shared between producers and the connection manager.
//! Producers enqueue from any thread; the manager drains everything present
//! once per operate cycle and puts failed sends back at the tail.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use parking_lot::Mutex;

// ============================================================================
// OutboundQueue
// ============================================================================

/// Thread-safe unbounded FIFO of pending outbound messages.
///
/// The lock is held only for the push or the swap, never across I/O.
#[derive(Debug)]
pub struct OutboundQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for OutboundQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OutboundQueue<T> {
    /// Creates an empty queue.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a message at the tail.
    #[inline]
    pub fn enqueue(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Removes and returns every message currently queued, oldest first.
    ///
    /// Messages enqueued while the caller processes the batch land in the
    /// next drain.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        let drained = std::mem::take(&mut *self.items.lock());
        drained.into()
    }

    /// Discards every pending message and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let count = items.len();
        items.clear();
        count
    }

    /// Returns the number of pending messages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
