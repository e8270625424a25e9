//! Outbound message queue for the command channel
//!
//! Handlers push replies with [`MessageQueue::add`]; the connection writer
//! drains them with [`MessageQueue::take`]. The queue outlives individual
//! client connections, so messages queued while nobody is connected are
//! delivered to the next client.

use crate::error::{Error, Result};
use crate::worker::Interrupt;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// FIFO of text messages with optional drop-oldest capacity
#[derive(Debug)]
pub struct MessageQueue {
    capacity: Option<usize>,
    pending: Mutex<VecDeque<String>>,
    /// Signalled on every insert and on interruption
    available: Condvar,
    evicted: AtomicU64,
}

impl MessageQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self {
            capacity: None,
            pending: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            evicted: AtomicU64::new(0),
        }
    }

    /// Create a queue holding at most `capacity` messages
    ///
    /// Inserting past capacity evicts the oldest unread message.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidParameter(
                "message queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity: Some(capacity),
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            evicted: AtomicU64::new(0),
        })
    }

    /// Maximum number of messages held, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of pending messages
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True when no message is pending
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Messages dropped by the capacity policy since creation
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Append a message. Never blocks.
    pub fn add(&self, message: impl Into<String>) {
        let mut pending = self.pending.lock();
        pending.push_back(message.into());

        // Only one insert happens under the lock, so at most one message overflows
        if let Some(capacity) = self.capacity
            && pending.len() > capacity
            && let Some(dropped) = pending.pop_front()
        {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            log::trace!("Message queue full, dropped oldest: {:?}", dropped);
        }

        self.available.notify_all();
    }

    /// Oldest message, or `None` if the queue is empty. Never blocks.
    pub fn poll(&self) -> Option<String> {
        self.pending.lock().pop_front()
    }

    /// Wait for the oldest message
    ///
    /// A zero `timeout` waits indefinitely. Returns `Ok(None)` when the timeout
    /// elapses with nothing queued and `Err(Error::Interrupted)` once
    /// `interrupt` is raised and [`wake_all`](Self::wake_all) is called; an
    /// interrupted call leaves pending messages in place.
    pub fn take(&self, timeout: Duration, interrupt: &Interrupt) -> Result<Option<String>> {
        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };

        let mut pending = self.pending.lock();
        loop {
            // Checked first so an interrupted writer leaves messages for the next client
            interrupt.check()?;
            if let Some(message) = pending.pop_front() {
                return Ok(Some(message));
            }

            match deadline {
                None => self.available.wait(&mut pending),
                Some(deadline) => {
                    if self.available.wait_until(&mut pending, deadline).timed_out() {
                        return Ok(pending.pop_front());
                    }
                }
            }
        }
    }

    /// Wake every waiter so it can observe its interrupt flag
    ///
    /// Taking the lock orders this after any waiter's flag check, so a waiter
    /// either sees the flag or receives the notification.
    pub fn wake_all(&self) {
        let _pending = self.pending.lock();
        self.available.notify_all();
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
