//! Command handler registration and dispatch

use crate::command::queue::MessageQueue;
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives every command line read from the connected client
///
/// Called on the connection's reader thread, so long-running work should be
/// handed off. Replies go through [`ServerHandle::send_message`], which may be
/// called from any thread, any number of times.
pub trait CommandHandler: Send + Sync {
    /// Handle one received line (terminator already stripped)
    fn on_command(&self, server: &ServerHandle, command: &str);
}

impl<F> CommandHandler for F
where
    F: Fn(&ServerHandle, &str) + Send + Sync,
{
    fn on_command(&self, server: &ServerHandle, command: &str) {
        self(server, command)
    }
}

/// Cloneable handle back to the command server that dispatched a command
#[derive(Debug, Clone)]
pub struct ServerHandle {
    queue: Arc<MessageQueue>,
}

impl ServerHandle {
    pub(crate) fn new(queue: Arc<MessageQueue>) -> Self {
        Self { queue }
    }

    /// Schedule a message for the current (or next) client
    pub fn send_message(&self, message: impl Into<String>) {
        let message = message.into();
        log::trace!("Message registered: {}", message);
        self.queue.add(message);
    }
}

/// Set of registered handlers, guarded by its own lock
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<Vec<Arc<dyn CommandHandler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; registering the same handler twice is a no-op
    pub fn add(&self, handler: Arc<dyn CommandHandler>) {
        let mut handlers = self.handlers.lock();
        if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            handlers.push(handler);
        }
    }

    /// Remove a handler, returning whether it was registered
    pub fn remove(&self, handler: &Arc<dyn CommandHandler>) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        handlers.len() != before
    }

    /// Remove every handler
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// True when no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Invoke every handler registered at the time of the call
    ///
    /// The lock is released before any handler runs, so handlers may add or
    /// remove registrations without deadlocking or affecting this dispatch.
    pub fn dispatch(&self, server: &ServerHandle, command: &str) {
        let snapshot: Vec<Arc<dyn CommandHandler>> = self.handlers.lock().clone();
        if snapshot.is_empty() {
            log::debug!("No handler registered, discarding command: {}", command);
            return;
        }
        for handler in snapshot {
            handler.on_command(server, command);
        }
    }
}
