//! Server state notifications

use crate::error::Error;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

/// Observer of a server's lifecycle
///
/// Every callback runs on the server's accept thread (bind failures on the
/// thread calling `start_server`) and must return quickly. Calling
/// `stop_server` from inside a callback deadlocks.
pub trait StateListener: Send + Sync {
    /// Listening socket bound, accept loop running
    fn on_server_running(&self) {}

    /// Accept loop exited, listening socket released
    fn on_server_closed(&self) {}

    /// Server failed to start
    fn on_server_exception(&self, _error: &Error) {}

    /// A client was accepted
    fn on_client_connected(&self, _address: SocketAddr) {}

    /// The current client's connection ended
    fn on_client_disconnected(&self) {}
}

/// Replaceable listener, so observers can be swapped while a server runs
#[derive(Default)]
pub struct ListenerSlot {
    listener: Mutex<Option<Arc<dyn StateListener>>>,
}

impl ListenerSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `listener`, replacing any previous one
    pub fn set(&self, listener: Option<Arc<dyn StateListener>>) {
        *self.listener.lock() = listener;
    }

    fn current(&self) -> Option<Arc<dyn StateListener>> {
        self.listener.lock().clone()
    }
}

// The slot lock is released before forwarding, so a listener may replace itself
impl StateListener for ListenerSlot {
    fn on_server_running(&self) {
        if let Some(l) = self.current() {
            l.on_server_running();
        }
    }

    fn on_server_closed(&self) {
        if let Some(l) = self.current() {
            l.on_server_closed();
        }
    }

    fn on_server_exception(&self, error: &Error) {
        if let Some(l) = self.current() {
            l.on_server_exception(error);
        }
    }

    fn on_client_connected(&self, address: SocketAddr) {
        if let Some(l) = self.current() {
            l.on_client_connected(address);
        }
    }

    fn on_client_disconnected(&self) {
        if let Some(l) = self.current() {
            l.on_client_disconnected();
        }
    }
}
