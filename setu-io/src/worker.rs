//! Worker threads and interruption
//!
//! Rust threads cannot be interrupted from outside, so every long-lived worker
//! shares an [`Interrupt`] flag with its owner. Blocking socket calls are
//! unblocked by shutting the socket down; condition-variable waits
//! ([`MessageQueue::take`](crate::command::MessageQueue::take),
//! [`FrameBuffer::get_frame`](crate::video::FrameBuffer::get_frame)) check the
//! flag every time they wake.
//!
//! Each worker also registers with a [`ThreadCounter`] so a server can report
//! how many of its threads are still alive.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Cloneable interruption flag shared between a worker and its owner
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create a flag in the cleared state
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Error::Interrupted)` once the flag is raised
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Number of live worker threads spawned on behalf of one server
#[derive(Debug, Clone, Default)]
pub struct ThreadCounter {
    live: Arc<AtomicUsize>,
}

impl ThreadCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads registered and not yet exited
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn register(&self) -> LiveGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        LiveGuard {
            live: Arc::clone(&self.live),
        }
    }
}

/// Decrements the owning counter when the worker exits (or unwinds)
struct LiveGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawn a named worker thread counted by `counter`
///
/// The count is incremented before the thread starts, so a caller that
/// observes `live() == 0` after joining every handle knows nothing leaked.
pub fn spawn_worker<F, T>(name: &str, counter: &ThreadCounter, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let guard = counter.register();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _guard = guard;
            f()
        })
        .map_err(|e| Error::ThreadSpawn(format!("{}: {}", name, e)))
}
