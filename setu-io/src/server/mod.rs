//! Single-client TCP server lifecycle shared by the command and video servers
//!
//! # Lifecycle
//!
//! ```text
//! Stopped ──start_server()──► Listening ──accept──► Connected
//!    ▲                          ▲                       │
//!    │                          └──── client ends ──────┘
//!    └────────── stop_server() (interrupt + close + join) ◄──
//! ```
//!
//! One accept thread per running server. An accepted client is handed to the
//! [`ConnectionService`] on that same thread, so a second client waits in the
//! OS backlog until the first connection is fully torn down.
//!
//! # Shutdown
//!
//! `stop_server()` raises the accept thread's [`Interrupt`], shuts down the
//! client socket (unblocking any pending read or write), then joins the accept
//! thread. Services join their own workers before `serve` returns, so when
//! `stop_server()` returns no thread spawned by the server is alive.
//!
//! std listeners cannot be closed from another thread, so the listener is
//! non-blocking and polled every [`ACCEPT_POLL_INTERVAL`]. This accept poll is
//! the only timer in the lifecycle: a connected client is released by the
//! socket shutdown above, never by polling.

mod listener;

pub use listener::{ListenerSlot, StateListener};

use crate::error::{Error, Result};
use crate::worker::{Interrupt, ThreadCounter, spawn_worker};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Delay between non-blocking accept attempts
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Per-connection behaviour plugged into [`TcpServer`]
pub trait ConnectionService: Send + Sync + 'static {
    /// Serve one client until it disconnects or the session is interrupted
    ///
    /// Must join every thread it spawns before returning.
    fn serve(&self, session: Session);
}

/// An accepted client connection handed to a [`ConnectionService`]
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    interrupt: Interrupt,
    threads: ThreadCounter,
    tag: Arc<str>,
}

impl Session {
    /// Connected socket
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Remote address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Raised when the server is stopping
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Server tag used in log lines and thread names
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Spawn a worker counted against the owning server
    pub fn spawn<F, T>(&self, role: &str, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        spawn_worker(&format!("{}-{}", self.tag, role), &self.threads, f)
    }
}

/// Shut a socket down, swallowing errors from an already-closed socket
pub(crate) fn close_quietly(stream: &TcpStream, tag: &str) {
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        log::trace!("[{}] Socket already closed: {}", tag, e);
    }
}

/// The current client socket, reachable by `stop_server()`
#[derive(Default)]
struct ClientSlot {
    stream: Mutex<Option<TcpStream>>,
}

impl ClientSlot {
    /// Store the client unless the server is already stopping
    ///
    /// Checked under the slot lock: `stop_server()` raises the interrupt
    /// before closing the slot, so either it sees this socket or this call
    /// sees the interrupt.
    fn attach(&self, stream: TcpStream, interrupt: &Interrupt) -> bool {
        let mut slot = self.stream.lock();
        if interrupt.is_triggered() {
            return false;
        }
        *slot = Some(stream);
        true
    }

    fn close(&self, tag: &str) {
        if let Some(stream) = self.stream.lock().as_ref() {
            close_quietly(stream, tag);
        }
    }

    fn detach(&self, tag: &str) {
        if let Some(stream) = self.stream.lock().take() {
            close_quietly(&stream, tag);
        }
    }
}

struct Running {
    accept: JoinHandle<()>,
    interrupt: Interrupt,
    client: Arc<ClientSlot>,
    local_addr: SocketAddr,
}

/// Single-client TCP server with synchronous start/stop
pub struct TcpServer<S: ConnectionService> {
    tag: Arc<str>,
    bind_address: String,
    service: Arc<S>,
    listener: Arc<ListenerSlot>,
    threads: ThreadCounter,
    /// Serializes start/stop
    lifecycle: Mutex<Option<Running>>,
}

impl<S: ConnectionService> TcpServer<S> {
    /// Create a stopped server that will bind `bind_address`
    pub fn new(tag: &str, bind_address: impl Into<String>, service: S) -> Self {
        Self {
            tag: Arc::from(tag),
            bind_address: bind_address.into(),
            service: Arc::new(service),
            listener: Arc::new(ListenerSlot::new()),
            threads: ThreadCounter::new(),
            lifecycle: Mutex::new(None),
        }
    }

    /// Tag used in log lines and thread names
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Configured bind address
    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    /// The per-connection service
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Install or clear the state listener; takes effect immediately
    pub fn set_state_listener(&self, listener: Option<Arc<dyn StateListener>>) {
        self.listener.set(listener);
    }

    /// Bind and start the accept loop
    ///
    /// Returns the bound address (useful with port 0). A no-op returning the
    /// current address if the server is already running. Bind failures are
    /// reported to the state listener and returned; the server stays stopped.
    pub fn start_server(&self) -> Result<SocketAddr> {
        let mut lifecycle = self.lifecycle.lock();

        if let Some(running) = lifecycle.as_ref()
            && !running.accept.is_finished()
        {
            log::info!("[{}] Start server called on running server", self.tag);
            return Ok(running.local_addr);
        }
        if let Some(stale) = lifecycle.take()
            && stale.accept.join().is_err()
        {
            log::error!("[{}] Previous accept thread panicked", self.tag);
        }

        log::info!("[{}] Starting server on {}", self.tag, self.bind_address);
        let (listener, local_addr) = match self.bind() {
            Ok(bound) => bound,
            Err(e) => {
                log::error!("[{}] {}", self.tag, e);
                self.listener.on_server_exception(&e);
                return Err(e);
            }
        };

        let interrupt = Interrupt::new();
        let client = Arc::new(ClientSlot::default());
        let context = AcceptContext {
            tag: Arc::clone(&self.tag),
            listener,
            service: Arc::clone(&self.service),
            observer: Arc::clone(&self.listener),
            interrupt: interrupt.clone(),
            client: Arc::clone(&client),
            threads: self.threads.clone(),
        };

        let accept = spawn_worker(&format!("{}-accept", self.tag), &self.threads, move || {
            context.run()
        })?;

        *lifecycle = Some(Running {
            accept,
            interrupt,
            client,
            local_addr,
        });
        Ok(local_addr)
    }

    fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(&self.bind_address)
            .map_err(|e| Error::bind(&self.bind_address, e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::bind(&self.bind_address, e))?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    /// Stop the server and wait for every thread it spawned
    ///
    /// Idempotent; returns immediately when the server is not running.
    pub fn stop_server(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(running) = lifecycle.take() else {
            log::debug!("[{}] Stop server called on stopped server", self.tag);
            return;
        };

        log::info!("[{}] Terminating the server", self.tag);
        running.interrupt.trigger();
        running.client.close(&self.tag);

        if running.accept.join().is_err() {
            log::error!("[{}] Accept thread panicked", self.tag);
        }
        log::info!("[{}] Server terminated", self.tag);
    }

    /// Whether the accept loop is running
    pub fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .as_ref()
            .is_some_and(|r| !r.accept.is_finished())
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().as_ref().map(|r| r.local_addr)
    }

    /// Threads spawned by this server that are still alive
    pub fn live_threads(&self) -> usize {
        self.threads.live()
    }
}

impl<S: ConnectionService> Drop for TcpServer<S> {
    fn drop(&mut self) {
        self.stop_server();
    }
}

/// Everything the accept thread owns
struct AcceptContext<S: ConnectionService> {
    tag: Arc<str>,
    listener: TcpListener,
    service: Arc<S>,
    observer: Arc<ListenerSlot>,
    interrupt: Interrupt,
    client: Arc<ClientSlot>,
    threads: ThreadCounter,
}

impl<S: ConnectionService> AcceptContext<S> {
    fn run(self) {
        self.observer.on_server_running();
        if let Ok(addr) = self.listener.local_addr() {
            log::info!("[{}] Listening on {}", self.tag, addr);
        }

        while !self.interrupt.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.handle_client(stream, peer),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    log::warn!("[{}] Accept error: {}", self.tag, e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        log::info!("[{}] Server thread was interrupted and closing", self.tag);
        drop(self.listener);
        self.observer.on_server_closed();
    }

    fn handle_client(&self, stream: TcpStream, peer: SocketAddr) {
        // Accepted sockets may inherit the listener's non-blocking mode
        if let Err(e) = stream.set_nonblocking(false) {
            log::warn!("[{}] Failed to set blocking mode for {}: {}", self.tag, peer, e);
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[{}] Failed to set TCP_NODELAY for {}: {}", self.tag, peer, e);
        }

        let slot_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("[{}] Failed to clone client socket {}: {}", self.tag, peer, e);
                return;
            }
        };
        if !self.client.attach(slot_stream, &self.interrupt) {
            close_quietly(&stream, &self.tag);
            return;
        }

        log::info!("[{}] Client connected: {}", self.tag, peer);
        self.observer.on_client_connected(peer);

        self.service.serve(Session {
            stream,
            peer,
            interrupt: self.interrupt.clone(),
            threads: self.threads.clone(),
            tag: Arc::clone(&self.tag),
        });

        self.client.detach(&self.tag);
        log::info!("[{}] Client disconnected: {}", self.tag, peer);
        self.observer.on_client_disconnected();
    }
}
