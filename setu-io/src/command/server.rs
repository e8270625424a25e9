//! Bidirectional line-protocol command server
//!
//! Each accepted client gets a reader thread (lines → handlers) and a writer
//! thread (message queue → socket). The accept thread waits for the reader to
//! finish, stops the writer, and only then accepts the next client.

use crate::command::handler::{CommandHandler, HandlerRegistry, ServerHandle};
use crate::command::queue::MessageQueue;
use crate::command::reader::ConnectionReader;
use crate::command::writer::ConnectionWriter;
use crate::config::ControlConfig;
use crate::error::Result;
use crate::server::{ConnectionService, Session, StateListener, TcpServer};
use std::net::SocketAddr;
use std::sync::Arc;

/// Default terminator appended to every outbound message
pub const DEFAULT_LINE_TERMINATOR: &str = "\n";

/// Per-connection service wiring reader and writer to the shared state
pub struct CommandService {
    queue: Arc<MessageQueue>,
    handlers: Arc<HandlerRegistry>,
    terminator: String,
}

impl ConnectionService for CommandService {
    fn serve(&self, session: Session) {
        let writer = match ConnectionWriter::spawn(
            &session,
            Arc::clone(&self.queue),
            &self.terminator,
        ) {
            Ok(writer) => writer,
            Err(e) => {
                log::error!("[{}] Failed to start writer: {}", session.tag(), e);
                return;
            }
        };

        let handle = ServerHandle::new(Arc::clone(&self.queue));
        match ConnectionReader::spawn(&session, Arc::clone(&self.handlers), handle) {
            Ok(reader) => reader.join(),
            Err(e) => log::error!("[{}] Failed to start reader: {}", session.tag(), e),
        }

        writer.stop();
    }
}

/// Command server accepting one client at a time
pub struct CommandServer {
    server: TcpServer<CommandService>,
}

impl CommandServer {
    /// Create a stopped server with an unbounded message queue
    pub fn new(tag: &str, bind_address: impl Into<String>) -> Self {
        Self::with_queue(tag, bind_address, MessageQueue::new())
    }

    /// Create a stopped server using `queue` for outbound messages
    pub fn with_queue(tag: &str, bind_address: impl Into<String>, queue: MessageQueue) -> Self {
        Self::build(tag, bind_address.into(), queue, DEFAULT_LINE_TERMINATOR)
    }

    /// Create a stopped server from the `[control]` config section
    pub fn from_config(tag: &str, config: &ControlConfig) -> Result<Self> {
        let queue = match config.queue_capacity {
            Some(capacity) => MessageQueue::with_capacity(capacity)?,
            None => MessageQueue::new(),
        };
        Ok(Self::build(
            tag,
            config.bind_address.clone(),
            queue,
            &config.line_terminator,
        ))
    }

    fn build(tag: &str, bind_address: String, queue: MessageQueue, terminator: &str) -> Self {
        let service = CommandService {
            queue: Arc::new(queue),
            handlers: Arc::new(HandlerRegistry::new()),
            terminator: terminator.to_string(),
        };
        Self {
            server: TcpServer::new(tag, bind_address, service),
        }
    }

    /// Bind and start accepting clients; no-op if already running
    pub fn start_server(&self) -> Result<SocketAddr> {
        self.server.start_server()
    }

    /// Stop and join every server thread; no-op if not running
    pub fn stop_server(&self) {
        self.server.stop_server()
    }

    /// Whether the accept loop is running
    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Threads spawned by this server that are still alive
    pub fn live_threads(&self) -> usize {
        self.server.live_threads()
    }

    /// Install or clear the state listener
    pub fn set_state_listener(&self, listener: Option<Arc<dyn StateListener>>) {
        self.server.set_state_listener(listener);
    }

    /// Queue a message for the current or next client. Never blocks.
    pub fn send_message(&self, message: impl Into<String>) {
        self.handle().send_message(message);
    }

    /// Cloneable handle for sending messages from other threads
    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(Arc::clone(&self.server.service().queue))
    }

    /// Outbound message queue
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.server.service().queue
    }

    /// Register a handler for received commands
    pub fn add_command_handler(&self, handler: Arc<dyn CommandHandler>) {
        log::debug!("[{}] Adding new handler to the server", self.server.tag());
        self.server.service().handlers.add(handler);
    }

    /// Unregister a handler, returning whether it was registered
    pub fn remove_command_handler(&self, handler: &Arc<dyn CommandHandler>) -> bool {
        log::debug!("[{}] Removing handler from the server", self.server.tag());
        self.server.service().handlers.remove(handler)
    }

    /// Unregister every handler; commands are then discarded
    pub fn remove_all_command_handlers(&self) {
        log::debug!("[{}] Removing all handlers from the server", self.server.tag());
        self.server.service().handlers.clear();
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.server.service().handlers.len()
    }
}
