//! One-way video relay server
//!
//! Streams raw encoded frame payloads back to back, with no framing, to the
//! single connected client. Each new client starts at a key frame.

use crate::config::VideoConfig;
use crate::error::{Error, Result};
use crate::server::{ConnectionService, Session, StateListener, TcpServer, close_quietly};
use crate::video::buffer::FrameBuffer;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

/// Per-connection service draining the shared frame buffer
pub struct VideoService {
    buffer: Arc<FrameBuffer>,
}

impl VideoService {
    fn send_loop(&self, session: &Session) -> Result<()> {
        let mut out = session.stream();
        let mut sent: u64 = 0;
        loop {
            let frame = self.buffer.get_frame(session.interrupt())?;
            log::trace!(
                "[{}] Sending frame #{} ({} bytes, key={})",
                session.tag(),
                sent,
                frame.size(),
                frame.is_key_frame()
            );
            out.write_all(frame.data())?;
            out.flush()?;
            sent += 1;
        }
    }
}

impl ConnectionService for VideoService {
    fn serve(&self, session: Session) {
        self.buffer.request_key_frame_resync();

        match self.send_loop(&session) {
            Err(Error::Interrupted) => {
                log::debug!("[{}] Video sender interrupted", session.tag());
            }
            Err(e) if e.is_disconnect() => {
                log::debug!("[{}] Video client went away: {}", session.tag(), e);
            }
            Err(e) => log::warn!("[{}] Video send error: {}", session.tag(), e),
            Ok(()) => {}
        }
        close_quietly(session.stream(), session.tag());
    }
}

/// Video server accepting one client at a time
pub struct VideoServer {
    server: TcpServer<VideoService>,
}

impl VideoServer {
    /// Create a stopped server relaying frames from `buffer`
    pub fn new(tag: &str, bind_address: impl Into<String>, buffer: Arc<FrameBuffer>) -> Self {
        Self {
            server: TcpServer::new(tag, bind_address, VideoService { buffer }),
        }
    }

    /// Create a stopped server from the `[video]` config section
    pub fn from_config(tag: &str, config: &VideoConfig, buffer: Arc<FrameBuffer>) -> Self {
        Self::new(tag, config.bind_address.clone(), buffer)
    }

    /// Shared frame buffer
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.server.service().buffer
    }

    /// Bind and start accepting clients; no-op if already running
    pub fn start_server(&self) -> Result<SocketAddr> {
        self.server.start_server()
    }

    /// Stop and join every server thread; no-op if not running
    pub fn stop_server(&self) {
        self.server.stop_server()
    }

    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

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
}
