//! Connection writer: message queue → client socket

use crate::command::queue::MessageQueue;
use crate::error::{Error, Result};
use crate::server::{Session, close_quietly};
use crate::worker::Interrupt;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Writer thread bound to one client connection
pub struct ConnectionWriter {
    handle: JoinHandle<()>,
    interrupt: Interrupt,
    queue: Arc<MessageQueue>,
    stream: TcpStream,
    tag: String,
}

impl ConnectionWriter {
    /// Start draining `queue` to the session's socket
    ///
    /// Every message is followed by `terminator`.
    pub fn spawn(session: &Session, queue: Arc<MessageQueue>, terminator: &str) -> Result<Self> {
        let stream = session.stream().try_clone()?;
        let thread_stream = stream.try_clone()?;
        let interrupt = Interrupt::new();
        let tag = session.tag().to_string();

        let thread_queue = Arc::clone(&queue);
        let thread_interrupt = interrupt.clone();
        let thread_tag = tag.clone();
        let terminator = terminator.to_string();

        let handle = session.spawn("writer", move || {
            if let Err(e) = write_loop(
                &thread_stream,
                &thread_queue,
                &thread_interrupt,
                &terminator,
                &thread_tag,
            ) && !e.is_disconnect()
            {
                log::warn!("[{}] Writer error: {}", thread_tag, e);
            }
            close_quietly(&thread_stream, &thread_tag);
            log::debug!("[{}] Closing the writer thread", thread_tag);
        })?;

        Ok(Self {
            handle,
            interrupt,
            queue,
            stream,
            tag,
        })
    }

    /// Interrupt the writer and wait for it to exit
    ///
    /// Unblocks both a pending `take` and a write stuck on a full socket.
    pub fn stop(self) {
        self.interrupt.trigger();
        self.queue.wake_all();
        close_quietly(&self.stream, &self.tag);
        if self.handle.join().is_err() {
            log::error!("[{}] Writer thread panicked", self.tag);
        }
    }
}

fn write_loop(
    stream: &TcpStream,
    queue: &MessageQueue,
    interrupt: &Interrupt,
    terminator: &str,
    tag: &str,
) -> Result<()> {
    let mut out = stream;
    loop {
        let Some(mut line) = queue.take(Duration::ZERO, interrupt)? else {
            continue;
        };
        log::trace!("[{}] Sending message: {}", tag, line);

        line.push_str(terminator);
        if let Err(e) = out.write_all(line.as_bytes()).and_then(|_| out.flush()) {
            log::debug!("[{}] Dropped message {:?}: {}", tag, line.trim_end(), e);
            return Err(Error::Io(e));
        }
    }
}
