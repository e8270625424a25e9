//! Connection reader: client lines → handlers

use crate::command::handler::{HandlerRegistry, ServerHandle};
use crate::error::Result;
use crate::server::{Session, close_quietly};
use crate::worker::Interrupt;
use std::io::{self, BufRead, BufReader, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Longest accepted command line; longer input ends the connection
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Reader thread bound to one client connection
pub struct ConnectionReader {
    handle: JoinHandle<()>,
}

impl ConnectionReader {
    /// Start reading lines from the session's socket
    pub fn spawn(
        session: &Session,
        handlers: Arc<HandlerRegistry>,
        server: ServerHandle,
    ) -> Result<Self> {
        let stream = session.stream().try_clone()?;
        let interrupt = session.interrupt().clone();
        let tag = session.tag().to_string();

        let handle = session.spawn("reader", move || {
            read_loop(&stream, &handlers, &server, &interrupt, &tag);
            // Single exit path: the socket is closed exactly once here
            close_quietly(&stream, &tag);
            log::debug!("[{}] Closing the reader thread", tag);
        })?;

        Ok(Self { handle })
    }

    /// Wait for the client to close the connection (or an error / interrupt)
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("Reader thread panicked");
        }
    }
}

fn read_loop(
    stream: &TcpStream,
    handlers: &HandlerRegistry,
    server: &ServerHandle,
    interrupt: &Interrupt,
    tag: &str,
) {
    let mut reader = BufReader::new(stream);
    let mut raw = Vec::with_capacity(256);

    loop {
        let command = match read_line(&mut reader, &mut raw) {
            Ok(LineRead::Line(command)) => command,
            Ok(LineRead::EndOfStream) => {
                log::debug!("[{}] End of stream", tag);
                return;
            }
            Ok(LineRead::TooLong) => {
                log::warn!(
                    "[{}] Command line exceeds {} bytes, dropping client",
                    tag,
                    MAX_LINE_LENGTH
                );
                return;
            }
            Err(e) => {
                log::debug!("[{}] Read error (connection closed?): {}", tag, e);
                return;
            }
        };

        log::trace!("[{}] Received command: {}", tag, command);
        handlers.dispatch(server, &command);

        if interrupt.is_triggered() {
            return;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line(String),
    EndOfStream,
    TooLong,
}

/// Read one line of at most [`MAX_LINE_LENGTH`] bytes, terminator excluded
fn read_line<R: BufRead>(reader: &mut R, raw: &mut Vec<u8>) -> io::Result<LineRead> {
    raw.clear();
    // Room for the content plus a `\r\n` terminator
    let read = reader
        .by_ref()
        .take(MAX_LINE_LENGTH as u64 + 2)
        .read_until(b'\n', raw)?;
    if read == 0 {
        return Ok(LineRead::EndOfStream);
    }

    let content = strip_terminator(raw);
    if content.len() > MAX_LINE_LENGTH {
        return Ok(LineRead::TooLong);
    }
    Ok(LineRead::Line(String::from_utf8_lossy(content).into_owned()))
}

/// Strip the line terminator (`\n` or `\r\n`)
fn strip_terminator(raw: &[u8]) -> &[u8] {
    let mut line = raw;
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}
