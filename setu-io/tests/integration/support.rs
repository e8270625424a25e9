//! Shared helpers: loopback clients, a recording state listener, polling waits

use parking_lot::Mutex;
use setu_io::{Error, StateListener};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Route library logs through the test harness; honours `RUST_LOG`
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `condition` until it holds or [`TIMEOUT`] elapses
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Line-oriented control client
pub struct LineClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl LineClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    /// Send raw bytes (caller supplies the terminator)
    pub fn send_raw(&mut self, data: &str) {
        self.stream.write_all(data.as_bytes()).unwrap();
        self.stream.flush().unwrap();
    }

    pub fn send_line(&mut self, line: &str) {
        self.send_raw(&format!("{}\n", line));
    }

    /// Next line with the terminator stripped
    pub fn read_line(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).unwrap();
        assert!(n > 0, "server closed the connection");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Exactly `n` raw bytes, terminators included
    pub fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf).unwrap();
        buf
    }

    /// Whether the server has closed its side (orderly or by reset)
    pub fn at_eof(&mut self) -> bool {
        let mut line = String::new();
        !matches!(self.reader.read_line(&mut line), Ok(n) if n > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Running,
    Closed,
    Exception(String),
    Connected(SocketAddr),
    Disconnected,
}

/// State listener that records every notification
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ServerEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ServerEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &ServerEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn disconnects(&self) -> usize {
        self.count(&ServerEvent::Disconnected)
    }

    fn push(&self, event: ServerEvent) {
        self.events.lock().push(event);
    }
}

impl StateListener for RecordingListener {
    fn on_server_running(&self) {
        self.push(ServerEvent::Running);
    }

    fn on_server_closed(&self) {
        self.push(ServerEvent::Closed);
    }

    fn on_server_exception(&self, error: &Error) {
        self.push(ServerEvent::Exception(error.to_string()));
    }

    fn on_client_connected(&self, address: SocketAddr) {
        self.push(ServerEvent::Connected(address));
    }

    fn on_client_disconnected(&self) {
        self.push(ServerEvent::Disconnected);
    }
}
