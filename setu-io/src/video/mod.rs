//! Video relay pipeline
//!
//! ```text
//! camera ──► CameraFeed ──► FrameBuffer ──► VideoServer ──► client socket
//!                          (byte budget,    (raw payloads,
//!                           key resync)      no framing)
//! ```

pub mod buffer;
pub mod frame;
pub mod server;
pub mod source;
pub mod synthetic;

pub use buffer::{BufferStats, DEFAULT_MAX_BUFFER_SIZE, FrameBuffer};
pub use frame::{Frame, FrameCodec, FrameInfo};
pub use server::VideoServer;
pub use source::CameraFeed;
pub use synthetic::SyntheticCamera;
