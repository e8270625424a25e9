//! SetuIO - TCP relay for drone flight control and live video
//!
//! Two single-client servers bridge an aircraft to a remote consumer:
//!
//! - **Control channel**: newline-terminated text commands in, replies and
//!   events out ([`command::CommandServer`])
//! - **Video relay**: raw encoded frames out, buffered under a byte budget with
//!   key-frame resynchronization ([`video::VideoServer`])

pub mod app;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod server;
pub mod video;
pub mod worker;

// Re-export commonly used types
pub use app::{RelayAddrs, RelayApp};
pub use command::{CommandHandler, CommandServer, MessageQueue, ServerHandle};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::StateListener;
pub use video::{Frame, FrameBuffer, FrameInfo, VideoServer};
