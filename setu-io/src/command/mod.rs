//! Line-oriented command channel
//!
//! # Wire Format
//!
//! Newline-terminated UTF-8 text in both directions. Inbound lines may end in
//! `\n` or `\r\n`; outbound messages are followed by the configured terminator
//! (`\n` by default).
//!
//! ```text
//! client ── "takeoff\n" ──► reader ──► handlers ──► send_message("success")
//! client ◄── "success\n" ── writer ◄── MessageQueue ◄─────────┘
//! ```

pub mod handler;
pub mod queue;
pub mod reader;
pub mod server;
pub mod writer;

pub use handler::{CommandHandler, HandlerRegistry, ServerHandle};
pub use queue::MessageQueue;
pub use server::{CommandServer, DEFAULT_LINE_TERMINATOR};
