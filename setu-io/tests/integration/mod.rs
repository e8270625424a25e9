//! Integration tests for setu-io over loopback TCP
//!
//! Every server binds `127.0.0.1:0` so tests can run in parallel.
//!
//! # Running Tests
//!
//! ```bash
//! RUST_LOG=setu_io=debug cargo test --test integration -- --nocapture
//! ```

mod command_server;
mod relay_app;
mod support;
mod video_relay;
