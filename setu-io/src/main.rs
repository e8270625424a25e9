//! SetuIO - drone control and video relay daemon
//!
//! ## Ports
//!
//! - **TCP 9998**: control channel (line protocol, bidirectional)
//! - **TCP 9999**: video relay (raw H.264/H.265 byte stream, outbound only)

use setu_io::{AppConfig, RelayApp, Result};
use std::env;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu-io <path>` (positional)
/// - `setu-io --config <path>` (flag-based)
/// - `setu-io -c <path>` (short flag)
///
/// Returns `None` when no path is given; built-in defaults are used then.
fn parse_config_path(args: &[String]) -> Option<String> {
    if let Some(pos) = args.iter().position(|a| a == "--config" || a == "-c") {
        return args.get(pos + 1).cloned();
    }
    args.get(1).filter(|a| !a.starts_with('-')).cloned()
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config_path = parse_config_path(&args);

    let config = match &config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("SetuIO v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => log::info!("Using config: {}", path),
        None => log::info!("No config given, using defaults"),
    }

    let app = RelayApp::new(config)?;
    app.run()?;

    log::info!("SetuIO stopped");
    Ok(())
}
