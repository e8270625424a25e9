//! Configuration for the SetuIO relay
//!
//! Loads the control channel, video relay and logging settings from a TOML
//! file. Every key is optional; missing keys take the built-in defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub control: ControlConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

/// Bidirectional command channel
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// TCP bind address for the control client
    ///
    /// Examples:
    /// - `0.0.0.0:9998` - Bind to all interfaces on port 9998
    /// - `127.0.0.1:0` - Localhost, ephemeral port
    pub bind_address: String,

    /// Outbound queue bound; absent means unbounded
    ///
    /// When full, the oldest pending message is dropped.
    pub queue_capacity: Option<usize>,

    /// Terminator appended to every outbound message
    pub line_terminator: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9998".to_string(),
            queue_capacity: None,
            line_terminator: "\n".to_string(),
        }
    }
}

/// One-way video relay
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VideoConfig {
    /// TCP bind address for the video client
    pub bind_address: String,

    /// Frame buffer budget in payload bytes
    pub max_buffer_size: usize,

    /// How often a waiting sender re-checks for shutdown (must be > 0)
    pub poll_interval_ms: u64,

    /// Built-in test pattern source
    pub synthetic: SyntheticConfig,
}

impl VideoConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
            max_buffer_size: 1_000_000,
            poll_interval_ms: 50,
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Synthetic camera settings (used when no real camera is present)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// A key frame is emitted every this many frames
    pub key_frame_interval: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1280,
            height: 720,
            frame_rate: 30,
            key_frame_interval: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("setu.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.control.queue_capacity == Some(0) {
            return Err(invalid("control.queue_capacity must be > 0"));
        }

        if self.video.max_buffer_size == 0 {
            return Err(invalid("video.max_buffer_size must be > 0"));
        }

        if self.video.poll_interval_ms == 0 {
            return Err(invalid("video.poll_interval_ms must be > 0"));
        }

        let synthetic = &self.video.synthetic;
        if synthetic.enabled {
            if synthetic.frame_rate == 0 {
                return Err(invalid("video.synthetic.frame_rate must be > 0"));
            }
            if synthetic.key_frame_interval == 0 {
                return Err(invalid("video.synthetic.key_frame_interval must be > 0"));
            }
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::Config(message.to_string())
}
