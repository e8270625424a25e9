//! Encoded video frame types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Codec of an encoded video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameCodec {
    H264,
    H265,
    Unknown,
}

impl FrameCodec {
    /// Map a MIME type or short codec name to a codec
    ///
    /// Accepts `video/avc`, `video/hevc`, `h264`, `h265` (case-insensitive).
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "video/avc" | "video/h264" | "h264" | "avc" => FrameCodec::H264,
            "video/hevc" | "video/h265" | "h265" | "hevc" => FrameCodec::H265,
            _ => FrameCodec::Unknown,
        }
    }
}

impl fmt::Display for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameCodec::H264 => "H264",
            FrameCodec::H265 => "H265",
            FrameCodec::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Metadata delivered with every chunk from the camera pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in milliseconds
    pub presentation_time_ms: u64,
    pub is_key_frame: bool,
    pub frame_rate: u32,
    pub codec: FrameCodec,
}

impl FrameInfo {
    /// Metadata for a frame of the given geometry and key-frame flag
    pub fn new(width: u32, height: u32, is_key_frame: bool) -> Self {
        Self {
            width,
            height,
            presentation_time_ms: 0,
            is_key_frame,
            frame_rate: 30,
            codec: FrameCodec::H264,
        }
    }
}

/// Immutable encoded frame
///
/// Owns a copy of its payload; the source buffer is never retained.
#[derive(Clone, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    info: FrameInfo,
}

impl Frame {
    /// Take ownership of an already-copied payload
    pub fn new(data: Vec<u8>, info: FrameInfo) -> Self {
        Self { data, info }
    }

    /// Copy `length` bytes starting at `offset` out of `raw`
    pub fn copy_from(raw: &[u8], offset: usize, length: usize, info: FrameInfo) -> Result<Self> {
        let end = offset.checked_add(length).ok_or_else(|| {
            Error::InvalidParameter(format!("frame range overflows: {}+{}", offset, length))
        })?;
        let slice = raw.get(offset..end).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "frame range {}..{} outside buffer of {} bytes",
                offset,
                end,
                raw.len()
            ))
        })?;
        Ok(Self::new(slice.to_vec(), info))
    }

    /// Encoded payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame, returning its payload
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Payload size in bytes (counts against the buffer budget)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn is_key_frame(&self) -> bool {
        self.info.is_key_frame
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn presentation_time_ms(&self) -> u64 {
        self.info.presentation_time_ms
    }

    pub fn frame_rate(&self) -> u32 {
        self.info.frame_rate
    }

    pub fn codec(&self) -> FrameCodec {
        self.info.codec
    }
}

// Payloads are large; print their size only
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.data.len())
            .field("info", &self.info)
            .finish()
    }
}
