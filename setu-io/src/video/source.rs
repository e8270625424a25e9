//! Camera stream adapter feeding the frame buffer
//!
//! Bridges a camera pipeline's callbacks (camera list changes, encoded stream
//! chunks) to [`FrameBuffer`]. At most one camera is attached; chunks from any
//! other camera are ignored.

use crate::error::Result;
use crate::video::buffer::FrameBuffer;
use crate::video::frame::FrameInfo;
use parking_lot::Mutex;
use std::sync::Arc;

/// Adapter attaching one camera's stream to a [`FrameBuffer`]
pub struct CameraFeed {
    buffer: Arc<FrameBuffer>,
    attached: Mutex<Option<String>>,
}

impl CameraFeed {
    pub fn new(buffer: Arc<FrameBuffer>) -> Self {
        Self {
            buffer,
            attached: Mutex::new(None),
        }
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Currently attached camera
    pub fn attached(&self) -> Option<String> {
        self.attached.lock().clone()
    }

    /// React to a new list of available cameras
    ///
    /// Detaches the current camera if it is gone, then attaches the first
    /// available camera if none is attached. Any change of camera requests a
    /// key-frame resync so stale non-key data is not relayed.
    pub fn on_available_cameras<S: AsRef<str>>(&self, cameras: &[S]) {
        let mut attached = self.attached.lock();
        let before = attached.clone();

        if let Some(current) = attached.as_deref()
            && !cameras.iter().any(|c| c.as_ref() == current)
        {
            log::info!("Camera detached: {}", current);
            *attached = None;
        }
        if attached.is_none()
            && let Some(first) = cameras.first()
        {
            log::info!("Camera attached: {}", first.as_ref());
            *attached = Some(first.as_ref().to_string());
        }

        if *attached != before {
            self.buffer.request_key_frame_resync();
        }
    }

    /// Accept an encoded chunk from `camera`
    ///
    /// Copies `length` bytes at `offset` out of `raw`. Returns whether the
    /// chunk was enqueued (false when `camera` is not attached).
    pub fn on_receive_stream(
        &self,
        camera: &str,
        raw: &[u8],
        offset: usize,
        length: usize,
        info: FrameInfo,
    ) -> Result<bool> {
        if self.attached.lock().as_deref() != Some(camera) {
            log::trace!("Ignoring {} bytes from unattached camera {}", length, camera);
            return Ok(false);
        }
        self.buffer.add_raw(raw, offset, length, info)?;
        Ok(true)
    }

    /// Detach from the current camera
    pub fn stop(&self) {
        if let Some(camera) = self.attached.lock().take() {
            log::info!("Camera detached: {}", camera);
        }
    }
}
