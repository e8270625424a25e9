//! Byte-budget frame buffer with key-frame resynchronization
//!
//! Video is loss-tolerant and latency-sensitive: when the consumer falls
//! behind, the oldest frames are evicted and the consumer skips forward to the
//! next key frame instead of growing the backlog.
//!
//! ```text
//! add_frame ──► [K][P][P][K][P][P] ──► get_frame
//!                ▲ evicted while bytes > max_buffer_size
//!                  (sets need_key_frame → reader skips to next K)
//! ```

use crate::error::Result;
use crate::video::frame::{Frame, FrameInfo};
use crate::worker::Interrupt;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Default byte budget (about one second of 8 Mbit/s video)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1_000_000;

/// Default wait slice for [`FrameBuffer::get_frame`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct BufferState {
    frames: VecDeque<Frame>,
    buffered_bytes: usize,
    need_key_frame: bool,
    evicted_frames: u64,
    skipped_frames: u64,
}

impl BufferState {
    fn pop_front(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front()?;
        self.buffered_bytes -= frame.size();
        Some(frame)
    }

    /// Drop head frames until the head is a key frame (or the buffer is empty)
    fn discard_until_key_frame(&mut self) {
        while self.frames.front().is_some_and(|f| !f.is_key_frame()) {
            self.pop_front();
            self.skipped_frames += 1;
        }
    }
}

/// Snapshot of buffer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub frames: usize,
    pub buffered_bytes: usize,
    pub evicted_frames: u64,
    pub skipped_frames: u64,
}

/// Single-producer, single-consumer frame FIFO bounded by total bytes
#[derive(Debug)]
pub struct FrameBuffer {
    max_buffer_size: usize,
    poll_interval: Duration,
    state: Mutex<BufferState>,
    frame_ready: Condvar,
}

impl FrameBuffer {
    /// Create a buffer holding at most `max_buffer_size` payload bytes
    pub fn new(max_buffer_size: usize) -> Self {
        Self::with_poll_interval(max_buffer_size, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`new`](Self::new) with a custom interruption poll interval
    pub fn with_poll_interval(max_buffer_size: usize, poll_interval: Duration) -> Self {
        Self {
            max_buffer_size,
            poll_interval,
            state: Mutex::new(BufferState::default()),
            frame_ready: Condvar::new(),
        }
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Payload bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.state.lock().buffered_bytes
    }

    /// Frames currently buffered
    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().frames.is_empty()
    }

    /// Whether the next read will skip forward to a key frame
    pub fn needs_key_frame(&self) -> bool {
        self.state.lock().need_key_frame
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.state.lock();
        BufferStats {
            frames: state.frames.len(),
            buffered_bytes: state.buffered_bytes,
            evicted_frames: state.evicted_frames,
            skipped_frames: state.skipped_frames,
        }
    }

    /// Append a frame, evicting from the head while over budget. Never blocks.
    pub fn add_frame(&self, frame: Frame) {
        let mut state = self.state.lock();
        state.buffered_bytes += frame.size();
        state.frames.push_back(frame);

        while state.buffered_bytes > self.max_buffer_size {
            if state.pop_front().is_none() {
                break;
            }
            state.evicted_frames += 1;
            state.need_key_frame = true;
        }

        self.frame_ready.notify_one();
    }

    /// Copy `length` bytes at `offset` out of a borrowed source buffer and
    /// enqueue them
    pub fn add_raw(&self, raw: &[u8], offset: usize, length: usize, info: FrameInfo) -> Result<()> {
        let frame = Frame::copy_from(raw, offset, length, info)?;
        self.add_frame(frame);
        Ok(())
    }

    /// Make the next read start at a key frame
    ///
    /// Called when a client attaches and when the camera changes.
    pub fn request_key_frame_resync(&self) {
        self.state.lock().need_key_frame = true;
    }

    /// Drop every buffered frame
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.frames.clear();
        state.buffered_bytes = 0;
    }

    /// Non-blocking variant of [`get_frame`](Self::get_frame)
    ///
    /// While resynchronizing, returns `None` until a key frame is buffered.
    pub fn try_get_frame(&self) -> Option<Frame> {
        let mut state = self.state.lock();
        if state.need_key_frame {
            state.discard_until_key_frame();
            if state.frames.is_empty() {
                return None;
            }
            state.need_key_frame = false;
        }
        state.pop_front()
    }

    /// Next frame for the consumer, blocking until one is available
    ///
    /// If a resync is pending, non-key frames are discarded and the first key
    /// frame is returned; with no key frame buffered the call keeps waiting.
    /// Waits in slices of the poll interval and returns
    /// `Err(Error::Interrupted)` once `interrupt` is raised.
    pub fn get_frame(&self, interrupt: &Interrupt) -> Result<Frame> {
        let mut state = self.state.lock();
        loop {
            // Cleared only once a key frame is at the head
            if state.need_key_frame {
                state.discard_until_key_frame();
                if !state.frames.is_empty() {
                    state.need_key_frame = false;
                }
            }
            if let Some(frame) = state.pop_front() {
                return Ok(frame);
            }

            interrupt.check()?;
            self.frame_ready.wait_for(&mut state, self.poll_interval);
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}
