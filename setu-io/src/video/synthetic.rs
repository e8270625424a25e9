//! Synthetic camera producing fake H.264 access units
//!
//! Stands in for a vendor camera pipeline: emits Annex-B framed payloads of
//! random size at a fixed rate, with an IDR frame every `key_frame_interval`
//! frames. The payload is not decodable video; it exercises the relay path.

use crate::config::SyntheticConfig;
use crate::error::{Error, Result};
use crate::video::frame::{FrameCodec, FrameInfo};
use crate::video::source::CameraFeed;
use crate::worker::{ThreadCounter, spawn_worker};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Name the synthetic camera announces to its feed
pub const SYNTHETIC_CAMERA: &str = "synthetic";

const START_CODE: [u8; 4] = [0, 0, 0, 1];
const NAL_IDR: u8 = 0x65;
const NAL_NON_IDR: u8 = 0x41;

struct Running {
    stop_tx: Sender<()>,
    handle: JoinHandle<u64>,
}

/// Background frame generator feeding a [`CameraFeed`]
pub struct SyntheticCamera {
    config: SyntheticConfig,
    feed: Arc<CameraFeed>,
    threads: ThreadCounter,
    running: Mutex<Option<Running>>,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig, feed: Arc<CameraFeed>) -> Result<Self> {
        if config.frame_rate == 0 {
            return Err(Error::InvalidParameter(
                "synthetic frame_rate must be positive".to_string(),
            ));
        }
        if config.key_frame_interval == 0 {
            return Err(Error::InvalidParameter(
                "synthetic key_frame_interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            config,
            feed,
            threads: ThreadCounter::new(),
            running: Mutex::new(None),
        })
    }

    /// Attach to the feed and start generating frames; no-op if running
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        self.feed.on_available_cameras(&[SYNTHETIC_CAMERA]);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let config = self.config.clone();
        let feed = Arc::clone(&self.feed);
        let handle = spawn_worker("synthetic-camera", &self.threads, move || {
            let interval = Duration::from_secs_f64(1.0 / config.frame_rate as f64);
            let mut rng = rand::rng();
            let started = Instant::now();
            let mut produced: u64 = 0;

            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let key = produced % config.key_frame_interval as u64 == 0;
                let payload = synthesize(&mut rng, key);
                let info = FrameInfo {
                    width: config.width,
                    height: config.height,
                    presentation_time_ms: started.elapsed().as_millis() as u64,
                    is_key_frame: key,
                    frame_rate: config.frame_rate,
                    codec: FrameCodec::H264,
                };
                match feed.on_receive_stream(SYNTHETIC_CAMERA, &payload, 0, payload.len(), info) {
                    Ok(_) => produced += 1,
                    Err(e) => log::warn!("Synthetic frame rejected: {}", e),
                }
            }
            produced
        })?;

        log::info!(
            "Synthetic camera started ({}x{} @ {} fps)",
            self.config.width,
            self.config.height,
            self.config.frame_rate
        );
        *running = Some(Running { stop_tx, handle });
        Ok(())
    }

    /// Stop generating frames and join the generator thread
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.stop_tx.send(());
        match running.handle.join() {
            Ok(produced) => log::info!("Synthetic camera stopped after {} frames", produced),
            Err(_) => log::error!("Synthetic camera thread panicked"),
        }
        self.feed.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Generator threads still alive
    pub fn live_threads(&self) -> usize {
        self.threads.live()
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Annex-B access unit: start code, NAL header, random body
fn synthesize(rng: &mut impl Rng, key: bool) -> Vec<u8> {
    let body_len = if key {
        rng.random_range(8_000..16_000)
    } else {
        rng.random_range(500..4_000)
    };
    let mut payload = Vec::with_capacity(START_CODE.len() + 1 + body_len);
    payload.extend_from_slice(&START_CODE);
    payload.push(if key { NAL_IDR } else { NAL_NON_IDR });
    payload.extend((0..body_len).map(|_| rng.random::<u8>()));
    payload
}
