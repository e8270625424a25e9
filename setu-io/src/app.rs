//! Application orchestration for the SetuIO daemon
//!
//! Owns the control server, the video relay and the frame source, and tears
//! them down synchronously on shutdown.

use crate::command::CommandServer;
use crate::config::AppConfig;
use crate::control::{ControlCommandHandler, FlightController, SimulatedFlightController};
use crate::error::{Error, Result};
use crate::server::StateListener;
use crate::video::{CameraFeed, FrameBuffer, SyntheticCamera, VideoServer};
use crate::worker::Interrupt;
use log::{debug, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONTROL_TAG: &str = "control";
const VIDEO_TAG: &str = "video";

/// Bound addresses of a started relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayAddrs {
    pub control: SocketAddr,
    pub video: SocketAddr,
}

/// Main application structure that manages all components
pub struct RelayApp {
    config: AppConfig,
    controller: Arc<dyn FlightController>,
    command_server: CommandServer,
    frame_buffer: Arc<FrameBuffer>,
    feed: Arc<CameraFeed>,
    video_server: VideoServer,
    camera: Option<SyntheticCamera>,
    shutdown: Interrupt,
}

impl RelayApp {
    /// Create a stopped relay driving a simulated aircraft
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_controller(config, Arc::new(SimulatedFlightController::new()))
    }

    /// Create a stopped relay driving `controller`
    pub fn with_controller(config: AppConfig, controller: Arc<dyn FlightController>) -> Result<Self> {
        info!("Initializing SetuIO relay");
        config.validate()?;

        let command_server = CommandServer::from_config(CONTROL_TAG, &config.control)?;
        let handler = ControlCommandHandler::new(Arc::clone(&controller));
        command_server.add_command_handler(Arc::new(handler));

        let frame_buffer = Arc::new(FrameBuffer::with_poll_interval(
            config.video.max_buffer_size,
            config.video.poll_interval(),
        ));
        let feed = Arc::new(CameraFeed::new(Arc::clone(&frame_buffer)));
        let video_server =
            VideoServer::from_config(VIDEO_TAG, &config.video, Arc::clone(&frame_buffer));

        let camera = if config.video.synthetic.enabled {
            Some(SyntheticCamera::new(
                config.video.synthetic.clone(),
                Arc::clone(&feed),
            )?)
        } else {
            debug!("Synthetic camera disabled");
            None
        };

        Ok(Self {
            config,
            controller,
            command_server,
            frame_buffer,
            feed,
            video_server,
            camera,
            shutdown: Interrupt::new(),
        })
    }

    /// Start both servers and the frame source
    ///
    /// If the video server fails to bind, the control server is stopped again
    /// and the error is returned.
    pub fn start(&self) -> Result<RelayAddrs> {
        let control = self.command_server.start_server()?;
        let video = match self.video_server.start_server() {
            Ok(addr) => addr,
            Err(e) => {
                self.command_server.stop_server();
                return Err(e);
            }
        };
        if let Some(camera) = &self.camera
            && let Err(e) = camera.start()
        {
            self.video_server.stop_server();
            self.command_server.stop_server();
            return Err(e);
        }

        info!("Control channel on {}", control);
        info!("Video relay on {}", video);
        Ok(RelayAddrs { control, video })
    }

    /// Stop everything and wait for every worker thread. Idempotent.
    pub fn stop(&self) {
        self.video_server.stop_server();
        if let Some(camera) = &self.camera {
            camera.stop();
        }
        self.command_server.stop_server();
        self.frame_buffer.clear();
    }

    /// Stop, then start again on the configured addresses
    pub fn restart(&self) -> Result<RelayAddrs> {
        self.stop();
        self.start()
    }

    /// Whether both servers are accepting clients
    pub fn is_running(&self) -> bool {
        self.command_server.is_running() && self.video_server.is_running()
    }

    /// Install or clear the state listener on both servers
    pub fn set_state_listener(&self, listener: Option<Arc<dyn StateListener>>) {
        self.command_server.set_state_listener(listener.clone());
        self.video_server.set_state_listener(listener);
    }

    /// Worker threads still alive across both servers and the frame source
    pub fn live_threads(&self) -> usize {
        self.command_server.live_threads()
            + self.video_server.live_threads()
            + self.camera.as_ref().map_or(0, |c| c.live_threads())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<dyn FlightController> {
        &self.controller
    }

    pub fn command_server(&self) -> &CommandServer {
        &self.command_server
    }

    pub fn video_server(&self) -> &VideoServer {
        &self.video_server
    }

    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.frame_buffer
    }

    /// Entry point for an external camera pipeline
    pub fn camera_feed(&self) -> &Arc<CameraFeed> {
        &self.feed
    }

    /// Ask [`run`](Self::run) to return
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Start, block until SIGINT/SIGTERM (or [`shutdown`](Self::shutdown)),
    /// then stop
    pub fn run(&self) -> Result<()> {
        self.start()?;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let signal_handle = signals.handle();
        let shutdown = self.shutdown.clone();
        let signal_thread = std::thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {:?}, initiating shutdown...", sig);
                    shutdown.trigger();
                }
            })
            .map_err(|e| Error::ThreadSpawn(format!("signal-handler: {}", e)))?;

        info!("Press Ctrl+C to stop");

        let mut last_stats = Instant::now();
        while !self.shutdown.is_triggered() {
            std::thread::sleep(Duration::from_millis(100));

            if last_stats.elapsed().as_secs() >= 10 {
                self.log_statistics();
                last_stats = Instant::now();
            }
        }

        info!("Shutdown signal received, stopping servers...");
        signal_handle.close();
        if signal_thread.join().is_err() {
            warn!("Signal handler thread panicked");
        }
        self.stop();
        Ok(())
    }

    fn log_statistics(&self) {
        let stats = self.frame_buffer.stats();
        info!(
            "Video: {} frames / {} bytes buffered, {} evicted, {} skipped for resync",
            stats.frames, stats.buffered_bytes, stats.evicted_frames, stats.skipped_frames
        );
        let queue = self.command_server.queue();
        info!(
            "Control: {} messages pending, {} dropped",
            queue.len(),
            queue.evicted()
        );
    }
}

impl Drop for RelayApp {
    fn drop(&mut self) {
        self.stop();
    }
}
