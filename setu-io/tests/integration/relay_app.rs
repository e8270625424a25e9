//! Full relay: control commands and video through one application

use crate::support::{LineClient, RecordingListener, ServerEvent, TIMEOUT, init_logging, wait_until};
use parking_lot::Mutex;
use setu_io::control::{
    ActionCompleter, FlightAction, FlightController, PendingAction, SimulatedFlightController,
    Sticks,
};
use setu_io::{AppConfig, FrameInfo, RelayApp};
use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Aircraft that only reports back when the test says so
#[derive(Default)]
struct StalledController {
    completers: Mutex<Vec<ActionCompleter>>,
    sticks: Mutex<Option<Sticks>>,
}

impl StalledController {
    fn stall(&self, action: FlightAction) -> PendingAction {
        let (completer, pending) = PendingAction::channel(action);
        self.completers.lock().push(completer);
        pending
    }

    fn pending(&self) -> usize {
        self.completers.lock().len()
    }

    fn release(&self) -> ActionCompleter {
        self.completers.lock().remove(0)
    }
}

impl FlightController for StalledController {
    fn enable_sticks(&self) -> PendingAction {
        self.stall(FlightAction::EnableSticks)
    }
    fn disable_sticks(&self) -> PendingAction {
        self.stall(FlightAction::DisableSticks)
    }
    fn takeoff(&self) -> PendingAction {
        self.stall(FlightAction::Takeoff)
    }
    fn land(&self) -> PendingAction {
        self.stall(FlightAction::Land)
    }
    fn set_sticks(&self, sticks: Sticks) {
        *self.sticks.lock() = Some(sticks);
    }
}

fn local_config(synthetic: bool) -> AppConfig {
    init_logging();
    let mut config = AppConfig::default();
    config.control.bind_address = "127.0.0.1:0".to_string();
    config.video.bind_address = "127.0.0.1:0".to_string();
    config.video.poll_interval_ms = 5;
    config.video.synthetic.enabled = synthetic;
    config.video.synthetic.frame_rate = 100;
    config
}

#[test]
fn test_flight_commands() {
    let controller = Arc::new(SimulatedFlightController::new());
    let app = RelayApp::with_controller(local_config(false), controller.clone()).unwrap();
    let addrs = app.start().unwrap();
    assert!(app.is_running());

    let mut client = LineClient::connect(addrs.control);
    let mut command = |line: &str| {
        client.send_line(line);
        client.read_line()
    };

    assert_eq!(command("enable"), "success");
    assert_eq!(command("TAKEOFF"), "success");
    assert_eq!(command("rc 0.25 0 0 -1"), "success");
    assert_eq!(command("land"), "success");
    assert_eq!(command("land"), "Aircraft is not flying");
    assert_eq!(command("rc 1 1"), "Illegal arguments: rc 1 1");
    assert_eq!(command("yaw 90"), "Unknown command: yaw");

    let sticks = controller.sticks();
    assert_eq!(sticks.left_horizontal.value(), 165);
    assert_eq!(sticks.right_vertical.value(), -660);
    assert!(!controller.is_airborne());

    app.stop();
    assert_eq!(app.live_threads(), 0);
}

#[test]
fn test_slow_action_does_not_block_control_channel() {
    let controller = Arc::new(StalledController::default());
    let app = RelayApp::with_controller(local_config(false), controller.clone()).unwrap();
    let addrs = app.start().unwrap();
    let mut client = LineClient::connect(addrs.control);

    // The takeoff never completes on its own, so the first reply is the rc one
    let start = Instant::now();
    client.send_raw("takeoff\nrc 0 0 0 0\n");
    assert_eq!(client.read_line(), "success");
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(*controller.sticks.lock(), Some(Sticks::default()));
    assert_eq!(controller.pending(), 1);

    // A late outcome still reaches the client
    controller.release().fail("Motors not started");
    assert_eq!(client.read_line(), "Motors not started");

    // Stopping with an action outstanding does not wait for it
    client.send_line("land");
    assert!(wait_until(|| controller.pending() == 1));
    let start = Instant::now();
    app.stop();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(app.live_threads(), 0);
}

#[test]
fn test_external_camera_feed() {
    let app = RelayApp::new(local_config(false)).unwrap();
    let addrs = app.start().unwrap();

    let mut video = TcpStream::connect(addrs.video).unwrap();
    video.set_read_timeout(Some(TIMEOUT)).unwrap();

    let feed = app.camera_feed();
    feed.on_available_cameras(&["main"]);
    let raw = [0xEEu8, 0, 0, 0, 1, 0x65, 0x88, 0xEE];
    assert!(feed
        .on_receive_stream("main", &raw, 1, 6, FrameInfo::new(1920, 1080, true))
        .unwrap());

    let mut received = [0u8; 6];
    video.read_exact(&mut received).unwrap();
    assert_eq!(received, [0, 0, 0, 1, 0x65, 0x88]);

    app.stop();
    assert_eq!(app.live_threads(), 0);
}

#[test]
fn test_synthetic_video_and_restart() {
    let app = RelayApp::new(local_config(true)).unwrap();
    let listener = Arc::new(RecordingListener::default());
    app.set_state_listener(Some(listener.clone()));

    let first = app.start().unwrap();
    let mut video = TcpStream::connect(first.video).unwrap();
    video.set_read_timeout(Some(TIMEOUT)).unwrap();
    let mut header = [0u8; 5];
    video.read_exact(&mut header).unwrap();
    assert_eq!(header, [0, 0, 0, 1, 0x65]);
    drop(video);

    let second = app.restart().unwrap();
    assert!(app.is_running());

    let mut client = LineClient::connect(second.control);
    client.send_line("enable");
    assert_eq!(client.read_line(), "success");

    app.stop();
    app.stop();
    assert!(!app.is_running());
    assert_eq!(app.live_threads(), 0);

    // Both servers went through two running/closed cycles
    assert!(wait_until(|| listener.count(&ServerEvent::Closed) == 4));
    assert_eq!(listener.count(&ServerEvent::Running), 4);
}
