//! Video relay over real loopback sockets

use crate::support::{RecordingListener, TIMEOUT, init_logging, wait_until};
use setu_io::config::SyntheticConfig;
use setu_io::video::{CameraFeed, SyntheticCamera};
use setu_io::{Frame, FrameBuffer, FrameInfo, VideoServer};
use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

fn frame(tag: u8, size: usize, key: bool) -> Frame {
    Frame::new(vec![tag; size], FrameInfo::new(1280, 720, key))
}

fn small_buffer(max_buffer_size: usize) -> Arc<FrameBuffer> {
    init_logging();
    Arc::new(FrameBuffer::with_poll_interval(
        max_buffer_size,
        Duration::from_millis(5),
    ))
}

fn connect(server: &VideoServer) -> TcpStream {
    let stream = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    stream.set_read_timeout(Some(TIMEOUT)).unwrap();
    stream
}

fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).unwrap();
    buf
}

#[test]
fn test_eviction_resumes_at_key_frame() {
    let buffer = small_buffer(10);
    buffer.add_frame(frame(1, 4, false));
    buffer.add_frame(frame(2, 4, true));
    buffer.add_frame(frame(3, 4, false));
    assert!(buffer.buffered_bytes() <= 10);
    assert!(buffer.needs_key_frame());

    let server = VideoServer::new("video", "127.0.0.1:0", Arc::clone(&buffer));
    server.start_server().unwrap();
    let mut client = connect(&server);

    assert_eq!(read_n(&mut client, 8), [2, 2, 2, 2, 3, 3, 3, 3]);

    server.stop_server();
    assert_eq!(server.live_threads(), 0);
}

#[test]
fn test_frames_relayed_unmodified_in_order() {
    let buffer = small_buffer(1_000_000);
    let server = VideoServer::new("video", "127.0.0.1:0", Arc::clone(&buffer));
    server.start_server().unwrap();
    let mut client = connect(&server);

    buffer.add_frame(frame(7, 100, true));
    for tag in 8..12 {
        buffer.add_frame(frame(tag, 50, false));
    }

    let received = read_n(&mut client, 300);
    assert!(received[..100].iter().all(|&b| b == 7));
    for (i, tag) in (8..12u8).enumerate() {
        let start = 100 + i * 50;
        assert!(received[start..start + 50].iter().all(|&b| b == tag));
    }

    server.stop_server();
}

#[test]
fn test_reconnected_client_starts_at_key_frame() {
    let buffer = small_buffer(1_000_000);
    let listener = Arc::new(RecordingListener::default());
    let server = VideoServer::new("video", "127.0.0.1:0", Arc::clone(&buffer));
    server.set_state_listener(Some(listener.clone()));
    server.start_server().unwrap();

    let mut first = connect(&server);
    buffer.add_frame(frame(1, 10, true));
    assert_eq!(read_n(&mut first, 10), vec![1; 10]);
    drop(first);

    // The sender notices the hang-up on its next write
    assert!(wait_until(|| {
        buffer.add_frame(frame(2, 10, false));
        listener.disconnects() == 1
    }));

    buffer.add_frame(frame(3, 10, false));
    buffer.add_frame(frame(4, 10, true));
    let mut second = connect(&server);
    assert_eq!(read_n(&mut second, 10), vec![4; 10]);

    server.stop_server();
    assert_eq!(server.live_threads(), 0);
}

#[test]
fn test_synthetic_camera_stream() {
    let buffer = small_buffer(1_000_000);
    let feed = Arc::new(CameraFeed::new(Arc::clone(&buffer)));
    let camera = SyntheticCamera::new(
        SyntheticConfig {
            enabled: true,
            width: 640,
            height: 480,
            frame_rate: 100,
            key_frame_interval: 10,
        },
        feed,
    )
    .unwrap();
    let server = VideoServer::new("video", "127.0.0.1:0", Arc::clone(&buffer));
    server.start_server().unwrap();
    let mut client = connect(&server);

    camera.start().unwrap();
    // Annex-B start code followed by an IDR NAL header
    assert_eq!(read_n(&mut client, 5), [0, 0, 0, 1, 0x65]);

    camera.stop();
    server.stop_server();
    assert_eq!(camera.live_threads(), 0);
    assert_eq!(server.live_threads(), 0);
}
