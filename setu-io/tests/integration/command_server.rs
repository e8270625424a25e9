//! Command server over real loopback sockets

use crate::support::{LineClient, RecordingListener, ServerEvent, init_logging, wait_until};
use setu_io::command::CommandHandler;
use setu_io::config::ControlConfig;
use setu_io::{CommandServer, MessageQueue, ServerHandle};
use std::net::TcpListener;
use std::sync::Arc;

fn echo_handler() -> Arc<dyn CommandHandler> {
    Arc::new(|server: &ServerHandle, command: &str| {
        server.send_message(format!("echo {}", command));
    })
}

fn local_server() -> CommandServer {
    init_logging();
    CommandServer::new("control", "127.0.0.1:0")
}

#[test]
fn test_command_round_trip() {
    let server = local_server();
    server.add_command_handler(echo_handler());
    let addr = server.start_server().unwrap();

    let mut client = LineClient::connect(addr);
    client.send_line("land");
    assert_eq!(client.read_line(), "echo land");

    // Python clients terminate with \r\n
    client.send_raw("takeoff\r\n");
    assert_eq!(client.read_line(), "echo takeoff");

    server.stop_server();
    assert_eq!(server.live_threads(), 0);
}

#[test]
fn test_every_handler_sees_every_line() {
    let server = local_server();
    server.add_command_handler(echo_handler());
    server.add_command_handler(Arc::new(|server: &ServerHandle, command: &str| {
        server.send_message(command.to_uppercase());
    }));
    let addr = server.start_server().unwrap();

    let mut client = LineClient::connect(addr);
    client.send_line("enable");
    let mut replies = vec![client.read_line(), client.read_line()];
    replies.sort();
    assert_eq!(replies, vec!["ENABLE", "echo enable"]);

    server.stop_server();
}

#[test]
fn test_messages_from_other_threads() {
    let server = local_server();
    let addr = server.start_server().unwrap();
    let mut client = LineClient::connect(addr);

    let handle = server.handle();
    let producer = std::thread::spawn(move || {
        for i in 0..50 {
            handle.send_message(format!("event {}", i));
        }
    });
    producer.join().unwrap();

    for i in 0..50 {
        assert_eq!(client.read_line(), format!("event {}", i));
    }
    server.stop_server();
}

#[test]
fn test_bounded_queue_keeps_latest_until_client_connects() {
    let server = CommandServer::with_queue(
        "control",
        "127.0.0.1:0",
        MessageQueue::with_capacity(2).unwrap(),
    );
    server.send_message("a");
    server.send_message("b");
    server.send_message("c");
    assert_eq!(server.queue().evicted(), 1);

    let addr = server.start_server().unwrap();
    let mut client = LineClient::connect(addr);
    assert_eq!(client.read_line(), "b");
    assert_eq!(client.read_line(), "c");

    server.stop_server();
}

#[test]
fn test_configured_terminator() {
    let config = ControlConfig {
        bind_address: "127.0.0.1:0".to_string(),
        line_terminator: "\r\n".to_string(),
        ..ControlConfig::default()
    };
    let server = CommandServer::from_config("control", &config).unwrap();
    let addr = server.start_server().unwrap();

    let mut client = LineClient::connect(addr);
    server.send_message("hello");
    assert_eq!(client.read_bytes(7), b"hello\r\n");

    server.stop_server();
}

#[test]
fn test_sequential_clients_and_pending_messages() {
    let server = local_server();
    server.add_command_handler(echo_handler());
    let listener = Arc::new(RecordingListener::default());
    server.set_state_listener(Some(listener.clone()));
    let addr = server.start_server().unwrap();

    let mut first = LineClient::connect(addr);
    first.send_line("one");
    assert_eq!(first.read_line(), "echo one");
    drop(first);
    assert!(wait_until(|| listener.disconnects() == 1));

    // Queued while nobody is connected; delivered to the next client
    server.send_message("while away");

    let mut second = LineClient::connect(addr);
    assert_eq!(second.read_line(), "while away");
    second.send_line("two");
    assert_eq!(second.read_line(), "echo two");

    server.stop_server();
    assert_eq!(server.live_threads(), 0);

    let events = listener.events();
    assert_eq!(events.first(), Some(&ServerEvent::Running));
    assert_eq!(events.last(), Some(&ServerEvent::Closed));
    assert_eq!(listener.count(&ServerEvent::Disconnected), 2);
}

#[test]
fn test_stop_disconnects_client_and_is_idempotent() {
    let server = local_server();
    let addr = server.start_server().unwrap();
    let mut client = LineClient::connect(addr);
    client.send_line("ping");

    server.stop_server();
    server.stop_server();
    assert!(!server.is_running());
    assert_eq!(server.live_threads(), 0);
    assert!(client.at_eof());
}

#[test]
fn test_restart_after_stop() {
    let server = local_server();
    server.add_command_handler(echo_handler());
    server.start_server().unwrap();
    server.stop_server();

    let addr = server.start_server().unwrap();
    let mut client = LineClient::connect(addr);
    client.send_line("again");
    assert_eq!(client.read_line(), "echo again");
    server.stop_server();
}

#[test]
fn test_bind_failure_reported_to_listener() {
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let server = CommandServer::new("control", occupied.local_addr().unwrap().to_string());
    let listener = Arc::new(RecordingListener::default());
    server.set_state_listener(Some(listener.clone()));

    assert!(server.start_server().is_err());
    assert!(!server.is_running());
    assert!(matches!(
        listener.events().as_slice(),
        [ServerEvent::Exception(_)]
    ));
}

#[test]
fn test_removed_handler_no_longer_called() {
    let server = local_server();
    let echo = echo_handler();
    server.add_command_handler(Arc::clone(&echo));
    server.add_command_handler(Arc::clone(&echo));
    assert_eq!(server.handler_count(), 1);
    let addr = server.start_server().unwrap();

    let mut client = LineClient::connect(addr);
    client.send_line("first");
    assert_eq!(client.read_line(), "echo first");

    assert!(server.remove_command_handler(&echo));
    client.send_line("ignored");
    server.send_message("marker");
    assert_eq!(client.read_line(), "marker");

    server.stop_server();
}
