//! End-to-end tests over real TCP connections
//!
//! A `Connection` in server role talks to plain `std::net` peers so the
//! wire traffic is produced and verified independently of the engine's own
//! send path.

use sonolink::dialect::StreamEvent;
use sonolink::io::{Connection, ConnectionConfig, ConnectionState};
use sonolink::protocol::header::Header;
use sonolink::protocol::message::WireMessage;
use sonolink::protocol::types::us_status::ProbeKind;
use sonolink::protocol::types::{ImageMessage, ImageScalarType, UsStatusMessage};
use sonolink::DialectKind;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn spawn_listening_server(dialect: DialectKind) -> (Connection, std::net::SocketAddr) {
    let config = ConnectionConfig::server(0).with_dialect(dialect);
    let conn = Connection::spawn(config);
    conn.connect_and_wait(EVENT_TIMEOUT).unwrap();
    let port = conn.local_addr().unwrap().port();
    (conn, std::net::SocketAddr::from(([127, 0, 0, 1], port)))
}

/// Pull events until one matches, failing on timeout
fn wait_for_event<F>(conn: &Connection, mut pred: F) -> StreamEvent
where
    F: FnMut(&StreamEvent) -> bool,
{
    let deadline = std::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(std::time::Instant::now())
            .expect("timed out waiting for event");
        let event = conn.events().recv_timeout(remaining).expect("event channel");
        if pred(&event) {
            return event;
        }
    }
}

fn test_frame() -> Vec<u8> {
    let image = ImageMessage::new(ImageScalarType::Uint8, 1, [16, 8, 1], vec![42u8; 128]).unwrap();
    WireMessage::new(image, "Probe").unwrap().encode().unwrap()
}

#[test]
fn server_decodes_frames_from_peer() {
    let (conn, addr) = spawn_listening_server(DialectKind::Generic);

    let mut peer = TcpStream::connect(addr).unwrap();
    peer.write_all(&test_frame()).unwrap();
    peer.flush().unwrap();

    let event = wait_for_event(&conn, |e| matches!(e, StreamEvent::Image { .. }));
    match event {
        StreamEvent::Image { device, image, .. } => {
            assert_eq!(device, "Probe");
            assert_eq!(image.size, [16, 8, 1]);
            assert_eq!(image.data, vec![42u8; 128]);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn server_decodes_frames_delivered_in_fragments() {
    let (conn, addr) = spawn_listening_server(DialectKind::Generic);

    let frame = test_frame();
    let mut peer = TcpStream::connect(addr).unwrap();

    // Trickle the message a few bytes at a time
    for piece in frame.chunks(11) {
        peer.write_all(piece).unwrap();
        peer.flush().unwrap();
        std::thread::sleep(Duration::from_millis(2));
    }

    let event = wait_for_event(&conn, |e| matches!(e, StreamEvent::Image { .. }));
    match event {
        StreamEvent::Image { image, .. } => assert_eq!(image.data.len(), 128),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn server_rejects_second_concurrent_peer() {
    let (conn, addr) = spawn_listening_server(DialectKind::Generic);

    let mut first = TcpStream::connect(addr).unwrap();
    wait_for_event(&conn, |e| {
        matches!(e, StreamEvent::StateChanged(ConnectionState::Connected))
    });

    // Second peer must be turned away with an error event
    let mut second = TcpStream::connect(addr).unwrap();
    let event = wait_for_event(&conn, |e| matches!(e, StreamEvent::Error(_)));
    match event {
        StreamEvent::Error(msg) => assert!(msg.contains("second"), "unexpected error: {msg}"),
        other => panic!("unexpected event: {other:?}"),
    }

    // The rejected socket sees EOF
    second
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut sink = [0u8; 16];
    assert_eq!(second.read(&mut sink).unwrap_or(0), 0);

    // The first session is untouched and still decodes traffic
    assert_eq!(conn.state(), ConnectionState::Connected);
    first.write_all(&test_frame()).unwrap();
    first.flush().unwrap();
    wait_for_event(&conn, |e| matches!(e, StreamEvent::Image { .. }));
}

#[test]
fn outbound_status_rides_in_front_of_next_image() {
    let (conn, addr) = spawn_listening_server(DialectKind::Generic);

    let mut peer = TcpStream::connect(addr).unwrap();
    wait_for_event(&conn, |e| {
        matches!(e, StreamEvent::StateChanged(ConnectionState::Connected))
    });

    let status = UsStatusMessage {
        depth_end: 90.0,
        ..UsStatusMessage::with_kind(ProbeKind::Linear)
    };
    conn.send_us_status("Probe", status).unwrap();

    let image = ImageMessage::new(ImageScalarType::Uint8, 1, [4, 4, 1], vec![7u8; 16]).unwrap();
    conn.send_image("Probe", image).unwrap();

    // The peer sees the status message first, then the image
    let mut read_message = |peer: &mut TcpStream| {
        let mut header_buf = vec![0u8; Header::SIZE];
        peer.read_exact(&mut header_buf).unwrap();
        let header = Header::decode(&header_buf).unwrap();
        let mut body = vec![0u8; header.body_size as usize];
        peer.read_exact(&mut body).unwrap();
        (header, body)
    };

    peer.set_read_timeout(Some(EVENT_TIMEOUT)).unwrap();
    let (first_header, first_body) = read_message(&mut peer);
    assert_eq!(first_header.type_name.as_str().unwrap(), "CX_US_ST");
    assert_eq!(first_body.len(), UsStatusMessage::BODY_SIZE);

    let (second_header, _) = read_message(&mut peer);
    assert_eq!(second_header.type_name.as_str().unwrap(), "IMAGE");
}

#[test]
fn client_connects_and_receives_from_std_listener() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        peer.write_all(&test_frame()).unwrap();
        peer.flush().unwrap();
        // Hold the socket open until the client has read everything
        std::thread::sleep(Duration::from_millis(500));
    });

    let config = ConnectionConfig::client(addr.ip().to_string(), addr.port());
    let conn = Connection::spawn(config);
    conn.connect_and_wait(EVENT_TIMEOUT).unwrap();
    assert_eq!(conn.state(), ConnectionState::Connected);

    wait_for_event(&conn, |e| matches!(e, StreamEvent::Image { .. }));

    conn.request_disconnect().unwrap();
    assert!(conn.wait_for_state(ConnectionState::Inactive, EVENT_TIMEOUT));
    server.join().unwrap();
}

#[test]
fn sonix_dialect_strips_tag_end_to_end() {
    let (conn, addr) = spawn_listening_server(DialectKind::Sonix);

    // 3-component frame tagged BGR: one pixel [10, 20, 30]
    let image = ImageMessage::new(ImageScalarType::Uint8, 3, [1, 1, 1], vec![10, 20, 30]).unwrap();
    let bytes = WireMessage::new(image, "Cam [BGR]").unwrap().encode().unwrap();

    let mut peer = TcpStream::connect(addr).unwrap();
    peer.write_all(&bytes).unwrap();
    peer.flush().unwrap();

    let event = wait_for_event(&conn, |e| matches!(e, StreamEvent::Image { .. }));
    match event {
        StreamEvent::Image { device, image, .. } => {
            assert_eq!(device, "Cam");
            // B and R swapped into canonical RGB
            assert_eq!(image.data, vec![30, 20, 10]);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
