//! Minimal streaming server: serves synthetic frames to one viewer
//!
//! Run with `cargo run --example image_server`, then point a client at
//! port 18333.

use sonolink::dialect::StreamEvent;
use sonolink::io::{Connection, ConnectionConfig, ConnectionState, DEFAULT_IMAGE_PORT};
use sonolink::protocol::types::{ImageMessage, ImageScalarType};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let conn = Connection::spawn(ConnectionConfig::server(DEFAULT_IMAGE_PORT));
    conn.connect_and_wait(Duration::from_secs(5))?;
    println!("Listening on port {DEFAULT_IMAGE_PORT}, waiting for a viewer...");

    let mut frame_num: u8 = 0;
    loop {
        while let Some(event) = conn.try_event() {
            match event {
                StreamEvent::StateChanged(state) => println!("state: {state}"),
                StreamEvent::Error(msg) => eprintln!("error: {msg}"),
                _ => {}
            }
        }

        if conn.state() == ConnectionState::Connected {
            let data = vec![frame_num; 640 * 480];
            let frame = ImageMessage::new(ImageScalarType::Uint8, 1, [640, 480, 1], data)?;
            conn.send_image("DemoProbe", frame)?;
            frame_num = frame_num.wrapping_add(1);
        }

        std::thread::sleep(Duration::from_millis(33)); // ~30 fps
    }
}
