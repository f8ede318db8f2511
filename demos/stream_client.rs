//! Minimal receiving client: prints every event a scanner sends
//!
//! Run with `cargo run --example stream_client -- <host> [port]`.

use sonolink::dialect::{DialectKind, StreamEvent};
use sonolink::io::{connect_with_retry, ConnectionConfig, RetryPolicy, DEFAULT_IMAGE_PORT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args
        .next()
        .map(|p| p.parse())
        .transpose()?
        .unwrap_or(DEFAULT_IMAGE_PORT);

    let config = ConnectionConfig::client(host, port).with_dialect(DialectKind::Generic);
    let conn = connect_with_retry(&config, &RetryPolicy::default())?;
    println!("Connected: {}", config.describe());

    for event in conn.events() {
        match event {
            StreamEvent::Image {
                device,
                image,
                timestamp,
            } => println!(
                "{device}: {}x{} frame at t={:.3}",
                image.size[0],
                image.size[1],
                timestamp.to_f64()
            ),
            StreamEvent::Transform { device, .. } => println!("{device}: transform"),
            StreamEvent::ProbeDefinition { device, geometry } => println!(
                "{device}: probe geometry depth {:.1}..{:.1} width {:.1}",
                geometry.depth_start, geometry.depth_end, geometry.width
            ),
            StreamEvent::UsStatus { device, status } => {
                println!("{device}: US status, kind {:?}", status.kind())
            }
            StreamEvent::StateChanged(state) => println!("state: {state}"),
            StreamEvent::Error(msg) => eprintln!("error: {msg}"),
            other => println!("event: {other:?}"),
        }
    }

    Ok(())
}
