//! OpenIGTLink streaming engine for ultrasound image sources
//!
//! Sonolink bridges ultrasound grabbers to networked viewers over the
//! OpenIGTLink wire protocol: a 58-byte header followed by a typed body.
//! On top of the generic protocol it speaks two custom binary
//! sub-protocols, the `CX_US_ST` sector/status message and the legacy
//! `SONIX_ST` status message.
//!
//! # Features
//!
//! - **Byte-exact framing** - header-then-body state machine that tolerates
//!   partial socket reads and never blocks
//! - **Pluggable dialects** - generic, Plus-server and legacy Sonix
//!   interpretations of the same wire traffic, selected per connection
//! - **Bounded outbound queues** - drop-oldest backpressure sized for live
//!   imaging, never for unbounded buffering
//! - **CRC-64 integrity** - optional body checksums with a fixed recovery
//!   policy (drop the message, keep the stream)
//!
//! # Quick Start
//!
//! Receive frames from a scanner:
//!
//! ```no_run
//! use sonolink::io::{Connection, ConnectionConfig, DEFAULT_IMAGE_PORT};
//! use sonolink::dialect::{DialectKind, StreamEvent};
//!
//! let config = ConnectionConfig::client("192.168.0.10", DEFAULT_IMAGE_PORT)
//!     .with_dialect(DialectKind::Sonix);
//! let conn = Connection::spawn(config);
//! conn.request_connect()?;
//!
//! for event in conn.events() {
//!     match event {
//!         StreamEvent::Image { device, image, .. } => {
//!             println!("{device}: {}x{} frame", image.size[0], image.size[1]);
//!         }
//!         StreamEvent::Error(msg) => eprintln!("stream error: {msg}"),
//!         _ => {}
//!     }
//! }
//! # Ok::<(), sonolink::LinkError>(())
//! ```
//!
//! Serve frames to a viewer:
//!
//! ```no_run
//! use sonolink::io::{Connection, ConnectionConfig, DEFAULT_IMAGE_PORT};
//! use sonolink::protocol::types::{ImageMessage, ImageScalarType};
//!
//! let conn = Connection::spawn(ConnectionConfig::server(DEFAULT_IMAGE_PORT));
//! conn.request_connect()?;
//!
//! let frame = ImageMessage::new(ImageScalarType::Uint8, 1, [640, 480, 1],
//!     vec![0u8; 640 * 480])?;
//! conn.send_image("UltrasoundProbe", frame)?;
//! # Ok::<(), sonolink::LinkError>(())
//! ```
//!
//! # Architecture
//!
//! - **`protocol`** - pure byte-level codecs
//!   - `header` - the fixed 58-byte wire preamble
//!   - `crc` - CRC-64/ECMA-182 body checksums
//!   - `types` - body codecs: TRANSFORM, IMAGE, STATUS, STRING, and the
//!     custom `CX_US_ST` / `SONIX_ST` structs
//!
//! - **`io`** - sockets and flow control
//!   - `framer` - the two-state (await-header / await-body) receive loop
//!   - `connection` - per-connection worker thread, client/server roles,
//!     single-peer server policy
//!   - `outbound` - drop-oldest queues, send gating, linear retry
//!   - `async_client` - tokio-based convenience client
//!
//! - **`dialect`** - interpretation of framed messages
//!   - `Dispatcher` routes by device type to the active dialect
//!   - `generic` / `plus` / `sonix` dialect implementations
//!   - `timesync` - sliding-window remote clock offset estimation
//!
//! Each connection runs on its own worker thread. The framing state
//! machine never blocks: it is driven once per readiness poll and consumes
//! as many complete messages as the buffered bytes allow. Producers on
//! other threads hand messages over through channels; the socket is only
//! ever touched by the connection's own thread.

pub mod dialect;
pub mod error;
pub mod io;
pub mod protocol;

pub use dialect::{Dialect, DialectKind, Dispatcher, ProbeGeometry, StreamEvent};
pub use error::{LinkError, Result};
