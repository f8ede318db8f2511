//! Network I/O: framing, connection lifecycle, outbound backpressure
//!
//! The thread-based [`Connection`] is the engine's main entry point; the
//! tokio-based [`AsyncLinkClient`] serves integrations that already run an
//! async runtime.

pub mod async_client;
pub mod connection;
pub mod framer;
pub mod outbound;

pub use async_client::AsyncLinkClient;
pub use connection::{
    connect_with_retry, Connection, ConnectionConfig, ConnectionState, Role,
    CONNECT_WAIT_TIMEOUT, DEFAULT_IMAGE_PORT, DEFAULT_TRACKING_PORT,
};
pub use framer::{ByteSource, FramerPoll, MessageFramer};
pub use outbound::{
    DropOldestQueue, OutboundQueues, RetryPolicy, SendGate, MAX_PENDING_WRITE_BYTES, MAX_QUEUE_LEN,
};
