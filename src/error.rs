//! Error types for the streaming engine
//!
//! Every fallible operation in this crate returns `Result<T, LinkError>`.
//! Expected stream conditions (partial reads, unknown device types) are NOT
//! errors; they are explicit outcomes of the framing and dispatch layers.

use thiserror::Error;

/// Streaming engine error types
#[derive(Error, Debug)]
pub enum LinkError {
    /// Invalid header format or content
    ///
    /// Raised when a type or device name exceeds its fixed field width,
    /// contains invalid UTF-8, or the header buffer is malformed.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// CRC checksum mismatch
    ///
    /// The body bytes did not hash to the CRC carried in the header. The
    /// message is discarded; framing continues at the next header.
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch {
        /// CRC value received in the message header
        expected: u64,
        /// CRC value calculated from the received body
        actual: u64,
    },

    /// Device type with no decoder for the requested operation
    ///
    /// Raised by typed decoding when the header declares a different
    /// device type. The framing layer itself skips unknown types
    /// byte-exact without raising this.
    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),

    /// Message or field size does not match the declared layout
    #[error("Invalid message size: expected {expected}, got {actual}")]
    InvalidSize {
        /// Expected size in bytes based on the wire format
        expected: usize,
        /// Actual size received or parsed
        actual: usize,
    },

    /// Message body size exceeds the sanity bound
    ///
    /// Protects against a corrupt header declaring an absurd body size and
    /// the receiver waiting forever (or allocating gigabytes) for it.
    #[error("Message body too large: {size} bytes (max: {max})")]
    BodyTooLarge {
        /// Declared body size in bytes
        size: usize,
        /// Maximum accepted size in bytes
        max: usize,
    },

    /// I/O error during network communication
    ///
    /// Wraps connect/read/write failures: refused connections, resets,
    /// broken pipes, unreachable hosts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error in a text field
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Operation requires an established connection
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The connection worker is gone and its channel is closed
    #[error("Connection channel closed")]
    ChannelClosed,
}

/// Result type alias for streaming engine operations
pub type Result<T> = std::result::Result<T, LinkError>;
