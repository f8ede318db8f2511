//! Core wire protocol: header, CRC, body codecs
//!
//! Pure byte-level transformations with no I/O. The framing and dialect
//! layers sit on top of this module.

pub mod crc;
pub mod header;
pub mod message;
pub mod types;

pub use crc::{calculate_crc, verify_crc};
pub use header::{DeviceName, Header, Timestamp, TypeName};
pub use message::{Message, RawMessage, WireMessage};
