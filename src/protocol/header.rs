//! Wire header codec
//!
//! Every message on the stream starts with the fixed 58-byte OpenIGTLink
//! preamble: version, device type, device name, timestamp, body size and
//! body CRC. All multi-byte fields are big-endian on the wire.

use crate::error::{LinkError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Device type name, 12 bytes on the wire, null-padded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName([u8; 12]);

impl TypeName {
    /// Build from a string, rejecting names longer than the field
    pub fn new(name: &str) -> Result<Self> {
        if name.len() > 12 {
            return Err(LinkError::InvalidHeader(format!(
                "Device type too long: {} bytes (max: 12)",
                name.len()
            )));
        }
        let mut bytes = [0u8; 12];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(TypeName(bytes))
    }

    /// View as a string, trimming the null padding
    pub fn as_str(&self) -> Result<&str> {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(12);
        std::str::from_utf8(&self.0[..len])
            .map_err(|_| LinkError::InvalidHeader("Invalid UTF-8 in device type".to_string()))
    }

    pub(crate) fn raw(&self) -> &[u8; 12] {
        &self.0
    }
}

impl From<[u8; 12]> for TypeName {
    fn from(bytes: [u8; 12]) -> Self {
        TypeName(bytes)
    }
}

/// Device name, 20 bytes on the wire, null-padded
///
/// The name identifies the logical source of a message (a probe, a tracked
/// tool). Legacy senders may embed a bracketed channel-order tag here; the
/// dialect layer strips it before the name reaches consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceName([u8; 20]);

impl DeviceName {
    /// Build from a string, rejecting names longer than the field
    pub fn new(name: &str) -> Result<Self> {
        if name.len() > 20 {
            return Err(LinkError::InvalidHeader(format!(
                "Device name too long: {} bytes (max: 20)",
                name.len()
            )));
        }
        let mut bytes = [0u8; 20];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(DeviceName(bytes))
    }

    /// View as a string, trimming the null padding
    pub fn as_str(&self) -> Result<&str> {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(20);
        std::str::from_utf8(&self.0[..len])
            .map_err(|_| LinkError::InvalidHeader("Invalid UTF-8 in device name".to_string()))
    }

    pub(crate) fn raw(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for DeviceName {
    fn from(bytes: [u8; 20]) -> Self {
        DeviceName(bytes)
    }
}

/// Message timestamp: seconds since the Unix epoch plus a binary fraction
///
/// The wire field is a u64 with the seconds in the upper 32 bits and the
/// fractional part in the lower 32 (fraction = nanoseconds * 2^32 / 10^9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Seconds since 1970-01-01 00:00:00 UTC
    pub seconds: u32,
    /// Fractional seconds, 0x00000000..=0xFFFFFFFF spanning 0.0..~1.0
    pub fraction: u32,
}

impl Timestamp {
    pub fn new(seconds: u32, fraction: u32) -> Self {
        Timestamp { seconds, fraction }
    }

    /// Timestamp for the current system time
    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let seconds = now.as_secs() as u32;
        let fraction = ((now.subsec_nanos() as u64) * 0x1_0000_0000 / 1_000_000_000) as u32;
        Timestamp { seconds, fraction }
    }

    /// The zero timestamp (no timestamp)
    pub fn zero() -> Self {
        Timestamp {
            seconds: 0,
            fraction: 0,
        }
    }

    /// Pack into the wire representation
    pub fn to_u64(self) -> u64 {
        ((self.seconds as u64) << 32) | (self.fraction as u64)
    }

    /// Unpack from the wire representation
    pub fn from_u64(value: u64) -> Self {
        Timestamp {
            seconds: (value >> 32) as u32,
            fraction: (value & 0xFFFF_FFFF) as u32,
        }
    }

    /// Convert to whole milliseconds since the epoch
    ///
    /// This is the unit the timestamp synchronizer works in.
    pub fn to_millis(self) -> u64 {
        let frac_ms = ((self.fraction as u64) * 1_000) >> 32;
        (self.seconds as u64) * 1_000 + frac_ms
    }

    /// Build from whole milliseconds since the epoch
    pub fn from_millis(millis: u64) -> Self {
        let seconds = (millis / 1_000) as u32;
        let fraction = (((millis % 1_000) << 32) / 1_000) as u32;
        Timestamp { seconds, fraction }
    }

    /// Convert to floating-point seconds
    pub fn to_f64(self) -> f64 {
        (self.seconds as f64) + (self.fraction as f64) / (u32::MAX as f64 + 1.0)
    }
}

/// Fixed 58-byte wire header
///
/// # Layout (big-endian)
/// - version: u16
/// - device type: `char[12]`, null-padded
/// - device name: `char[20]`, null-padded
/// - timestamp: u64 (seconds << 32 | fraction)
/// - body size: u64, always the exact byte length of the body that follows
/// - crc: u64 over the body bytes (zero when CRC is disabled)
#[derive(Debug, Clone)]
pub struct Header {
    /// Protocol version number
    pub version: u16,
    /// Payload kind, drives decoder dispatch
    pub type_name: TypeName,
    /// Logical message source
    pub device_name: DeviceName,
    /// Send-side timestamp
    pub timestamp: Timestamp,
    /// Exact length of the body in bytes
    pub body_size: u64,
    /// CRC-64 of the body
    pub crc: u64,
}

impl Header {
    /// Header size in bytes
    pub const SIZE: usize = 58;

    /// Decode a header from a byte slice of at least 58 bytes
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(LinkError::InvalidSize {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(buf);

        let version = cursor.get_u16();

        let mut type_bytes = [0u8; 12];
        cursor.copy_to_slice(&mut type_bytes);

        let mut device_bytes = [0u8; 20];
        cursor.copy_to_slice(&mut device_bytes);

        let timestamp = Timestamp::from_u64(cursor.get_u64());
        let body_size = cursor.get_u64();
        let crc = cursor.get_u64();

        Ok(Header {
            version,
            type_name: TypeName::from(type_bytes),
            device_name: DeviceName::from(device_bytes),
            timestamp,
            body_size,
            crc,
        })
    }

    /// Encode into a 58-byte vector
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16(self.version);
        buf.put_slice(self.type_name.raw());
        buf.put_slice(self.device_name.raw());
        buf.put_u64(self.timestamp.to_u64());
        buf.put_u64(self.body_size);
        buf.put_u64(self.crc);
        buf.to_vec()
    }
}
