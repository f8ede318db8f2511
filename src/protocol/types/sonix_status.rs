//! SONIX_ST body codec (legacy)
//!
//! Earlier custom status message used by Sonix scanners, superseded by
//! [`CX_US_ST`](super::us_status). Carries only the sector origin and a
//! changed/unchanged flag.

use crate::error::{LinkError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// Legacy Sonix status message (device type `SONIX_ST`)
///
/// # Wire layout (big-endian)
/// - origin_x, origin_y, origin_z: f64
/// - status: u8 (nonzero = geometry changed since the last frame)
///
/// Total packed size: 25 bytes. The flag is carried as a plain byte; no
/// range validation is performed and any value round-trips unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SonixStatusMessage {
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
    /// Changed/unchanged flag, nonzero meaning changed
    pub status: u8,
}

impl SonixStatusMessage {
    /// Packed wire size in bytes
    pub const BODY_SIZE: usize = 25;

    /// The device type string carried in the header
    pub const DEVICE_TYPE: &'static str = "SONIX_ST";

    /// Status with an origin, flagged as changed
    pub fn changed(origin_x: f64, origin_y: f64, origin_z: f64) -> Self {
        SonixStatusMessage {
            origin_x,
            origin_y,
            origin_z,
            status: 1,
        }
    }

    /// Whether the flag marks the geometry as changed
    pub fn is_changed(&self) -> bool {
        self.status != 0
    }
}

impl Message for SonixStatusMessage {
    fn message_type() -> &'static str {
        Self::DEVICE_TYPE
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::BODY_SIZE);
        buf.put_f64(self.origin_x);
        buf.put_f64(self.origin_y);
        buf.put_f64(self.origin_z);
        buf.put_u8(self.status);
        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() != Self::BODY_SIZE {
            return Err(LinkError::InvalidSize {
                expected: Self::BODY_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        Ok(SonixStatusMessage {
            origin_x: cursor.get_f64(),
            origin_y: cursor.get_f64(),
            origin_z: cursor.get_f64(),
            status: cursor.get_u8(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type() {
        assert_eq!(SonixStatusMessage::message_type(), "SONIX_ST");
    }

    #[test]
    fn test_packed_size() {
        let msg = SonixStatusMessage::changed(0.0, 0.0, 0.0);
        assert_eq!(msg.encode_content().unwrap().len(), 25);
    }

    #[test]
    fn test_roundtrip() {
        let original = SonixStatusMessage {
            origin_x: -15.25,
            origin_y: 320.5,
            origin_z: 0.0,
            status: 1,
        };
        let decoded =
            SonixStatusMessage::decode_content(&original.encode_content().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_lenient_status_flag() {
        // Any byte value passes through, not just 0/1
        let original = SonixStatusMessage {
            origin_x: 0.0,
            origin_y: 0.0,
            origin_z: 0.0,
            status: 200,
        };
        let decoded =
            SonixStatusMessage::decode_content(&original.encode_content().unwrap()).unwrap();
        assert_eq!(decoded.status, 200);
        assert!(decoded.is_changed());
    }

    #[test]
    fn test_decode_wrong_size() {
        assert!(matches!(
            SonixStatusMessage::decode_content(&[0u8; 24]),
            Err(LinkError::InvalidSize { .. })
        ));
    }
}
