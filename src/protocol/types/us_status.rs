//! CX_US_ST body codec
//!
//! Custom ultrasound sector/status message layered on the generic header.
//! Describes the scan geometry of the active probe: sector origin, depth
//! range, width and probe kind.

use crate::error::{LinkError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// Probe kind values carried in the `probe_kind` field
///
/// The codec does not validate the field; this enum is an interpretive
/// helper for consumers. Unknown values round-trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Sector = 1,
    Linear = 2,
}

impl ProbeKind {
    /// Interpret a raw field value, `None` for anything unrecognized
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(ProbeKind::Sector),
            2 => Some(ProbeKind::Linear),
            _ => None,
        }
    }
}

/// US sector/status message (device type `CX_US_ST`)
///
/// # Wire layout (big-endian)
/// Six IEEE-754 doubles followed by one i32, packed with no padding:
/// - origin_x, origin_y, origin_z: f64
/// - depth_start, depth_end, width: f64
/// - probe_kind: i32 (1 = sector, 2 = linear)
///
/// Doubles are byte-swapped as whole 8-byte words, never per sub-field.
/// Total packed size: 52 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct UsStatusMessage {
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
    /// Start of the imaging depth range, millimeters
    pub depth_start: f64,
    /// End of the imaging depth range, millimeters
    pub depth_end: f64,
    /// Sector width: an angle for sector probes, millimeters for linear
    pub width: f64,
    /// Raw probe kind field; see [`ProbeKind`]
    pub probe_kind: i32,
}

impl UsStatusMessage {
    /// Packed wire size in bytes
    pub const BODY_SIZE: usize = 52;

    /// The device type string carried in the header
    pub const DEVICE_TYPE: &'static str = "CX_US_ST";

    /// Zeroed status with a probe kind
    pub fn with_kind(probe_kind: ProbeKind) -> Self {
        UsStatusMessage {
            origin_x: 0.0,
            origin_y: 0.0,
            origin_z: 0.0,
            depth_start: 0.0,
            depth_end: 0.0,
            width: 0.0,
            probe_kind: probe_kind as i32,
        }
    }

    /// Interpreted probe kind, `None` when the raw value is unrecognized
    pub fn kind(&self) -> Option<ProbeKind> {
        ProbeKind::from_i32(self.probe_kind)
    }
}

impl Message for UsStatusMessage {
    fn message_type() -> &'static str {
        Self::DEVICE_TYPE
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::BODY_SIZE);

        // Field-declaration order: 6 whole 8-byte words, then the 4-byte tail
        buf.put_f64(self.origin_x);
        buf.put_f64(self.origin_y);
        buf.put_f64(self.origin_z);
        buf.put_f64(self.depth_start);
        buf.put_f64(self.depth_end);
        buf.put_f64(self.width);
        buf.put_i32(self.probe_kind);

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
        Ok(UsStatusMessage {
            origin_x: cursor.get_f64(),
            origin_y: cursor.get_f64(),
            origin_z: cursor.get_f64(),
            depth_start: cursor.get_f64(),
            depth_end: cursor.get_f64(),
            width: cursor.get_f64(),
            probe_kind: cursor.get_i32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type() {
        assert_eq!(UsStatusMessage::message_type(), "CX_US_ST");
    }

    #[test]
    fn test_packed_size() {
        let msg = UsStatusMessage::with_kind(ProbeKind::Sector);
        let encoded = msg.encode_content().unwrap();
        assert_eq!(encoded.len(), 52);
        assert_eq!(encoded.len(), UsStatusMessage::BODY_SIZE);
    }

    #[test]
    fn test_roundtrip_bit_exact() {
        let original = UsStatusMessage {
            origin_x: 12.5,
            origin_y: -300.75,
            origin_z: 0.001,
            depth_start: 2.0,
            depth_end: 80.0,
            width: 0.6981317, // ~40 degrees
            probe_kind: ProbeKind::Sector as i32,
        };

        let encoded = original.encode_content().unwrap();
        let decoded = UsStatusMessage::decode_content(&encoded).unwrap();

        assert_eq!(decoded.origin_x.to_bits(), original.origin_x.to_bits());
        assert_eq!(decoded.origin_y.to_bits(), original.origin_y.to_bits());
        assert_eq!(decoded.origin_z.to_bits(), original.origin_z.to_bits());
        assert_eq!(decoded.depth_start.to_bits(), original.depth_start.to_bits());
        assert_eq!(decoded.depth_end.to_bits(), original.depth_end.to_bits());
        assert_eq!(decoded.width.to_bits(), original.width.to_bits());
        assert_eq!(decoded.probe_kind, original.probe_kind);
    }

    #[test]
    fn test_roundtrip_boundary_values() {
        for value in [0.0, -0.0, -1e308, 1e308, f64::MIN_POSITIVE] {
            for kind in [1, 2] {
                let original = UsStatusMessage {
                    origin_x: value,
                    origin_y: value,
                    origin_z: value,
                    depth_start: value,
                    depth_end: value,
                    width: value,
                    probe_kind: kind,
                };
                let decoded =
                    UsStatusMessage::decode_content(&original.encode_content().unwrap()).unwrap();
                assert_eq!(decoded, original);
            }
        }
    }

    #[test]
    fn test_lenient_probe_kind() {
        // Out-of-range values pass through unchanged, no validation
        let original = UsStatusMessage {
            probe_kind: 77,
            ..UsStatusMessage::with_kind(ProbeKind::Linear)
        };
        let decoded =
            UsStatusMessage::decode_content(&original.encode_content().unwrap()).unwrap();
        assert_eq!(decoded.probe_kind, 77);
        assert_eq!(decoded.kind(), None);
    }

    #[test]
    fn test_kind_interpretation() {
        assert_eq!(ProbeKind::from_i32(1), Some(ProbeKind::Sector));
        assert_eq!(ProbeKind::from_i32(2), Some(ProbeKind::Linear));
        assert_eq!(ProbeKind::from_i32(0), None);
    }

    #[test]
    fn test_big_endian_word_layout() {
        let msg = UsStatusMessage {
            origin_x: 1.0, // 0x3FF0000000000000
            ..UsStatusMessage::with_kind(ProbeKind::Sector)
        };
        let encoded = msg.encode_content().unwrap();
        assert_eq!(&encoded[0..8], &[0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
        // probe_kind sits in the last 4 bytes
        assert_eq!(&encoded[48..52], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_decode_wrong_size() {
        assert!(matches!(
            UsStatusMessage::decode_content(&[0u8; 51]),
            Err(LinkError::InvalidSize { .. })
        ));
        assert!(matches!(
            UsStatusMessage::decode_content(&[0u8; 53]),
            Err(LinkError::InvalidSize { .. })
        ));
    }
}
