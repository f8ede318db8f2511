//! TRANSFORM body codec
//!
//! Carries a 4x4 homogeneous transformation (tool pose, calibration). Only
//! the upper 3x4 travels on the wire, as 12 big-endian f32 in column-major
//! order; the bottom row is always [0, 0, 0, 1].

use crate::error::{LinkError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// Packed wire size: 12 floats
const PACK_SIZE: usize = 48;

/// TRANSFORM message holding a 4x4 homogeneous matrix
#[derive(Debug, Clone, PartialEq)]
pub struct TransformMessage {
    /// Rotation in the upper-left 3x3, translation in the last column
    pub matrix: [[f32; 4]; 4],
}

impl TransformMessage {
    /// Identity transformation
    pub fn identity() -> Self {
        let mut matrix = [[0.0; 4]; 4];
        for (i, row) in matrix.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        TransformMessage { matrix }
    }

    /// Pure translation
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::identity();
        t.matrix[0][3] = x;
        t.matrix[1][3] = y;
        t.matrix[2][3] = z;
        t
    }
}

impl Message for TransformMessage {
    fn message_type() -> &'static str {
        "TRANSFORM"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(PACK_SIZE);

        // Column-major: R11 R21 R31, R12 R22 R32, R13 R23 R33, TX TY TZ
        for col in 0..4 {
            for row in 0..3 {
                buf.put_f32(self.matrix[row][col]);
            }
        }

        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() != PACK_SIZE {
            return Err(LinkError::InvalidSize {
                expected: PACK_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let mut matrix = [[0.0f32; 4]; 4];

        for col in 0..4 {
            for row in matrix.iter_mut().take(3) {
                row[col] = cursor.get_f32();
            }
        }
        matrix[3] = [0.0, 0.0, 0.0, 1.0];

        Ok(TransformMessage { matrix })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type() {
        assert_eq!(TransformMessage::message_type(), "TRANSFORM");
    }

    #[test]
    fn test_roundtrip() {
        let original = TransformMessage {
            matrix: [
                [0.0, -1.0, 0.0, 12.5],
                [1.0, 0.0, 0.0, -40.0],
                [0.0, 0.0, 1.0, 7.25],
                [0.0, 0.0, 0.0, 1.0],
            ],
        };

        let encoded = original.encode_content().unwrap();
        assert_eq!(encoded.len(), PACK_SIZE);

        let decoded = TransformMessage::decode_content(&encoded).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert!(
                    (original.matrix[i][j] - decoded.matrix[i][j]).abs() < 1e-6,
                    "mismatch at [{i}][{j}]"
                );
            }
        }
    }

    #[test]
    fn test_translation_helper() {
        let t = TransformMessage::translation(10.0, 20.0, 30.0);
        assert_eq!(t.matrix[0][3], 10.0);
        assert_eq!(t.matrix[1][3], 20.0);
        assert_eq!(t.matrix[2][3], 30.0);
        assert_eq!(t.matrix[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_last_row_implicit() {
        let mut garbage = TransformMessage::identity();
        garbage.matrix[3] = [9.0, 9.0, 9.0, 9.0];

        let encoded = garbage.encode_content().unwrap();
        let decoded = TransformMessage::decode_content(&encoded).unwrap();
        assert_eq!(decoded.matrix[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_decode_wrong_size() {
        assert!(matches!(
            TransformMessage::decode_content(&[0u8; 40]),
            Err(LinkError::InvalidSize { .. })
        ));
        assert!(matches!(
            TransformMessage::decode_content(&[0u8; 52]),
            Err(LinkError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_column_major_layout() {
        let mut t = TransformMessage::identity();
        t.matrix[0][3] = 1.5; // TX is the 10th float on the wire

        let encoded = t.encode_content().unwrap();
        // 1.5f32 big-endian is 0x3FC00000, at offset 9 * 4 = 36
        assert_eq!(&encoded[36..40], &[0x3F, 0xC0, 0x00, 0x00]);
    }
}
