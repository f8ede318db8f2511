//! IMAGE body codec
//!
//! Carries one 2-D ultrasound frame (or a 3-D volume). The fixed part of
//! the body is 72 bytes: format description, frame dimensions, a 4x3
//! orientation matrix with spacing and origin embedded, and the sub-volume
//! window; the raw pixel buffer follows.

use crate::error::{LinkError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// Fixed part of the body preceding the pixel buffer
const FIXED_SIZE: usize = 72;

/// Pixel scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScalarType {
    Int8 = 2,
    Uint8 = 3,
    Int16 = 4,
    Uint16 = 5,
    Int32 = 6,
    Uint32 = 7,
    Float32 = 10,
    Float64 = 11,
}

impl ImageScalarType {
    /// Size of one scalar in bytes
    pub fn size(&self) -> usize {
        match self {
            ImageScalarType::Int8 | ImageScalarType::Uint8 => 1,
            ImageScalarType::Int16 | ImageScalarType::Uint16 => 2,
            ImageScalarType::Int32 | ImageScalarType::Uint32 | ImageScalarType::Float32 => 4,
            ImageScalarType::Float64 => 8,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            2 => Ok(ImageScalarType::Int8),
            3 => Ok(ImageScalarType::Uint8),
            4 => Ok(ImageScalarType::Int16),
            5 => Ok(ImageScalarType::Uint16),
            6 => Ok(ImageScalarType::Int32),
            7 => Ok(ImageScalarType::Uint32),
            10 => Ok(ImageScalarType::Float32),
            11 => Ok(ImageScalarType::Float64),
            _ => Err(LinkError::InvalidHeader(format!(
                "Unknown scalar type value: {value}"
            ))),
        }
    }
}

/// IMAGE message for frame and volume data
///
/// # Wire layout (big-endian)
/// - version: u16
/// - num_components: u8 (1 = grayscale, 3 = RGB, 4 = RGBA)
/// - scalar_type: u8
/// - endian: u8 (1 = big, 2 = little; pixel buffer only)
/// - coordinate: u8 (1 = RAS, 2 = LPS)
/// - size: `u16[3]` (columns, rows, slices)
/// - matrix: `f32[12]`, row-major upper 3x4; column norms carry the pixel
///   spacing, the last column the volume origin
/// - subvolume offset: `u16[3]`
/// - subvolume size: `u16[3]`
/// - pixel buffer: `cols*rows*slices*components*scalar_size` bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
    pub version: u16,
    pub num_components: u8,
    pub scalar_type: ImageScalarType,
    /// Endianness of the pixel buffer (1 = big, 2 = little)
    pub endian: u8,
    /// Patient coordinate convention (1 = RAS, 2 = LPS)
    pub coordinate: u8,
    /// Frame dimensions: columns, rows, slices
    pub size: [u16; 3],
    /// Upper 3x4 of the orientation matrix, row-major
    pub matrix: [[f32; 4]; 3],
    /// Sub-volume offset within the full volume
    pub subvol_offset: [u16; 3],
    /// Sub-volume dimensions; equals `size` for whole-frame transfers
    pub subvol_size: [u16; 3],
    /// Raw pixel buffer
    pub data: Vec<u8>,
}

impl ImageMessage {
    /// Build a whole-frame message, validating the buffer length
    pub fn new(
        scalar_type: ImageScalarType,
        num_components: u8,
        size: [u16; 3],
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = Self::buffer_len(scalar_type, num_components, size);
        if data.len() != expected {
            return Err(LinkError::InvalidSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(ImageMessage {
            version: 1,
            num_components,
            scalar_type,
            endian: 1,
            coordinate: 1,
            size,
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            subvol_offset: [0, 0, 0],
            subvol_size: size,
            data,
        })
    }

    /// Set the orientation matrix
    pub fn with_matrix(mut self, matrix: [[f32; 4]; 3]) -> Self {
        self.matrix = matrix;
        self
    }

    /// Expected pixel buffer length for a format/size combination
    pub fn buffer_len(scalar_type: ImageScalarType, num_components: u8, size: [u16; 3]) -> usize {
        (size[0] as usize)
            * (size[1] as usize)
            * (size[2] as usize)
            * (num_components as usize)
            * scalar_type.size()
    }

    /// Total pixel count
    pub fn num_pixels(&self) -> usize {
        (self.size[0] as usize) * (self.size[1] as usize) * (self.size[2] as usize)
    }

    /// Pixel spacing derived from the matrix column norms
    pub fn spacing(&self) -> [f64; 3] {
        let mut spacing = [0.0; 3];
        for (col, s) in spacing.iter_mut().enumerate() {
            let norm: f64 = (0..3)
                .map(|row| (self.matrix[row][col] as f64).powi(2))
                .sum::<f64>()
                .sqrt();
            *s = norm;
        }
        spacing
    }

    /// Volume origin: the translation column of the matrix
    pub fn origin(&self) -> [f64; 3] {
        [
            self.matrix[0][3] as f64,
            self.matrix[1][3] as f64,
            self.matrix[2][3] as f64,
        ]
    }
}

impl Message for ImageMessage {
    fn message_type() -> &'static str {
        "IMAGE"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(FIXED_SIZE + self.data.len());

        buf.put_u16(self.version);
        buf.put_u8(self.num_components);
        buf.put_u8(self.scalar_type as u8);
        buf.put_u8(self.endian);
        buf.put_u8(self.coordinate);
        for &s in &self.size {
            buf.put_u16(s);
        }
        for row in &self.matrix {
            for &val in row {
                buf.put_f32(val);
            }
        }
        for &o in &self.subvol_offset {
            buf.put_u16(o);
        }
        for &s in &self.subvol_size {
            buf.put_u16(s);
        }
        buf.extend_from_slice(&self.data);

        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_SIZE {
            return Err(LinkError::InvalidSize {
                expected: FIXED_SIZE,
                actual: data.len(),
            });
        }

        let version = data.get_u16();
        let num_components = data.get_u8();
        let scalar_type = ImageScalarType::from_u8(data.get_u8())?;
        let endian = data.get_u8();
        let coordinate = data.get_u8();
        let size = [data.get_u16(), data.get_u16(), data.get_u16()];

        let mut matrix = [[0.0f32; 4]; 3];
        for row in &mut matrix {
            for val in row {
                *val = data.get_f32();
            }
        }

        let subvol_offset = [data.get_u16(), data.get_u16(), data.get_u16()];
        let subvol_size = [data.get_u16(), data.get_u16(), data.get_u16()];

        let pixels = data.to_vec();
        let expected = Self::buffer_len(scalar_type, num_components, size);
        if pixels.len() != expected {
            return Err(LinkError::InvalidSize {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(ImageMessage {
            version,
            num_components,
            scalar_type,
            endian,
            coordinate,
            size,
            matrix,
            subvol_offset,
            subvol_size,
            data: pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type() {
        assert_eq!(ImageMessage::message_type(), "IMAGE");
    }

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ImageScalarType::Uint8.size(), 1);
        assert_eq!(ImageScalarType::Int16.size(), 2);
        assert_eq!(ImageScalarType::Float32.size(), 4);
        assert_eq!(ImageScalarType::Float64.size(), 8);
    }

    #[test]
    fn test_new_validates_buffer() {
        let result = ImageMessage::new(ImageScalarType::Uint8, 1, [10, 10, 1], vec![0u8; 50]);
        assert!(matches!(result, Err(LinkError::InvalidSize { .. })));
    }

    #[test]
    fn test_grayscale_roundtrip() {
        let data: Vec<u8> = (0..64).map(|i| i as u8).collect();
        let original = ImageMessage::new(ImageScalarType::Uint8, 1, [8, 8, 1], data).unwrap();

        let encoded = original.encode_content().unwrap();
        assert_eq!(encoded.len(), FIXED_SIZE + 64);

        let decoded = ImageMessage::decode_content(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_rgba_roundtrip() {
        let data = vec![128u8; 4 * 4 * 1 * 4];
        let original = ImageMessage::new(ImageScalarType::Uint8, 4, [4, 4, 1], data).unwrap();

        let encoded = original.encode_content().unwrap();
        let decoded = ImageMessage::decode_content(&encoded).unwrap();
        assert_eq!(decoded.num_components, 4);
        assert_eq!(decoded.data, original.data);
    }

    #[test]
    fn test_subvolume_roundtrip() {
        let data = vec![0u8; 16 * 16];
        let mut img = ImageMessage::new(ImageScalarType::Uint8, 1, [16, 16, 1], data).unwrap();
        img.subvol_offset = [2, 3, 0];
        img.subvol_size = [8, 8, 1];

        let encoded = img.encode_content().unwrap();
        let decoded = ImageMessage::decode_content(&encoded).unwrap();
        assert_eq!(decoded.subvol_offset, [2, 3, 0]);
        assert_eq!(decoded.subvol_size, [8, 8, 1]);
    }

    #[test]
    fn test_spacing_from_matrix() {
        let data = vec![0u8; 4];
        let img = ImageMessage::new(ImageScalarType::Uint8, 1, [2, 2, 1], data)
            .unwrap()
            .with_matrix([
                [0.2, 0.0, 0.0, 10.0],
                [0.0, 0.5, 0.0, -5.0],
                [0.0, 0.0, 1.0, 0.0],
            ]);

        let spacing = img.spacing();
        assert!((spacing[0] - 0.2).abs() < 1e-6);
        assert!((spacing[1] - 0.5).abs() < 1e-6);
        assert!((spacing[2] - 1.0).abs() < 1e-6);
        assert_eq!(img.origin(), [10.0, -5.0, 0.0]);
    }

    #[test]
    fn test_decode_truncated_pixels() {
        let data = vec![7u8; 16];
        let img = ImageMessage::new(ImageScalarType::Uint8, 1, [4, 4, 1], data).unwrap();
        let mut encoded = img.encode_content().unwrap();
        encoded.truncate(encoded.len() - 3);

        assert!(matches!(
            ImageMessage::decode_content(&encoded),
            Err(LinkError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_unknown_scalar_type() {
        assert!(ImageScalarType::from_u8(99).is_err());
    }
}
