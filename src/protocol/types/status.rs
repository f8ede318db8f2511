//! STATUS body codec
//!
//! Device status notifications: a numeric code, an optional sub-code, a
//! short error name and a free-form status string.

use crate::error::{LinkError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// Minimum body: code (2) + subcode (8) + error name (20) + terminator (1)
const MIN_SIZE: usize = 31;

/// STATUS message
///
/// # Wire layout (big-endian)
/// - code: u16 (0 = invalid, 1 = OK, others device-specific)
/// - subcode: i64
/// - error name: `char[20]`, null-padded
/// - status string: variable, null-terminated
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub code: u16,
    pub subcode: i64,
    /// Short error identifier, truncated to 20 bytes on the wire
    pub error_name: String,
    pub status_string: String,
}

impl StatusMessage {
    /// OK status with a message
    pub fn ok(status_string: &str) -> Self {
        StatusMessage {
            code: 1,
            subcode: 0,
            error_name: String::new(),
            status_string: status_string.to_string(),
        }
    }

    /// Error status with a name and message
    pub fn error(error_name: &str, status_string: &str) -> Self {
        StatusMessage {
            code: 0,
            subcode: 0,
            error_name: error_name.to_string(),
            status_string: status_string.to_string(),
        }
    }
}

impl Message for StatusMessage {
    fn message_type() -> &'static str {
        "STATUS"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MIN_SIZE + self.status_string.len());

        buf.put_u16(self.code);
        buf.put_i64(self.subcode);

        let mut name_bytes = [0u8; 20];
        let name_len = self.error_name.len().min(20);
        name_bytes[..name_len].copy_from_slice(&self.error_name.as_bytes()[..name_len]);
        buf.extend_from_slice(&name_bytes);

        buf.extend_from_slice(self.status_string.as_bytes());
        buf.put_u8(0);

        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_SIZE {
            return Err(LinkError::InvalidSize {
                expected: MIN_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let code = cursor.get_u16();
        let subcode = cursor.get_i64();

        let mut name_bytes = [0u8; 20];
        cursor.copy_to_slice(&mut name_bytes);
        let error_name = String::from_utf8_lossy(&name_bytes)
            .trim_end_matches('\0')
            .to_string();

        let remaining = &data[cursor.position() as usize..];
        let text: Vec<u8> = remaining.iter().take_while(|&&b| b != 0).copied().collect();
        let status_string = String::from_utf8(text)?;

        Ok(StatusMessage {
            code,
            subcode,
            error_name,
            status_string,
        })
    }
}
