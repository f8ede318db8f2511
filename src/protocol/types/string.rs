//! STRING body codec
//!
//! Free-form text messages (scanner state descriptions, operator notes).

use crate::error::{LinkError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// STRING message
///
/// # Wire layout (big-endian)
/// - encoding: u16 MIBenum (3 = US-ASCII, 106 = UTF-8)
/// - length: u16
/// - bytes: `u8[length]`
#[derive(Debug, Clone, PartialEq)]
pub struct StringMessage {
    /// Character encoding as a MIBenum value
    pub encoding: u16,
    pub string: String,
}

impl StringMessage {
    /// New message with US-ASCII encoding
    pub fn new(string: impl Into<String>) -> Self {
        StringMessage {
            encoding: 3,
            string: string.into(),
        }
    }

    /// New message with UTF-8 encoding
    pub fn utf8(string: impl Into<String>) -> Self {
        StringMessage {
            encoding: 106,
            string: string.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl Message for StringMessage {
    fn message_type() -> &'static str {
        "STRING"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let bytes = self.string.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(LinkError::BodyTooLarge {
                size: bytes.len(),
                max: u16::MAX as usize,
            });
        }

        let mut buf = Vec::with_capacity(4 + bytes.len());
        buf.put_u16(self.encoding);
        buf.put_u16(bytes.len() as u16);
        buf.extend_from_slice(bytes);
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(LinkError::InvalidSize {
                expected: 4,
                actual: data.len(),
            });
        }

        let encoding = data.get_u16();
        let length = data.get_u16() as usize;

        if data.len() < length {
            return Err(LinkError::InvalidSize {
                expected: length,
                actual: data.len(),
            });
        }

        let string = String::from_utf8(data[..length].to_vec())?;
        Ok(StringMessage { encoding, string })
    }
}
