//! Message trait and wire message wrapper
//!
//! Defines the interface every body codec implements and the generic
//! header+content wrapper that is serialized onto the stream.

use crate::error::{LinkError, Result};
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::{DeviceName, Header, Timestamp, TypeName};
use bytes::Bytes;

/// Common interface for all wire body codecs
///
/// Each device type (TRANSFORM, IMAGE, CX_US_ST, ...) implements this trait
/// to translate between its struct form and the wire byte layout.
pub trait Message: Sized {
    /// The device type string carried in the header (max 12 bytes)
    fn message_type() -> &'static str;

    /// Pack the body into its wire byte layout (without header)
    fn encode_content(&self) -> Result<Vec<u8>>;

    /// Unpack the body from its wire byte layout (without header)
    fn decode_content(data: &[u8]) -> Result<Self>;
}

/// A complete wire message: header plus typed content
#[derive(Debug)]
pub struct WireMessage<T: Message> {
    /// 58-byte preamble
    pub header: Header,
    /// Decoded body
    pub content: T,
}

impl<T: Message> WireMessage<T> {
    /// Wrap content with a freshly stamped header
    ///
    /// The body size and CRC fields are filled in during [`encode`], once
    /// the final body bytes exist.
    ///
    /// [`encode`]: WireMessage::encode
    pub fn new(content: T, device_name: &str) -> Result<Self> {
        let header = Header {
            version: 1,
            type_name: TypeName::new(T::message_type())?,
            device_name: DeviceName::new(device_name)?,
            timestamp: Timestamp::now(),
            body_size: 0,
            crc: 0,
        };
        Ok(WireMessage { header, content })
    }

    /// Serialize header plus body into one transmit buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = self.content.encode_content()?;

        let mut header = self.header.clone();
        header.body_size = body.len() as u64;
        header.crc = calculate_crc(&body);

        let mut buf = Vec::with_capacity(Header::SIZE + body.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Deserialize a complete message, optionally verifying the body CRC
    pub fn decode_with_options(data: &[u8], verify_crc: bool) -> Result<Self> {
        if data.len() < Header::SIZE {
            return Err(LinkError::InvalidSize {
                expected: Header::SIZE,
                actual: data.len(),
            });
        }

        let header = Header::decode(&data[..Header::SIZE])?;

        let declared = header.type_name.as_str()?;
        if declared != T::message_type() {
            return Err(LinkError::UnknownDeviceType(declared.to_string()));
        }

        let body_end = Header::SIZE + header.body_size as usize;
        if data.len() < body_end {
            return Err(LinkError::InvalidSize {
                expected: body_end,
                actual: data.len(),
            });
        }
        let body = &data[Header::SIZE..body_end];

        if verify_crc {
            let actual = calculate_crc(body);
            if actual != header.crc {
                return Err(LinkError::CrcMismatch {
                    expected: header.crc,
                    actual,
                });
            }
        }

        let content = T::decode_content(body)?;
        Ok(WireMessage { header, content })
    }

    /// Deserialize a complete message with CRC verification enabled
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with_options(data, true)
    }
}

/// A framed but not yet interpreted message
///
/// This is what the framing state machine emits: the decoded header and the
/// raw body bytes. The dialect dispatcher selects the body codec from the
/// header's device type (and, for one legacy special case, the device name).
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Decoded 58-byte preamble
    pub header: Header,
    /// Body bytes, exactly `header.body_size` long
    pub body: Bytes,
}

impl RawMessage {
    /// Device type as a string, or "UNKNOWN" if not valid UTF-8
    pub fn device_type(&self) -> &str {
        self.header.type_name.as_str().unwrap_or("UNKNOWN")
    }

    /// Device name as a string, or "UNKNOWN" if not valid UTF-8
    pub fn device_name(&self) -> &str {
        self.header.device_name.as_str().unwrap_or("UNKNOWN")
    }

    /// Decode the body with a concrete codec
    pub fn decode_as<T: Message>(&self) -> Result<T> {
        T::decode_content(&self.body)
    }
}
