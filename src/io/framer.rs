//! Message framing state machine
//!
//! Locates message boundaries (header, then body) in a continuous byte
//! stream that may deliver any amount of data at a time. The framer never
//! blocks: each poll either consumes one complete unit or reports that not
//! enough bytes have arrived yet, leaving the source untouched.

use crate::error::{LinkError, Result};
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::Header;
use crate::protocol::message::RawMessage;
use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

/// Sanity bound on declared body sizes
///
/// A corrupt header can declare an absurd size and park the framer in
/// `AwaitBody` forever (or force a giant allocation). Anything above this
/// is rejected as a hard error.
pub const MAX_BODY_SIZE: u64 = 0xFFFF_FFFF;

/// Byte-stream abstraction the framer reads from
///
/// Modeled after a readiness-notified socket: the caller learns how many
/// bytes are currently buffered before deciding to consume them. The
/// connection layer implements this over its receive buffer; tests feed
/// the framer from an in-memory buffer directly.
pub trait ByteSource {
    /// Number of bytes that can be read without blocking
    fn bytes_available(&self) -> usize;

    /// Read up to `buf.len()` bytes, returning the count actually read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl ByteSource for BytesMut {
    fn bytes_available(&self) -> usize {
        self.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.len());
        buf[..n].copy_from_slice(&self[..n]);
        self.advance(n);
        Ok(n)
    }
}

/// Outcome of one framer poll
#[derive(Debug)]
pub enum FramerPoll {
    /// Not enough bytes buffered for the next unit; retry after more arrive
    NotReady,
    /// One complete message was framed
    Message(RawMessage),
}

/// Receive-side state: what the framer is waiting for next
#[derive(Debug)]
enum FramerState {
    AwaitHeader,
    AwaitBody { header: Header },
}

/// Two-state receive loop producing complete messages from partial reads
///
/// One framer per connection. A single scratch buffer is reused across
/// receive cycles; the only per-message allocation is the emitted body.
///
/// # CRC policy
/// When verification is enabled and the header carries a nonzero CRC that
/// does not match the body, [`poll_message`] returns a
/// [`CrcMismatch`](LinkError::CrcMismatch) error, but only after the body
/// has been consumed and the state reset to await the next header. Framing
/// therefore never desynchronizes on corruption; the caller logs the error
/// and keeps polling. A zero CRC means the sender had checking disabled.
///
/// [`poll_message`]: MessageFramer::poll_message
pub struct MessageFramer {
    state: FramerState,
    verify_crc: bool,
    scratch: BytesMut,
}

impl MessageFramer {
    pub fn new(verify_crc: bool) -> Self {
        MessageFramer {
            state: FramerState::AwaitHeader,
            verify_crc,
            scratch: BytesMut::with_capacity(Header::SIZE),
        }
    }

    /// Whether body CRC verification is enabled
    pub fn verify_crc(&self) -> bool {
        self.verify_crc
    }

    /// Discard any in-flight partial message and return to `AwaitHeader`
    ///
    /// Called on disconnect; partial messages never resume across
    /// reconnects.
    pub fn reset(&mut self) {
        self.state = FramerState::AwaitHeader;
        self.scratch.clear();
    }

    /// Attempt to frame the next message from `src`
    ///
    /// Non-blocking: if fewer bytes than the next unit needs are available
    /// the source is left untouched and `NotReady` is returned. The caller
    /// should poll in a loop until `NotReady` after each readiness
    /// notification, since one notification may carry several messages.
    pub fn poll_message(&mut self, src: &mut dyn ByteSource) -> Result<FramerPoll> {
        loop {
            match &self.state {
                FramerState::AwaitHeader => {
                    if src.bytes_available() < Header::SIZE {
                        return Ok(FramerPoll::NotReady);
                    }

                    self.scratch.resize(Header::SIZE, 0);
                    read_exact(src, &mut self.scratch[..Header::SIZE])?;
                    let header = Header::decode(&self.scratch)?;

                    if header.body_size > MAX_BODY_SIZE {
                        // Stay in AwaitHeader; the stream is beyond repair
                        // and the caller is expected to drop the connection.
                        warn!(
                            body_size = header.body_size,
                            "Declared body size exceeds sanity bound"
                        );
                        return Err(LinkError::BodyTooLarge {
                            size: header.body_size as usize,
                            max: MAX_BODY_SIZE as usize,
                        });
                    }

                    trace!(
                        device_type = header.type_name.as_str().unwrap_or("UNKNOWN"),
                        body_size = header.body_size,
                        "Framed header"
                    );
                    self.state = FramerState::AwaitBody { header };
                }
                FramerState::AwaitBody { header } => {
                    let body_size = header.body_size as usize;
                    if src.bytes_available() < body_size {
                        // Header stays decoded; it is never re-read
                        return Ok(FramerPoll::NotReady);
                    }

                    self.scratch.resize(body_size, 0);
                    read_exact(src, &mut self.scratch[..body_size])?;

                    let header = match std::mem::replace(&mut self.state, FramerState::AwaitHeader)
                    {
                        FramerState::AwaitBody { header } => header,
                        FramerState::AwaitHeader => unreachable!(),
                    };

                    if self.verify_crc && header.crc != 0 {
                        let actual = calculate_crc(&self.scratch[..body_size]);
                        if actual != header.crc {
                            debug!(
                                device_type = header.type_name.as_str().unwrap_or("UNKNOWN"),
                                "Body CRC mismatch, message dropped"
                            );
                            return Err(LinkError::CrcMismatch {
                                expected: header.crc,
                                actual,
                            });
                        }
                    }

                    let body = Bytes::copy_from_slice(&self.scratch[..body_size]);
                    return Ok(FramerPoll::Message(RawMessage { header, body }));
                }
            }
        }
    }
}

/// Fill `buf` completely from `src`
///
/// Only called after an availability check, so a short read here means the
/// source lied about its buffered count.
fn read_exact(src: &mut dyn ByteSource, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "byte source returned no data after reporting availability",
            )));
        }
        filled += n;
    }
    Ok(())
}
