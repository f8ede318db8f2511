//! Asynchronous streaming client
//!
//! Tokio-based convenience client for integrations that already run an
//! async runtime. Sends and receives complete wire messages; the raw
//! receive variant returns framed-but-uninterpreted messages so callers
//! can run them through a [`Dispatcher`](crate::dialect::Dispatcher).

use crate::error::Result;
use crate::protocol::header::Header;
use crate::protocol::message::{Message, RawMessage, WireMessage};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Async client for one streaming peer
pub struct AsyncLinkClient {
    stream: TcpStream,
    verify_crc: bool,
}

impl AsyncLinkClient {
    /// Connect to a streaming server
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sonolink::io::AsyncLinkClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = AsyncLinkClient::connect("127.0.0.1:18944").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(addr: &str) -> Result<Self> {
        info!(addr = %addr, "Connecting (async)");
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(local_addr = %stream.local_addr()?, "Connected (async)");

        Ok(AsyncLinkClient {
            stream,
            verify_crc: true,
        })
    }

    /// Enable or disable CRC verification for received messages
    pub fn set_verify_crc(&mut self, verify: bool) {
        if !verify && self.verify_crc {
            warn!("CRC verification disabled; use only on trusted links");
        }
        self.verify_crc = verify;
    }

    pub fn verify_crc(&self) -> bool {
        self.verify_crc
    }

    /// Send one message
    pub async fn send<T: Message>(&mut self, msg: &WireMessage<T>) -> Result<()> {
        let data = msg.encode()?;
        trace!(
            device_type = msg.header.type_name.as_str().unwrap_or("UNKNOWN"),
            size = data.len(),
            "Sending message (async)"
        );

        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive one message of a known type
    pub async fn receive<T: Message>(&mut self) -> Result<WireMessage<T>> {
        let raw = self.receive_raw().await?;

        let mut full = raw.header.encode();
        full.extend_from_slice(&raw.body);
        WireMessage::decode_with_options(&full, self.verify_crc)
    }

    /// Receive one framed message without interpreting the body
    pub async fn receive_raw(&mut self) -> Result<RawMessage> {
        let mut header_buf = [0u8; Header::SIZE];
        self.stream.read_exact(&mut header_buf).await?;
        let header = Header::decode(&header_buf)?;

        debug!(
            device_type = header.type_name.as_str().unwrap_or("UNKNOWN"),
            body_size = header.body_size,
            "Received header (async)"
        );

        let mut body = vec![0u8; header.body_size as usize];
        self.stream.read_exact(&mut body).await?;

        Ok(RawMessage {
            header,
            body: Bytes::from(body),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}
