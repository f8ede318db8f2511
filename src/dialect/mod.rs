//! Dialect layer: interpreting framed messages
//!
//! A dialect is a pluggable interpretation strategy for incoming message
//! bodies, selected per connection. The dispatcher decodes the body by
//! device type and hands it to the active dialect, which turns it into
//! domain events (image arrived, calibration arrived, ...). Dialects
//! implement only the handlers they care about; everything else falls back
//! to a log-and-ignore default.

pub mod generic;
pub mod plus;
pub mod sonix;
pub mod timesync;

pub use generic::GenericDialect;
pub use plus::PlusDialect;
pub use sonix::SonixDialect;
pub use timesync::TimestampSynchronizer;

use crate::error::Result;
use crate::protocol::header::Timestamp;
use crate::protocol::message::RawMessage;
use crate::protocol::types::us_status::ProbeKind;
use crate::protocol::types::{
    ImageMessage, SonixStatusMessage, StatusMessage, StringMessage, TransformMessage,
    UsStatusMessage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scan-plane geometry of an ultrasound probe
///
/// Decoded from the custom status messages or derived from an image's
/// orientation matrix by the Plus dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeGeometry {
    /// Sector apex (sector probes) or image origin (linear probes)
    pub origin: [f64; 3],
    /// Imaging depth range start, millimeters
    pub depth_start: f64,
    /// Imaging depth range end, millimeters
    pub depth_end: f64,
    /// Sector angle (sector) or lateral extent in millimeters (linear)
    pub width: f64,
    /// Interpreted probe kind, `None` when the sender used an unknown value
    pub kind: Option<ProbeKind>,
}

/// Domain event produced by the dialect layer
///
/// This is the engine's outward face: consumers subscribe to a stream of
/// these instead of touching wire bytes.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A decoded image frame, timestamp re-stamped into local time
    Image {
        device: String,
        image: ImageMessage,
        timestamp: Timestamp,
    },
    /// A tracked-tool pose, timestamp re-stamped into local time
    Transform {
        device: String,
        matrix: [[f32; 4]; 4],
        timestamp: Timestamp,
    },
    /// A calibration transform routed to a tracked device
    Calibration {
        device: String,
        matrix: [[f32; 4]; 4],
    },
    /// Probe scan geometry changed
    ProbeDefinition {
        device: String,
        geometry: ProbeGeometry,
    },
    /// Custom US sector/status message passed through
    UsStatus {
        device: String,
        status: UsStatusMessage,
    },
    /// Legacy Sonix status message passed through
    SonixStatus {
        device: String,
        status: SonixStatusMessage,
    },
    /// Generic device status passed through
    Status {
        device: String,
        status: StatusMessage,
    },
    /// Free-form text passed through
    Text { device: String, text: String },
    /// Opaque polygonal geometry for the external geometry codec
    PolyData { device: String, data: Vec<u8> },
    /// Connection lifecycle transition
    StateChanged(crate::io::connection::ConnectionState),
    /// Connection-level or decode error, human-readable
    Error(String),
}

/// Interpretation strategy for incoming message bodies
///
/// Every handler has a "not supported, log and ignore" default so a dialect
/// implements only the subset it understands.
pub trait Dialect: Send {
    /// Dialect name as used in connection configuration
    fn name(&self) -> &'static str;

    fn translate_transform(
        &mut self,
        device: &str,
        _transform: TransformMessage,
        _timestamp: Timestamp,
    ) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "TRANSFORM not supported, ignoring");
        Vec::new()
    }

    fn translate_image(
        &mut self,
        device: &str,
        _image: ImageMessage,
        _timestamp: Timestamp,
    ) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "IMAGE not supported, ignoring");
        Vec::new()
    }

    fn translate_status(&mut self, device: &str, _status: StatusMessage) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "STATUS not supported, ignoring");
        Vec::new()
    }

    fn translate_string(&mut self, device: &str, _text: StringMessage) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "STRING not supported, ignoring");
        Vec::new()
    }

    fn translate_poly_data(&mut self, device: &str, _body: &[u8]) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "POLYDATA not supported, ignoring");
        Vec::new()
    }

    fn translate_us_status(&mut self, device: &str, _status: UsStatusMessage) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "CX_US_ST not supported, ignoring");
        Vec::new()
    }

    fn translate_sonix_status(
        &mut self,
        device: &str,
        _status: SonixStatusMessage,
    ) -> Vec<StreamEvent> {
        debug!(dialect = self.name(), device, "SONIX_ST not supported, ignoring");
        Vec::new()
    }
}

/// Available dialects, selected by name at connection setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DialectKind {
    /// Pass decoded messages through unchanged
    #[default]
    Generic,
    /// Plus-server variant: probe geometry and calibration derivation
    Plus,
    /// Legacy Sonix variant: channel-order tag handling
    Sonix,
}

impl DialectKind {
    /// Parse a configured dialect name, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "generic" | "openigtlink" => Some(DialectKind::Generic),
            "plus" | "plusserver" => Some(DialectKind::Plus),
            "sonix" | "ransonix" => Some(DialectKind::Sonix),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::Generic => "generic",
            DialectKind::Plus => "plus",
            DialectKind::Sonix => "sonix",
        }
    }

    /// Instantiate the dialect with its default configuration
    pub fn create(&self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Generic => Box::new(GenericDialect::new()),
            DialectKind::Plus => Box::new(PlusDialect::new()),
            DialectKind::Sonix => Box::new(SonixDialect::new()),
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Routes framed messages to the active dialect by device type
///
/// Also owns the timestamp synchronizer: every message's remote timestamp
/// feeds the sliding-window clock offset, and image/transform events carry
/// the re-stamped local time.
///
/// One documented special case rides on top of the device-type dispatch: a
/// `STATUS` message whose device name contains `"Sonix"` selects the legacy
/// Sonix status decoder instead of the generic one. New device types must
/// be dispatched on device type alone.
pub struct Dispatcher {
    dialect: Box<dyn Dialect>,
    timesync: TimestampSynchronizer,
}

impl Dispatcher {
    pub fn new(kind: DialectKind) -> Self {
        Self::with_dialect(kind.create())
    }

    pub fn with_dialect(dialect: Box<dyn Dialect>) -> Self {
        Dispatcher {
            dialect,
            timesync: TimestampSynchronizer::new(),
        }
    }

    /// Active dialect name
    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    /// Current clock shift estimate in milliseconds
    pub fn clock_shift_ms(&self) -> f64 {
        self.timesync.shift_ms()
    }

    /// Interpret one framed message, producing zero or more domain events
    ///
    /// Unknown device types produce no events and no error; their bodies
    /// were already consumed by the framer, so the stream stays in sync.
    /// Decode failures surface as errors for the caller to log; they never
    /// abort the connection.
    pub fn dispatch(&mut self, raw: &RawMessage) -> Result<Vec<StreamEvent>> {
        let device_type = raw.device_type().to_string();
        let device = raw.device_name().to_string();

        self.timesync.sample_now(raw.header.timestamp.to_millis());
        let timestamp = self.timesync.to_local(raw.header.timestamp);

        let events = match device_type.as_str() {
            "TRANSFORM" => {
                let transform: TransformMessage = raw.decode_as()?;
                self.dialect.translate_transform(&device, transform, timestamp)
            }
            "IMAGE" => {
                let image: ImageMessage = raw.decode_as()?;
                self.dialect.translate_image(&device, image, timestamp)
            }
            // Legacy senders tag Sonix status bodies with the generic
            // STATUS device type; the name is the only discriminator.
            "STATUS" if device.contains("Sonix") => {
                let status: SonixStatusMessage = raw.decode_as()?;
                self.dialect.translate_sonix_status(&device, status)
            }
            "STATUS" => {
                let status: StatusMessage = raw.decode_as()?;
                self.dialect.translate_status(&device, status)
            }
            "STRING" => {
                let text: StringMessage = raw.decode_as()?;
                self.dialect.translate_string(&device, text)
            }
            "POLYDATA" => self.dialect.translate_poly_data(&device, &raw.body),
            t if t == UsStatusMessage::DEVICE_TYPE => {
                let status: UsStatusMessage = raw.decode_as()?;
                self.dialect.translate_us_status(&device, status)
            }
            t if t == SonixStatusMessage::DEVICE_TYPE => {
                let status: SonixStatusMessage = raw.decode_as()?;
                self.dialect.translate_sonix_status(&device, status)
            }
            other => {
                debug!(
                    device_type = other,
                    device,
                    body_size = raw.body.len(),
                    "Skipping message of unknown device type"
                );
                Vec::new()
            }
        };

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::{DeviceName, Header, TypeName};
    use crate::protocol::message::WireMessage;
    use bytes::Bytes;

    fn raw_from<T: crate::protocol::message::Message>(content: T, device: &str) -> RawMessage {
        let encoded = WireMessage::new(content, device).unwrap().encode().unwrap();
        RawMessage {
            header: Header::decode(&encoded[..Header::SIZE]).unwrap(),
            body: Bytes::copy_from_slice(&encoded[Header::SIZE..]),
        }
    }

    #[test]
    fn test_unknown_type_skipped_without_error() {
        let header = Header {
            version: 1,
            type_name: TypeName::new("NDARRAY").unwrap(),
            device_name: DeviceName::new("Sensor").unwrap(),
            timestamp: Timestamp::now(),
            body_size: 4,
            crc: 0,
        };
        let raw = RawMessage {
            header,
            body: Bytes::from_static(&[1, 2, 3, 4]),
        };

        let mut dispatcher = Dispatcher::new(DialectKind::Generic);
        let events = dispatcher.dispatch(&raw).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_then_known_decodes_second() {
        let mut dispatcher = Dispatcher::new(DialectKind::Generic);

        let unknown = RawMessage {
            header: Header {
                version: 1,
                type_name: TypeName::new("SENSOR").unwrap(),
                device_name: DeviceName::new("X").unwrap(),
                timestamp: Timestamp::now(),
                body_size: 8,
                crc: 0,
            },
            body: Bytes::from_static(&[0; 8]),
        };
        assert!(dispatcher.dispatch(&unknown).unwrap().is_empty());

        let known = raw_from(TransformMessage::identity(), "Tool");
        let events = dispatcher.dispatch(&known).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Transform { .. }));
    }

    #[test]
    fn test_sonix_name_heuristic_on_status_type() {
        // STATUS type + "Sonix" in the name selects the legacy decoder
        let status = SonixStatusMessage::changed(1.0, 2.0, 3.0);
        let body = crate::protocol::message::Message::encode_content(&status).unwrap();

        let raw = RawMessage {
            header: Header {
                version: 1,
                type_name: TypeName::new("STATUS").unwrap(),
                device_name: DeviceName::new("SonixScanner").unwrap(),
                timestamp: Timestamp::now(),
                body_size: body.len() as u64,
                crc: 0,
            },
            body: Bytes::from(body),
        };

        let mut dispatcher = Dispatcher::new(DialectKind::Sonix);
        let events = dispatcher.dispatch(&raw).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::SonixStatus { .. })));
    }

    #[test]
    fn test_dialect_kind_names() {
        assert_eq!(DialectKind::from_name("PLUS"), Some(DialectKind::Plus));
        assert_eq!(DialectKind::from_name("generic"), Some(DialectKind::Generic));
        assert_eq!(DialectKind::from_name("RanSonix"), Some(DialectKind::Sonix));
        assert_eq!(DialectKind::from_name("mystery"), None);
        assert_eq!(DialectKind::Plus.name(), "plus");
    }
}
