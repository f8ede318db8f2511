//! Legacy Sonix dialect
//!
//! Sonix-era senders announce the channel layout of their frames inside the
//! device name, as a bracketed tag like `MyDevice [RGBA]` or `Cam [BGR]`.
//! This dialect parses the tag, reorders decoded channels into canonical
//! RGB (discarding alpha) and strips the tag from the reported name. It
//! also understands the legacy `SONIX_ST` status message.

use crate::dialect::{Dialect, ProbeGeometry, StreamEvent};
use crate::protocol::header::Timestamp;
use crate::protocol::types::{
    ImageMessage, ImageScalarType, SonixStatusMessage, StatusMessage, StringMessage,
    TransformMessage, UsStatusMessage,
};
use tracing::debug;

/// Channel order when the tag is absent, malformed, or incomplete
const DEFAULT_ORDER: [usize; 3] = [0, 1, 2];

/// Legacy Sonix interpretation rules
#[derive(Debug, Default)]
pub struct SonixDialect;

impl SonixDialect {
    pub fn new() -> Self {
        SonixDialect
    }
}

/// Split a device name into its clean form and the R/G/B source indices
///
/// The tag is a bracketed run of 1 to 4 letters naming the source channel
/// order. Each of R, G and B is looked up in the tag; unless all three are
/// present the default order (0, 1, 2) is used unconditionally.
fn parse_channel_tag(device: &str) -> (String, [usize; 3]) {
    let (open, close) = match (device.find('['), device.find(']')) {
        (Some(o), Some(c)) if c > o => (o, c),
        _ => return (device.to_string(), DEFAULT_ORDER),
    };

    let tag = &device[open + 1..close];
    let mut clean = String::with_capacity(device.len());
    clean.push_str(&device[..open]);
    clean.push_str(&device[close + 1..]);
    let clean = clean.trim().to_string();

    if !(1..=4).contains(&tag.len()) {
        return (clean, DEFAULT_ORDER);
    }

    match (tag.find('R'), tag.find('G'), tag.find('B')) {
        (Some(r), Some(g), Some(b)) => (clean, [r, g, b]),
        _ => (clean, DEFAULT_ORDER),
    }
}

/// Extract the tagged channels of an 8-bit frame into a packed RGB buffer
///
/// Frames with fewer than three components, non-8-bit scalars, or a tag
/// index beyond the component count pass through unchanged.
fn reorder_channels(image: ImageMessage, order: [usize; 3]) -> ImageMessage {
    let components = image.num_components as usize;
    if components < 3 || image.scalar_type != ImageScalarType::Uint8 {
        return image;
    }

    let order = if order.iter().any(|&i| i >= components) {
        debug!(?order, components, "Channel tag exceeds component count, using default order");
        DEFAULT_ORDER
    } else {
        order
    };

    let pixels = image.num_pixels();
    let mut rgb = Vec::with_capacity(pixels * 3);
    for p in 0..pixels {
        let base = p * components;
        for &c in &order {
            rgb.push(image.data[base + c]);
        }
    }

    ImageMessage {
        num_components: 3,
        data: rgb,
        ..image
    }
}

impl Dialect for SonixDialect {
    fn name(&self) -> &'static str {
        "sonix"
    }

    fn translate_transform(
        &mut self,
        device: &str,
        transform: TransformMessage,
        timestamp: Timestamp,
    ) -> Vec<StreamEvent> {
        vec![StreamEvent::Transform {
            device: device.to_string(),
            matrix: transform.matrix,
            timestamp,
        }]
    }

    fn translate_image(
        &mut self,
        device: &str,
        image: ImageMessage,
        timestamp: Timestamp,
    ) -> Vec<StreamEvent> {
        let (clean_name, order) = parse_channel_tag(device);
        let image = reorder_channels(image, order);

        vec![StreamEvent::Image {
            device: clean_name,
            image,
            timestamp,
        }]
    }

    fn translate_status(&mut self, device: &str, status: StatusMessage) -> Vec<StreamEvent> {
        vec![StreamEvent::Status {
            device: device.to_string(),
            status,
        }]
    }

    fn translate_string(&mut self, device: &str, text: StringMessage) -> Vec<StreamEvent> {
        vec![StreamEvent::Text {
            device: device.to_string(),
            text: text.string,
        }]
    }

    fn translate_us_status(&mut self, device: &str, status: UsStatusMessage) -> Vec<StreamEvent> {
        vec![StreamEvent::UsStatus {
            device: device.to_string(),
            status,
        }]
    }

    fn translate_sonix_status(
        &mut self,
        device: &str,
        status: SonixStatusMessage,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(2);

        if status.is_changed() {
            events.push(StreamEvent::ProbeDefinition {
                device: device.to_string(),
                geometry: ProbeGeometry {
                    origin: [status.origin_x, status.origin_y, status.origin_z],
                    depth_start: 0.0,
                    depth_end: 0.0,
                    width: 0.0,
                    kind: None,
                },
            });
        }

        events.push(StreamEvent::SonixStatus {
            device: device.to_string(),
            status,
        });
        events
    }
}
