//! Generic pass-through dialect
//!
//! Decoded messages become events unchanged: no geometry derivation, no
//! name rewriting. The right choice for standards-conforming peers.

use crate::dialect::{Dialect, StreamEvent};
use crate::protocol::header::Timestamp;
use crate::protocol::types::{
    ImageMessage, SonixStatusMessage, StatusMessage, StringMessage, TransformMessage,
    UsStatusMessage,
};

#[derive(Debug, Default)]
pub struct GenericDialect;

impl GenericDialect {
    pub fn new() -> Self {
        GenericDialect
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
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
        vec![StreamEvent::Image {
            device: device.to_string(),
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

    fn translate_poly_data(&mut self, device: &str, body: &[u8]) -> Vec<StreamEvent> {
        vec![StreamEvent::PolyData {
            device: device.to_string(),
            data: body.to_vec(),
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
        vec![StreamEvent::SonixStatus {
            device: device.to_string(),
            status,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_passes_through() {
        let mut dialect = GenericDialect::new();
        let image = ImageMessage::new(
            crate::protocol::types::ImageScalarType::Uint8,
            1,
            [2, 2, 1],
            vec![0; 4],
        )
        .unwrap();

        let events = dialect.translate_image("Probe", image.clone(), Timestamp::zero());
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Image { device, image: got, .. } => {
                assert_eq!(device, "Probe");
                assert_eq!(got, &image);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_transform_passes_through() {
        let mut dialect = GenericDialect::new();
        let events = dialect.translate_transform(
            "Tool",
            TransformMessage::translation(1.0, 2.0, 3.0),
            Timestamp::zero(),
        );
        assert!(matches!(events[0], StreamEvent::Transform { .. }));
    }
}
