//! Plus-server dialect
//!
//! Plus servers embed probe geometry in the image orientation matrix and
//! publish calibrations as ordinary transforms with a marker keyword in the
//! device name. This dialect recovers both: every image additionally yields
//! a probe definition and a calibration transform (after a fixed
//! coordinate-system correction), and keyword-tagged transforms are routed
//! to the tracked device they calibrate.

use crate::dialect::{Dialect, ProbeGeometry, StreamEvent};
use crate::protocol::header::Timestamp;
use crate::protocol::types::us_status::ProbeKind;
use crate::protocol::types::{
    ImageMessage, StatusMessage, StringMessage, TransformMessage, UsStatusMessage,
};
use tracing::debug;

/// Default marker substring identifying calibration transforms
pub const DEFAULT_CALIBRATION_KEYWORD: &str = "Calibration";

/// Fixed correction from the image coordinate convention used by Plus
/// servers into the patient-reference convention expected downstream.
const COORDINATE_CORRECTION: [[f32; 4]; 4] = [
    [0.0, -1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, -1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Plus-server interpretation rules
pub struct PlusDialect {
    calibration_keyword: String,
    /// Device names of transforms seen on this connection, in arrival order
    seen_transforms: Vec<String>,
}

impl PlusDialect {
    pub fn new() -> Self {
        Self::with_calibration_keyword(DEFAULT_CALIBRATION_KEYWORD)
    }

    /// Use a non-default calibration marker keyword
    pub fn with_calibration_keyword(keyword: impl Into<String>) -> Self {
        PlusDialect {
            calibration_keyword: keyword.into(),
            seen_transforms: Vec::new(),
        }
    }

    /// Find the tracked device a calibration belongs to
    ///
    /// First-match substring search over previously seen transform names,
    /// in arrival order. Ambiguity resolves to the earliest match; no match
    /// means the calibration is discarded.
    fn match_calibration_target(&self, base: &str) -> Option<&str> {
        self.seen_transforms
            .iter()
            .find(|seen| seen.contains(base) || base.contains(seen.as_str()))
            .map(String::as_str)
    }

    fn geometry_from_image(image: &ImageMessage) -> ProbeGeometry {
        let spacing = image.spacing();
        ProbeGeometry {
            origin: image.origin(),
            depth_start: 0.0,
            depth_end: image.size[1] as f64 * spacing[1],
            width: image.size[0] as f64 * spacing[0],
            kind: Some(ProbeKind::Linear),
        }
    }
}

impl Default for PlusDialect {
    fn default() -> Self {
        Self::new()
    }
}

fn embed_3x4(m: &[[f32; 4]; 3]) -> [[f32; 4]; 4] {
    [m[0], m[1], m[2], [0.0, 0.0, 0.0, 1.0]]
}

fn mat_mul(a: &[[f32; 4]; 4], b: &[[f32; 4]; 4]) -> [[f32; 4]; 4] {
    let mut out = [[0.0f32; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

impl Dialect for PlusDialect {
    fn name(&self) -> &'static str {
        "plus"
    }

    fn translate_transform(
        &mut self,
        device: &str,
        transform: TransformMessage,
        timestamp: Timestamp,
    ) -> Vec<StreamEvent> {
        if device.contains(&self.calibration_keyword) {
            let base = device.replace(&self.calibration_keyword, "");
            let base = base.trim();

            return match self.match_calibration_target(base) {
                Some(target) => vec![StreamEvent::Calibration {
                    device: target.to_string(),
                    matrix: transform.matrix,
                }],
                None => {
                    debug!(
                        device,
                        base, "No tracked transform matches calibration, discarding"
                    );
                    Vec::new()
                }
            };
        }

        if !self.seen_transforms.iter().any(|t| t == device) {
            self.seen_transforms.push(device.to_string());
        }

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
        let geometry = Self::geometry_from_image(&image);
        let calibration = mat_mul(&embed_3x4(&image.matrix), &COORDINATE_CORRECTION);

        vec![
            StreamEvent::ProbeDefinition {
                device: device.to_string(),
                geometry,
            },
            StreamEvent::Calibration {
                device: device.to_string(),
                matrix: calibration,
            },
            StreamEvent::Image {
                device: device.to_string(),
                image,
                timestamp,
            },
        ]
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
        let geometry = ProbeGeometry {
            origin: [status.origin_x, status.origin_y, status.origin_z],
            depth_start: status.depth_start,
            depth_end: status.depth_end,
            width: status.width,
            kind: status.kind(),
        };

        vec![
            StreamEvent::ProbeDefinition {
                device: device.to_string(),
                geometry,
            },
            StreamEvent::UsStatus {
                device: device.to_string(),
                status,
            },
        ]
    }
}
