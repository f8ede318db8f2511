//! Body codec implementations
//!
//! One module per device type handled by the engine. The two custom
//! ultrasound status codecs sit next to the generic OpenIGTLink types.

pub mod image;
pub mod sonix_status;
pub mod status;
pub mod string;
pub mod transform;
pub mod us_status;

pub use image::{ImageMessage, ImageScalarType};
pub use sonix_status::SonixStatusMessage;
pub use status::StatusMessage;
pub use string::StringMessage;
pub use transform::TransformMessage;
pub use us_status::{ProbeKind, UsStatusMessage};
