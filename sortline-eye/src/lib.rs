//! sortline-eye: frame acquisition and the detector boundary
//!
//! Everything that turns pixels into typed detections lives here. The model
//! itself is opaque: backends only have to produce raw class ids, which are
//! mapped onto the closed class set before the control loop sees them.

pub mod config;
pub mod error;
pub mod frame;
pub mod detector;
pub mod filter;
pub mod replay;
#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "onnx")]
pub mod models;

pub use config::VisionConfig;
pub use detector::{classify, Detector, RawDetection};
pub use error::VisionError;
pub use filter::ConfidenceFilter;
pub use frame::{Frame, FrameSource};
pub use replay::ImageDirSource;
