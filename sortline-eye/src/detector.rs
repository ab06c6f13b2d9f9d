//! Detector boundary
//!
//! Backends emit [`RawDetection`]s carrying the model's numeric class id.
//! [`classify`] maps them onto the closed class set; ids outside the set are
//! dropped here so nothing downstream ever sees an unlabeled detection.

use crate::error::VisionError;
use crate::frame::Frame;
use sortline_core::{BoundingBox, Detection, ObjectClass};
use tracing::warn;

/// Detection straight out of a model, before class mapping
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Frame to ordered detections.
///
/// Implementations keep no state between calls that is visible to the loop.
pub trait Detector: Send {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, VisionError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        (**self).infer(frame)
    }
}

/// Map raw model output onto [`ObjectClass`], preserving order.
pub fn classify(raw: Vec<RawDetection>) -> Vec<Detection> {
    let mut rejected = 0usize;
    let detections: Vec<Detection> = raw
        .into_iter()
        .filter_map(|r| match ObjectClass::from_class_id(r.class_id) {
            Ok(class) => Some(Detection::new(class, r.confidence, r.bbox)),
            Err(_) => {
                rejected += 1;
                None
            }
        })
        .collect();

    if rejected > 0 {
        warn!("Dropped {} detections with class ids outside the known set", rejected);
    }
    detections
}

/// Greedy per-class non-maximum suppression. Output is sorted by confidence.
pub fn non_max_suppression(mut raw: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    raw.retain(|d| d.confidence.is_finite());
    raw.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::with_capacity(raw.len());
    for candidate in raw {
        let suppressed = keep.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}
