//! Confidence gate between the detector and the control loop

use crate::error::VisionError;
use sortline_core::Detection;

/// Keeps detections whose confidence meets or exceeds the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFilter {
    threshold: f32,
}

impl ConfidenceFilter {
    pub fn new(threshold: f32) -> Result<Self, VisionError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(VisionError::Config(format!(
                "Confidence threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_qualifying(&self, detection: &Detection) -> bool {
        detection.confidence >= self.threshold
    }

    /// Qualifying detections in detector order.
    pub fn qualifying(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|d| self.is_qualifying(d))
            .collect()
    }
}
