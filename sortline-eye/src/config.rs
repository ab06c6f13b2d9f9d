//! Configuration for sortline-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Vision configuration: where frames come from and how detections qualify
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Capture device index
    pub camera_id: u32,
    /// Requested capture frame rate
    pub frame_rate: u32,
    /// Requested capture size as (width, height)
    pub resolution: (u32, u32),
    /// Replay frames from this directory instead of the camera
    pub replay_dir: Option<PathBuf>,
    /// Path to the ONNX detection model
    pub model_path: PathBuf,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum confidence for a detection to count and actuate
    pub confidence_threshold: f32,
    /// Score floor applied inside the detector before NMS
    pub model_min_confidence: f32,
    /// IoU above which overlapping boxes of one class are suppressed
    pub iou_threshold: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".sortline");
                p.push("models");
                p.push("best.onnx");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models/best.onnx"));

        Self {
            camera_id: 0,
            frame_rate: 30,
            resolution: (640, 480),
            replay_dir: None,
            model_path,
            input_size: 640,
            confidence_threshold: 0.3,
            model_min_confidence: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=120).contains(&self.frame_rate) {
            return Err(format!("frame_rate must be within 1..=120, got {}", self.frame_rate));
        }

        let (width, height) = self.resolution;
        if width == 0 || height == 0 || width > 7680 || height > 4320 {
            return Err(format!("resolution {}x{} is outside 1x1..=7680x4320", width, height));
        }

        // Replays never touch the device, so its index is irrelevant
        if self.replay_dir.is_none() && self.camera_id > 100 {
            return Err(format!("camera_id {} is not a plausible device index", self.camera_id));
        }

        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(format!("input_size must be a non-zero multiple of 32, got {}", self.input_size));
        }

        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("model_min_confidence", self.model_min_confidence),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.camera_id, 0);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.resolution, (640, 480));
        assert_eq!(config.confidence_threshold, 0.3);
        assert!(config.replay_dir.is_none());
        assert!(config.model_path.ends_with("best.onnx"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_frame_rate() {
        let mut config = VisionConfig::default();
        config.frame_rate = 0;
        assert!(config.validate().is_err());
        config.frame_rate = 121;
        assert!(config.validate().is_err());
        config.frame_rate = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_resolution() {
        let mut config = VisionConfig::default();
        config.resolution = (0, 480);
        assert!(config.validate().is_err());
        config.resolution = (7681, 4320);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_threshold_range() {
        let mut config = VisionConfig::default();
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        config.confidence_threshold = f32::NAN;
        assert!(config.validate().is_err());
        config.confidence_threshold = 0.0;
        assert!(config.validate().is_ok());
        config.iou_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_input_size() {
        let mut config = VisionConfig::default();
        config.input_size = 600;
        assert!(config.validate().is_err());
        config.input_size = 320;
        assert!(config.validate().is_ok());
    }
}
