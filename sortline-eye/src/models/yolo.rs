//! YOLOv8 object detection via ONNX Runtime

use crate::config::VisionConfig;
use crate::detector::{classify, non_max_suppression, Detector, RawDetection};
use crate::error::VisionError;
use crate::frame::Frame;
use image::imageops::{self, FilterType};
use ort::session::Session;
use ort::value::Tensor;
use sortline_core::{BoundingBox, Detection};
use std::path::Path;
use tracing::{debug, info};

/// YOLOv8 detector. Expects a single `[1, 4 + nc, anchors]` output.
pub struct YoloDetector {
    session: Session,
    input_size: u32,
    min_confidence: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    pub fn new(model_path: &Path, config: &VisionConfig) -> Result<Self, VisionError> {
        if !model_path.exists() {
            return Err(VisionError::Model(format!("Model file {:?} not found", model_path)));
        }

        let session = Session::builder()?
            .commit_from_file(model_path)
            .map_err(|e| VisionError::Model(format!("Failed to load YOLO model: {}", e)))?;

        info!("YOLO model loaded from {:?}", model_path);

        Ok(Self {
            session,
            input_size: config.input_size,
            min_confidence: config.model_min_confidence,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Resize to the model input and lay out as normalized CHW floats
    fn preprocess(&self, frame: &Frame) -> Vec<f32> {
        let size = self.input_size;
        let resized = imageops::resize(&frame.image, size, size, FilterType::Triangle);

        let plane = (size * size) as usize;
        let mut chw = vec![0.0f32; plane * 3];
        for (i, pixel) in resized.pixels().enumerate() {
            chw[i] = pixel[0] as f32 / 255.0;
            chw[plane + i] = pixel[1] as f32 / 255.0;
            chw[2 * plane + i] = pixel[2] as f32 / 255.0;
        }
        chw
    }
}

/// Decode a YOLOv8 head: rows are cx, cy, w, h, then one score per class.
pub fn decode_output(
    shape: &[i64],
    data: &[f32],
    scale: (f32, f32),
    min_confidence: f32,
) -> Result<Vec<RawDetection>, VisionError> {
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
        return Err(VisionError::Inference(format!("Unexpected YOLO output shape {:?}", shape)));
    }
    let bad_shape = || VisionError::Inference(format!("Unexpected YOLO output shape {:?}", shape));
    let rows = usize::try_from(shape[1]).map_err(|_| bad_shape())?;
    let anchors = usize::try_from(shape[2]).map_err(|_| bad_shape())?;
    let expected = rows.checked_mul(anchors).ok_or_else(bad_shape)?;
    if data.len() < expected {
        return Err(VisionError::Inference("YOLO output shorter than its shape".to_string()));
    }

    let at = |row: usize, anchor: usize| data[row * anchors + anchor];
    let mut raw = Vec::new();
    for anchor in 0..anchors {
        let (class_id, confidence) = (4..rows)
            .map(|row| (row - 4, at(row, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if !confidence.is_finite() || confidence < min_confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        raw.push(RawDetection {
            class_id,
            confidence: confidence.min(1.0),
            bbox: BoundingBox::new(
                (cx - w / 2.0) * scale.0,
                (cy - h / 2.0) * scale.1,
                (cx + w / 2.0) * scale.0,
                (cy + h / 2.0) * scale.1,
            ),
        });
    }
    Ok(raw)
}

impl Detector for YoloDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        let size = self.input_size as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], self.preprocess(frame)))?;

        let outputs = self.session.run(ort::inputs![input])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let scale = (
            frame.width() as f32 / self.input_size as f32,
            frame.height() as f32 / self.input_size as f32,
        );
        let raw = decode_output(shape, data, scale, self.min_confidence)?;
        let kept = non_max_suppression(raw, self.iou_threshold);
        debug!("YOLO kept {} boxes on frame {}", kept.len(), frame.index);

        Ok(classify(kept))
    }
}
