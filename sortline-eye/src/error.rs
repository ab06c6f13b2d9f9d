//! Error types for sortline-eye

use sortline_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("End of stream: {0}")]
    EndOfStream(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::EndOfStream(msg) => CoreError::StreamEnded(msg),
            VisionError::Config(msg) => CoreError::Configuration(msg),
            VisionError::Core(inner) => inner,
            VisionError::Model(msg) | VisionError::Inference(msg) | VisionError::Ort(msg) => CoreError::PeripheralUnavailable {
                peripheral: "detector".to_string(),
                reason: msg,
            },
            other => CoreError::PeripheralUnavailable {
                peripheral: "frame source".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(feature = "camera")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Ort(err.to_string())
    }
}
