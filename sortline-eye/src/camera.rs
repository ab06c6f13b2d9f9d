//! USB webcam capture

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::frame::{Frame, FrameSource};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Frame source backed by an OpenCV capture device
pub struct CameraSource {
    config: Arc<VisionConfig>,
    capture: Option<VideoCapture>,
    next_index: u64,
}

impl CameraSource {
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self {
            config,
            capture: None,
            next_index: 0,
        }
    }

    fn to_rgb(bgr: &Mat) -> Result<RgbImage, VisionError> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let rgb = if rgb.is_continuous() { rgb } else { rgb.try_clone()? };

        let (width, height) = (rgb.cols(), rgb.rows());
        if width <= 0 || height <= 0 {
            return Err(VisionError::Camera("Captured frame has no pixels".to_string()));
        }

        let data = rgb.data_bytes()?.to_vec();
        RgbImage::from_raw(width as u32, height as u32, data)
            .ok_or_else(|| VisionError::Camera("Captured frame has unexpected layout".to_string()))
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<(), VisionError> {
        if self.capture.is_some() {
            return Ok(());
        }

        let camera_id = self.config.camera_id;
        let mut capture = VideoCapture::new(camera_id as i32, CAP_ANY)
            .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", camera_id, e)))?;

        if !capture
            .is_opened()
            .map_err(|e| VisionError::Camera(format!("Camera {} not opened: {}", camera_id, e)))?
        {
            return Err(VisionError::Camera(format!("Camera {} failed to open", camera_id)));
        }

        capture
            .set(CAP_PROP_FRAME_WIDTH, self.config.resolution.0 as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set width: {}", e)))?;
        capture
            .set(CAP_PROP_FRAME_HEIGHT, self.config.resolution.1 as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set height: {}", e)))?;
        if let Err(e) = capture.set(CAP_PROP_FPS, self.config.frame_rate as f64) {
            warn!("Camera {} ignored frame rate request: {}", camera_id, e);
        }

        info!(
            "Camera {} initialized at {}x{} @ {}fps",
            camera_id, self.config.resolution.0, self.config.resolution.1, self.config.frame_rate
        );
        self.capture = Some(capture);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, VisionError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| VisionError::Camera("Camera not initialized".to_string()))?;

        let mut bgr = Mat::default();
        let grabbed = capture
            .read(&mut bgr)
            .map_err(|e| VisionError::EndOfStream(format!("Failed to grab frame: {}", e)))?;
        if !grabbed || bgr.empty() {
            return Err(VisionError::EndOfStream("Failed to grab frame".to_string()));
        }

        let image = Self::to_rgb(&bgr)?;
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!("Camera release failed: {}", e);
            }
            info!("Camera {} stopped", self.config.camera_id);
        }
    }

    fn describe(&self) -> String {
        format!("camera {}", self.config.camera_id)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}
