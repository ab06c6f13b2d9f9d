//! Frames and the frame source boundary

use crate::error::VisionError;
use image::RgbImage;

/// One captured video frame, RGB8.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the stream, starting at 0
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Supplies successive frames on demand.
///
/// `read_frame` returning any error ends the stream for the control loop;
/// sources should use [`VisionError::EndOfStream`] when they simply ran out.
pub trait FrameSource: Send {
    /// Acquire the device. Failure is fatal to the run.
    fn open(&mut self) -> Result<(), VisionError>;

    fn read_frame(&mut self) -> Result<Frame, VisionError>;

    /// Release the device. Must be safe to call more than once.
    fn close(&mut self);

    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), VisionError> {
        (**self).open()
    }

    fn read_frame(&mut self) -> Result<Frame, VisionError> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
