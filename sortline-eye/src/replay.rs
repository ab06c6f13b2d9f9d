//! Replay of recorded frames from an image directory

use crate::error::VisionError;
use crate::frame::{Frame, FrameSource};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Frame source over the image files of one directory, in file name order.
pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    opened: bool,
}

impl ImageDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    /// Number of frames found at open time
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl FrameSource for ImageDirSource {
    fn open(&mut self) -> Result<(), VisionError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            VisionError::Camera(format!("Failed to open replay directory {:?}: {}", self.dir, e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && Self::is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(VisionError::Camera(format!(
                "Replay directory {:?} contains no images",
                self.dir
            )));
        }

        info!("Replay source opened: {} frames from {:?}", files.len(), self.dir);
        self.files = files;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, VisionError> {
        if !self.opened {
            return Err(VisionError::Camera("Replay source not opened".to_string()));
        }

        let path = self
            .files
            .get(self.cursor)
            .ok_or_else(|| VisionError::EndOfStream(format!("replayed {} frames", self.files.len())))?;

        debug!("Replaying frame {} from {:?}", self.cursor, path);
        let image = image::open(path)?.to_rgb8();
        let frame = Frame::new(self.cursor as u64, image);
        self.cursor += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if self.opened {
            self.opened = false;
            info!("Replay source closed after {} frames", self.cursor);
        }
    }

    fn describe(&self) -> String {
        format!("replay directory {:?}", self.dir)
    }
}
