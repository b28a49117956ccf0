//! Frame sources. Every failure surfaces as [`Error::CaptureFailed`].

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{Error, Result};

/// Supplies one decoded color frame per call.
///
/// Network-backed sources should bound their wait and report a timeout as
/// [`Error::CaptureFailed`].
pub trait FrameSource {
    fn capture(&mut self) -> Result<RgbImage>;
}

/// Decode an encoded image (PNG or JPEG) held in memory.
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::CaptureFailed(format!("decode failed: {e}")))?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(Error::CaptureFailed("decoded frame is empty".into()));
    }
    Ok(rgb)
}

/// Reads the same image file on every capture.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileFrameSource {
    fn capture(&mut self) -> Result<RgbImage> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| Error::CaptureFailed(format!("{}: {e}", self.path.display())))?;
        let frame = decode_frame(&bytes)?;
        tracing::debug!(
            path = %self.path.display(),
            "captured {}x{} frame",
            frame.width(),
            frame.height()
        );
        Ok(frame)
    }
}
