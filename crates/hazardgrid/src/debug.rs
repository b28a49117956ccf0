//! Debug image sinks.
//!
//! Sinks observe intermediate images only. Write failures are logged and
//! swallowed so a broken debug directory never changes a run's result.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;

/// Receives intermediate pipeline images keyed by stage name.
pub trait DebugSink {
    /// `false` lets callers skip rendering overlays nobody will see.
    fn enabled(&self) -> bool {
        true
    }

    fn save(&mut self, stage: &str, image: &RgbImage);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDebugSink;

impl DebugSink for NoopDebugSink {
    fn enabled(&self) -> bool {
        false
    }

    fn save(&mut self, _stage: &str, _image: &RgbImage) {}
}

/// Writes `<stage>_<unix-millis>.png` into a directory.
#[derive(Debug, Clone)]
pub struct DirDebugSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirDebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn try_save(&self, stage: &str, image: &RgbImage) -> std::result::Result<PathBuf, String> {
        std::fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = self.dir.join(format!("{stage}_{millis}.png"));
        image.save(&path).map_err(|e| e.to_string())?;
        Ok(path)
    }
}

impl DebugSink for DirDebugSink {
    fn save(&mut self, stage: &str, image: &RgbImage) {
        match self.try_save(stage, image) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "debug image written");
                self.written.push(path);
            }
            Err(e) => {
                tracing::warn!(stage, dir = %self.dir.display(), "debug image not written: {e}");
            }
        }
    }
}
