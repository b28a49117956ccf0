//! Transport payload for a planned path.

use crate::error::{Error, Result};
use crate::planner::Path;

/// `{ "path": [[row, col], ...] }`, start first. Empty when no path exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PathMessage {
    pub path: Vec<[usize; 2]>,
}

impl PathMessage {
    pub fn from_path(path: &Path) -> Self {
        Self {
            path: path.cells().iter().map(|c| c.to_array()).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidInput(format!("path payload: {e}")))
    }
}

impl From<&Path> for PathMessage {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}
