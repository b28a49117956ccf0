//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```json
//! {
//!   "grid": { "rows": 12, "cols": 8 },
//!   "hazard": { "strategy": "grid_cells", "min_cell_pixels": 300 },
//!   "mode": { "kind": "avoid", "destination": { "row": 0, "col": 4 } }
//! }
//! ```

use std::path::Path;

use crate::error::{Error, Result};
use crate::grid::{GridCell, GridSize};
use crate::hazard::HazardConfig;
use crate::rectify::RectifyConfig;

/// What the planned path is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanMode {
    /// Drive to the hazard target cell.
    #[default]
    Inspect,
    /// Drive to `destination` with every hazard cell blocked.
    Avoid { destination: GridCell },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rectify: RectifyConfig,
    pub hazard: HazardConfig,
    pub grid: GridSize,
    /// Vehicle cell; bottom-centre of the grid when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<GridCell>,
    pub mode: PlanMode,
    /// Emit intermediate images to the debug sink.
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rectify: RectifyConfig::default(),
            hazard: HazardConfig::default(),
            grid: GridSize::default(),
            start: None,
            mode: PlanMode::default(),
            debug: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.rectify.validate()?;
        self.hazard.validate()?;
        self.grid
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        let start = self.start_cell();
        if !self.grid.contains(start) {
            return Err(Error::Config(format!(
                "start {start:?} is outside the {}x{} grid",
                self.grid.rows, self.grid.cols
            )));
        }
        if let PlanMode::Avoid { destination } = self.mode {
            if !self.grid.contains(destination) {
                return Err(Error::Config(format!(
                    "destination {destination:?} is outside the {}x{} grid",
                    self.grid.rows, self.grid.cols
                )));
            }
        }
        Ok(())
    }

    /// Configured start, or bottom-centre `(rows-1, cols/2)`.
    pub fn start_cell(&self) -> GridCell {
        self.start.unwrap_or_else(|| self.grid.bottom_center())
    }
}
