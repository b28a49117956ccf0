//! One-shot frame → path orchestration: rectify, detect, map, plan.
//!
//! Each run owns its intermediates; a [`Pipeline`] holds only validated
//! configuration and can be reused across frames.

use image::RgbImage;

use crate::config::{PipelineConfig, PlanMode};
use crate::debug::DebugSink;
use crate::error::{Error, Result};
use crate::grid::{GridCell, GridMapper, ImageSize, OccupancyGrid};
use crate::hazard::{HazardDetector, HazardRegion};
use crate::homography::project;
use crate::message::PathMessage;
use crate::overlay;
use crate::planner::{plan, Path};
use crate::rectify::{Rectification, Rectifier, RectifyOutcome};
use crate::source::FrameSource;

/// Everything a planned run produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlanReport {
    pub hazard: HazardRegion,
    pub start: GridCell,
    pub goal: GridCell,
    /// Empty when the goal is unreachable.
    pub path: Path,
    /// `false` when the raw frame was used after a marker shortfall.
    pub rectified: bool,
}

impl PlanReport {
    pub fn message(&self) -> PathMessage {
        PathMessage::from_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    NoHazard,
    Planned(PlanReport),
}

impl PipelineOutcome {
    pub fn report(&self) -> Option<&PlanReport> {
        match self {
            Self::Planned(r) => Some(r),
            Self::NoHazard => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    rectifier: Rectifier,
    detector: HazardDetector,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let rectifier = Rectifier::new(config.rectify.clone())?;
        let detector = HazardDetector::new(config.hazard.clone(), config.grid)?;
        Ok(Self {
            config,
            rectifier,
            detector,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rectifier(&self) -> &Rectifier {
        &self.rectifier
    }

    pub fn detector(&self) -> &HazardDetector {
        &self.detector
    }

    /// Capture one frame from `source` and run it.
    pub fn run_source(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn DebugSink,
    ) -> Result<PipelineOutcome> {
        let frame = source.capture()?;
        self.run(&frame, sink)
    }

    pub fn run(&self, frame: &RgbImage, sink: &mut dyn DebugSink) -> Result<PipelineOutcome> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::InvalidInput("pipeline frame has zero size".into()));
        }
        let debug = self.config.debug && sink.enabled();
        if debug {
            sink.save("raw", frame);
        }

        // ── Rectify ──────────────────────────────────────────────────────
        let view = self.rectifier.rectify_or_fallback(frame)?;
        if debug {
            if let RectifyOutcome::Rectified(r) = &view {
                let mut annotated = frame.clone();
                overlay::draw_markers(&mut annotated, &r.detected, overlay::MARKER_COLOR);
                sink.save("markers", &annotated);
                sink.save("rectified", &r.image);
            }
        }
        let image = view.image();
        let mapper = GridMapper::new(ImageSize::of(image), self.config.grid)?;

        // ── Detect ───────────────────────────────────────────────────────
        let markers = match &view {
            RectifyOutcome::Rectified(r) => rectified_marker_quads(r),
            RectifyOutcome::Raw { .. } => Vec::new(),
        };
        let Some(hazard) = self.detector.detect_excluding(image, &markers)? else {
            tracing::info!("no hazard found");
            return Ok(PipelineOutcome::NoHazard);
        };

        // ── Map + plan ───────────────────────────────────────────────────
        let mut grid = OccupancyGrid::open(self.config.grid.rows, self.config.grid.cols);
        let start = self.config.start_cell();
        let goal = match self.config.mode {
            PlanMode::Inspect => match hazard.target_cell(&mapper) {
                Some(cell) => cell,
                None => return Ok(PipelineOutcome::NoHazard),
            },
            PlanMode::Avoid { destination } => {
                let blocked = grid.block_cells(&hazard.cells(&mapper));
                tracing::info!(blocked, "hazard cells blocked");
                destination
            }
        };
        let path = plan(&grid, start, goal)?;
        match path.steps() {
            Some(steps) => tracing::info!(?start, ?goal, steps, "path planned"),
            None => tracing::warn!(?start, ?goal, "no path to goal"),
        }

        if debug {
            let mut canvas = image.clone();
            overlay::draw_grid(&mut canvas, self.config.grid, overlay::GRID_COLOR);
            overlay::draw_hazards(&mut canvas, &hazard, &mapper, overlay::HAZARD_COLOR);
            overlay::draw_path(&mut canvas, &path, &mapper, overlay::PATH_COLOR);
            sink.save("overlay", &canvas);
        }

        Ok(PipelineOutcome::Planned(PlanReport {
            hazard,
            start,
            goal,
            path,
            rectified: view.is_rectified(),
        }))
    }
}

/// Every detected fiducial's quad in rectified pixel coordinates.
fn rectified_marker_quads(r: &Rectification) -> Vec<[[f64; 2]; 4]> {
    r.detected
        .iter()
        .map(|m| m.corners.map(|c| project(&r.homography, c[0], c[1])))
        .collect()
}
