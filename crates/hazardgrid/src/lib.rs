//! hazardgrid: overhead-camera hazard localization and grid path planning.
//!
//! A single frame goes through four stages:
//!
//! 1. **Rectify** – decode four square fiducials, order them TL/TR/BR/BL and
//!    warp the frame to a top-down view through a DLT homography.
//! 2. **Detect** – threshold the hazard color in HSV, clean the mask with a
//!    5×5 opening/closing, then report external contours or flagged grid
//!    cells.
//! 3. **Map** – convert pixel coordinates to occupancy-grid cells with a
//!    clamped linear scaling.
//! 4. **Plan** – A* over the 4-connected grid from the vehicle cell to the
//!    hazard (inspect) or to a destination with hazard cells blocked (avoid).
//!
//! # Public API
//! - [`Pipeline`] and [`PipelineConfig`] run the whole chain on one frame.
//! - [`Rectifier`], [`HazardDetector`], [`GridMapper`] and [`plan`] are usable
//!   on their own.
//! - [`FrameSource`] and [`DebugSink`] are the I/O seams; [`PathMessage`] is
//!   the transport payload.

mod config;
mod debug;
mod error;
pub mod grid;
pub mod hazard;
mod homography;
pub mod marker;
mod message;
pub mod overlay;
mod pipeline;
mod planner;
mod rectify;
mod source;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{PipelineConfig, PlanMode};
pub use debug::{DebugSink, DirDebugSink, NoopDebugSink};
pub use error::{Error, Result};
pub use grid::{
    grid_to_pixel, pixel_to_grid, Cell, GridCell, GridMapper, GridSize, ImageSize, OccupancyGrid,
    PixelPoint, PixelRect,
};
pub use hazard::{DetectionStrategy, HazardConfig, HazardContour, HazardDetector, HazardRegion};
pub use homography::{estimate_homography_dlt, project, reprojection_error, warp_perspective};
pub use marker::{DetectedMarker, MarkerConfig, MarkerDetector, MarkerFamily};
pub use message::PathMessage;
pub use pipeline::{Pipeline, PipelineOutcome, PlanReport};
pub use planner::{plan, plan_with_stats, Path, SearchStats};
pub use rectify::{
    order_geometric, order_markers, OrderingStrategy, Rectification, Rectifier, RectifyConfig,
    RectifyFallback, RectifyOutcome,
};
pub use source::{decode_frame, FileFrameSource, FrameSource};
