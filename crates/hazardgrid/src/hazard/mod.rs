//! Hazard (pothole) detection by color signature.
//!
//! Two strategies share the HSV threshold and 5×5 open/close cleanup:
//! - **contours**: external blobs above `min_contour_area`, largest first;
//! - **grid cells**: cells of a `rows×cols` partition whose mask count exceeds
//!   `min_cell_pixels`.
//!
//! "No hazard" is `Ok(None)`; a region is never empty.

mod cells;
mod color;
mod contour;

use std::collections::BTreeSet;

use image::{GrayImage, RgbImage};

use crate::error::{Error, Result};
use crate::grid::{GridCell, GridMapper, GridSize, PixelPoint};

pub use cells::{cell_counts, flagged_cells};
pub use color::{clean_mask, in_range, rgb_to_hsv};
pub use contour::{external_contours, HazardContour};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    #[default]
    Contours,
    GridCells,
}

/// Hazard color signature and size gates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub strategy: DetectionStrategy,
    /// Inclusive HSV lower bound, `H ∈ [0, 180]`.
    pub color_lower: [u8; 3],
    /// Inclusive HSV upper bound.
    pub color_upper: [u8; 3],
    /// Minimum contour area in px².
    pub min_contour_area: f64,
    /// A cell is flagged when its mask count is strictly greater than this.
    pub min_cell_pixels: u32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::Contours,
            color_lower: [0, 0, 0],
            color_upper: [100, 100, 100],
            min_contour_area: 200.0,
            min_cell_pixels: 450,
        }
    }
}

impl HazardConfig {
    pub fn validate(&self) -> Result<()> {
        for c in 0..3 {
            if self.color_lower[c] > self.color_upper[c] {
                return Err(Error::Config(format!(
                    "hazard.color_lower {:?} exceeds color_upper {:?} on channel {}",
                    self.color_lower, self.color_upper, c
                )));
            }
        }
        if self.color_lower[0] > 180 {
            return Err(Error::Config(format!(
                "hazard hue bound {} is outside [0, 180]",
                self.color_lower[0]
            )));
        }
        if !self.min_contour_area.is_finite() || self.min_contour_area < 0.0 {
            return Err(Error::Config(
                "hazard.min_contour_area must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Detection result; never empty.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HazardRegion {
    /// Surviving contours, largest first.
    Contours { contours: Vec<HazardContour> },
    /// Flagged cells, row-major.
    Cells { cells: Vec<GridCell> },
}

impl HazardRegion {
    pub fn len(&self) -> usize {
        match self {
            Self::Contours { contours } => contours.len(),
            Self::Cells { cells } => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel centroid of the largest contour; `None` for the cell strategy.
    pub fn primary_centroid(&self) -> Option<PixelPoint> {
        match self {
            Self::Contours { contours } => contours.first().map(|c| c.centroid),
            Self::Cells { .. } => None,
        }
    }

    /// Single cell the planner heads for.
    ///
    /// Contours: the largest contour's centroid. Cells: the flagged cell
    /// nearest (Manhattan) to the mean of all flagged cells, first in
    /// row-major order on ties.
    pub fn target_cell(&self, mapper: &GridMapper) -> Option<GridCell> {
        match self {
            Self::Contours { contours } => contours.first().map(|c| mapper.pixel_to_grid(c.centroid)),
            Self::Cells { cells } => {
                if cells.is_empty() {
                    return None;
                }
                let n = cells.len() as f64;
                let mr = cells.iter().map(|c| c.row as f64).sum::<f64>() / n;
                let mc = cells.iter().map(|c| c.col as f64).sum::<f64>() / n;
                let dist = |c: &GridCell| (c.row as f64 - mr).abs() + (c.col as f64 - mc).abs();
                cells
                    .iter()
                    .min_by(|a, b| dist(a).total_cmp(&dist(b)))
                    .copied()
            }
        }
    }

    /// Every grid cell the hazard touches, row-major without duplicates.
    ///
    /// Contours contribute all cells overlapped by their bounding boxes.
    pub fn cells(&self, mapper: &GridMapper) -> Vec<GridCell> {
        match self {
            Self::Cells { cells } => cells.clone(),
            Self::Contours { contours } => {
                let mut set = BTreeSet::new();
                for c in contours {
                    let b = c.bbox;
                    let tl = mapper.pixel_to_grid([b.x as f64, b.y as f64]);
                    let br = mapper.pixel_to_grid([
                        (b.x + b.width.saturating_sub(1)) as f64,
                        (b.y + b.height.saturating_sub(1)) as f64,
                    ]);
                    for row in tl.row..=br.row {
                        for col in tl.col..=br.col {
                            set.insert(GridCell::new(row, col));
                        }
                    }
                }
                set.into_iter().collect()
            }
        }
    }
}

/// Color-threshold hazard detector bound to one configuration.
#[derive(Debug, Clone)]
pub struct HazardDetector {
    config: HazardConfig,
    grid: GridSize,
}

impl HazardDetector {
    /// `grid` is only used by [`DetectionStrategy::GridCells`].
    pub fn new(config: HazardConfig, grid: GridSize) -> Result<Self> {
        config.validate()?;
        grid.validate().map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { config, grid })
    }

    pub fn config(&self) -> &HazardConfig {
        &self.config
    }

    /// Thresholded and cleaned mask (255 = hazard color).
    pub fn mask(&self, image: &RgbImage) -> Result<GrayImage> {
        self.mask_excluding(image, &[])
    }

    fn mask_excluding(&self, image: &RgbImage, exclude: &[[[f64; 2]; 4]]) -> Result<GrayImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput("hazard detection on an empty image".into()));
        }
        let mut raw = in_range(image, self.config.color_lower, self.config.color_upper);
        for quad in exclude {
            clear_quad(&mut raw, quad, EXCLUDE_MARGIN_PX);
        }
        Ok(clean_mask(&raw))
    }

    /// Detect the hazard region, or `None` when nothing survives the gates.
    pub fn detect(&self, image: &RgbImage) -> Result<Option<HazardRegion>> {
        self.detect_excluding(image, &[])
    }

    /// Like [`Self::detect`], with the quads in `exclude` (pixel corners,
    /// grown by [`EXCLUDE_MARGIN_PX`]) cleared from the mask before cleanup.
    ///
    /// Fiducials are dark, so a dark hazard signature matches them too.
    pub fn detect_excluding(
        &self,
        image: &RgbImage,
        exclude: &[[[f64; 2]; 4]],
    ) -> Result<Option<HazardRegion>> {
        let mask = self.mask_excluding(image, exclude)?;
        let region = match self.config.strategy {
            DetectionStrategy::Contours => {
                let contours = external_contours(&mask, self.config.min_contour_area);
                tracing::info!(
                    count = contours.len(),
                    largest = contours.first().map(|c| c.area),
                    "hazard contours"
                );
                (!contours.is_empty()).then_some(HazardRegion::Contours { contours })
            }
            DetectionStrategy::GridCells => {
                let cells = flagged_cells(&mask, self.grid, self.config.min_cell_pixels)?;
                tracing::info!(
                    count = cells.len(),
                    rows = self.grid.rows,
                    cols = self.grid.cols,
                    "hazard cells flagged"
                );
                (!cells.is_empty()).then_some(HazardRegion::Cells { cells })
            }
        };
        Ok(region)
    }
}

/// Border added around excluded quads to cover their resampled edges.
pub const EXCLUDE_MARGIN_PX: f64 = 3.0;

/// Zero every mask pixel inside the convex `quad` grown by `margin`.
fn clear_quad(mask: &mut GrayImage, quad: &[[f64; 2]; 4], margin: f64) {
    if quad.iter().flatten().any(|v| !v.is_finite()) {
        return;
    }
    let (w, h) = mask.dimensions();
    let lo = |i: usize| quad.iter().map(|p| p[i]).fold(f64::INFINITY, f64::min) - margin;
    let hi = |i: usize| quad.iter().map(|p| p[i]).fold(f64::NEG_INFINITY, f64::max) + margin;
    let x0 = lo(0).floor().max(0.0) as u32;
    let y0 = lo(1).floor().max(0.0) as u32;
    let x1 = (hi(0).ceil().max(0.0) as u32).min(w);
    let y1 = (hi(1).ceil().max(0.0) as u32).min(h);
    let orient = crate::marker::signed_area(quad).signum();
    if orient == 0.0 {
        return;
    }
    for y in y0..y1 {
        for x in x0..x1 {
            let (px, py) = (x as f64, y as f64);
            let inside = (0..4).all(|i| {
                let a = quad[i];
                let b = quad[(i + 1) % 4];
                let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
                let len = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
                orient * (dx * (py - a[1]) - dy * (px - a[0])) / len >= -margin
            });
            if inside {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
    }
}

/// One-shot form of [`HazardDetector::detect`].
pub fn detect(image: &RgbImage, config: &HazardConfig, grid: GridSize) -> Result<Option<HazardRegion>> {
    HazardDetector::new(config.clone(), grid)?.detect(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ImageSize, PixelRect};
    use crate::test_utils::{fill_rect, white_frame};
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    const RED: Rgb<u8> = Rgb([220, 20, 20]);

    fn red_config(strategy: DetectionStrategy) -> HazardConfig {
        HazardConfig {
            strategy,
            color_lower: [0, 150, 150],
            color_upper: [10, 255, 255],
            ..HazardConfig::default()
        }
    }

    #[test]
    fn excluded_quads_are_ignored() {
        let mut img = white_frame(200, 200);
        fill_rect(&mut img, 10, 10, 40, 40, Rgb([0, 0, 0]));
        fill_rect(&mut img, 120, 100, 30, 30, Rgb([0, 0, 0]));
        let detector = HazardDetector::new(HazardConfig::default(), GridSize::default())
            .expect("default config");

        let all = detector.detect(&img).expect("valid input").expect("two blobs");
        assert_eq!(all.len(), 2);

        let marker = [[10.0, 10.0], [49.0, 10.0], [49.0, 49.0], [10.0, 49.0]];
        let region = detector
            .detect_excluding(&img, &[marker])
            .expect("valid input")
            .expect("one blob left");
        assert_eq!(region.len(), 1);
        let c = region.primary_centroid().expect("contour");
        assert_abs_diff_eq!(c.x, 134.5, epsilon = 1.0);
        assert_abs_diff_eq!(c.y, 114.5, epsilon = 1.0);
    }

    #[test]
    fn single_rectangle_yields_one_contour() {
        let mut img = white_frame(200, 200);
        fill_rect(&mut img, 60, 80, 40, 30, RED);
        let region = detect(&img, &red_config(DetectionStrategy::Contours), GridSize::default())
            .expect("valid input")
            .expect("hazard present");
        let HazardRegion::Contours { contours } = &region else {
            panic!("expected contours, got {region:?}");
        };
        assert_eq!(contours.len(), 1);
        assert_abs_diff_eq!(contours[0].area, 39.0 * 29.0, epsilon = 1e-9);
        assert_eq!(
            contours[0].bbox,
            PixelRect {
                x: 60,
                y: 80,
                width: 40,
                height: 30
            }
        );

        let mapper = GridMapper::new(ImageSize::new(200, 200), GridSize::new(10, 10)).expect("valid");
        // Centroid (79.5, 94.5) → row 4, col 3.
        assert_eq!(region.target_cell(&mapper), Some(GridCell::new(4, 3)));
        // bbox x 60..99, y 80..109 → cols 3..=4, rows 4..=5.
        assert_eq!(
            region.cells(&mapper),
            vec![
                GridCell::new(4, 3),
                GridCell::new(4, 4),
                GridCell::new(5, 3),
                GridCell::new(5, 4)
            ]
        );
    }

    #[test]
    fn no_matching_color_is_none() {
        let mut img = white_frame(120, 120);
        fill_rect(&mut img, 10, 10, 50, 50, Rgb([20, 200, 20]));
        for strategy in [DetectionStrategy::Contours, DetectionStrategy::GridCells] {
            let r = detect(&img, &red_config(strategy), GridSize::new(4, 4)).expect("valid input");
            assert!(r.is_none());
        }
    }

    #[test]
    fn small_blob_is_below_area_gate() {
        let mut img = white_frame(120, 120);
        fill_rect(&mut img, 10, 10, 12, 12, RED);
        let r = detect(&img, &red_config(DetectionStrategy::Contours), GridSize::default())
            .expect("valid input");
        assert!(r.is_none());
    }

    #[test]
    fn cell_scan_flags_covered_cell() {
        let mut img = white_frame(200, 200);
        // Exactly cell (1, 2) of a 4×4 grid.
        fill_rect(&mut img, 100, 50, 50, 50, RED);
        // 400 px in cell (3, 0): not above 450.
        fill_rect(&mut img, 10, 160, 20, 20, RED);
        let grid = GridSize::new(4, 4);
        let region = detect(&img, &red_config(DetectionStrategy::GridCells), grid)
            .expect("valid input")
            .expect("hazard present");
        assert_eq!(
            region,
            HazardRegion::Cells {
                cells: vec![GridCell::new(1, 2)]
            }
        );
        let mapper = GridMapper::new(ImageSize::new(200, 200), grid).expect("valid");
        assert_eq!(region.target_cell(&mapper), Some(GridCell::new(1, 2)));
        assert_eq!(region.primary_centroid(), None);
    }

    #[test]
    fn cell_target_is_nearest_to_flagged_mean() {
        let region = HazardRegion::Cells {
            cells: vec![
                GridCell::new(0, 0),
                GridCell::new(0, 1),
                GridCell::new(1, 1),
                GridCell::new(5, 5),
            ],
        };
        let mapper = GridMapper::new(ImageSize::new(60, 60), GridSize::new(6, 6)).expect("valid");
        // Mean (1.5, 1.75).
        assert_eq!(region.target_cell(&mapper), Some(GridCell::new(1, 1)));
    }

    #[test]
    fn empty_image_is_invalid_input() {
        let err = detect(&RgbImage::new(0, 0), &HazardConfig::default(), GridSize::default());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn default_signature_matches_dark_patches() {
        let mut img = white_frame(100, 100);
        fill_rect(&mut img, 20, 20, 30, 30, Rgb([40, 40, 40]));
        let r = detect(&img, &HazardConfig::default(), GridSize::default())
            .expect("valid input")
            .expect("dark patch");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn config_rejects_inverted_bounds() {
        let cfg = HazardConfig {
            color_lower: [50, 0, 0],
            color_upper: [10, 255, 255],
            ..HazardConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn region_serializes_with_kind() {
        let region = HazardRegion::Cells {
            cells: vec![GridCell::new(1, 2)],
        };
        let json = serde_json::to_string(&region).expect("serialize");
        assert_eq!(json, r#"{"kind":"cells","cells":[{"row":1,"col":2}]}"#);
    }
}
