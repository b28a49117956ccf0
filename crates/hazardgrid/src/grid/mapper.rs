//! Pixel ↔ grid conversion.
//!
//! [`PixelPoint`] is the single pixel-coordinate type accepted here; callers
//! holding a wrapped detection (`[[x, y]]`) normalize it with
//! [`PixelPoint::from_nested`] before crossing into grid space.

use crate::error::{Error, Result};

use super::{GridCell, GridSize};

/// Pixel coordinate `(x = column, y = row)` in image space.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unwrap a detection container holding one or more points.
    ///
    /// The first point wins; an empty container is rejected.
    pub fn from_nested(points: &[[f64; 2]]) -> Result<Self> {
        points
            .first()
            .map(|&p| Self::from(p))
            .ok_or_else(|| Error::InvalidInput("empty pixel coordinate container".into()))
    }
}

impl From<[f64; 2]> for PixelPoint {
    fn from(p: [f64; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

impl From<[f32; 2]> for PixelPoint {
    fn from(p: [f32; 2]) -> Self {
        Self {
            x: p[0] as f64,
            y: p[1] as f64,
        }
    }
}

impl From<(f64, f64)> for PixelPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned pixel rectangle covered by one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Validated image/grid pairing; conversions are total once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMapper {
    image: ImageSize,
    grid: GridSize,
}

impl GridMapper {
    pub fn new(image: ImageSize, grid: GridSize) -> Result<Self> {
        if image.is_empty() {
            return Err(Error::InvalidInput(format!(
                "image size {}x{} is empty",
                image.width, image.height
            )));
        }
        grid.validate()?;
        Ok(Self { image, grid })
    }

    pub fn image_size(&self) -> ImageSize {
        self.image
    }

    pub fn grid_size(&self) -> GridSize {
        self.grid
    }

    /// Clamped linear scaling: `col = ⌊x · cols / W⌋`, `row = ⌊y · rows / H⌋`.
    pub fn pixel_to_grid(&self, pixel: impl Into<PixelPoint>) -> GridCell {
        let p = pixel.into();
        GridCell {
            row: scale_clamped(p.y, self.image.height, self.grid.rows),
            col: scale_clamped(p.x, self.image.width, self.grid.cols),
        }
    }

    /// Pixel rectangle of `cell` (clamped into the grid).
    ///
    /// Uses the integer partition `[⌈c·W/cols⌉, ⌈(c+1)·W/cols⌉)`: adjacent
    /// rectangles tile the image, and every pixel in the rectangle maps back
    /// to `cell` through [`Self::pixel_to_grid`].
    pub fn grid_to_pixel(&self, cell: GridCell) -> PixelRect {
        let row = cell.row.min(self.grid.rows - 1);
        let col = cell.col.min(self.grid.cols - 1);
        let (x0, x1) = partition(col, self.image.width, self.grid.cols);
        let (y0, y1) = partition(row, self.image.height, self.grid.rows);
        PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// Free-function form of [`GridMapper::pixel_to_grid`].
pub fn pixel_to_grid(
    pixel: impl Into<PixelPoint>,
    image: ImageSize,
    grid: GridSize,
) -> Result<GridCell> {
    Ok(GridMapper::new(image, grid)?.pixel_to_grid(pixel))
}

/// Free-function form of [`GridMapper::grid_to_pixel`].
pub fn grid_to_pixel(cell: GridCell, image: ImageSize, grid: GridSize) -> Result<PixelRect> {
    Ok(GridMapper::new(image, grid)?.grid_to_pixel(cell))
}

fn scale_clamped(v: f64, extent: u32, cells: usize) -> usize {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    let idx = (v * cells as f64 / extent as f64).floor();
    (idx as usize).min(cells - 1)
}

pub(crate) fn partition(idx: usize, extent: u32, cells: usize) -> (u32, u32) {
    let (extent, cells) = (extent as u64, cells as u64);
    let start = (idx as u64 * extent).div_ceil(cells);
    let end = ((idx as u64 + 1) * extent).div_ceil(cells);
    (start as u32, end as u32)
}
