//! Grid space: cell coordinates, pixel/grid mapping, and occupancy.

mod mapper;
mod occupancy;

pub use mapper::{grid_to_pixel, pixel_to_grid, GridMapper, ImageSize, PixelPoint, PixelRect};
pub use occupancy::{Cell, OccupancyGrid};

use crate::error::{Error, Result};

/// Integer cell coordinate `(row, col)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// 4-connected step count to `other`.
    pub fn manhattan(&self, other: &GridCell) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// `[row, col]` pair, the shape used on the wire.
    pub fn to_array(self) -> [usize; 2] {
        [self.row, self.col]
    }
}

impl From<(usize, usize)> for GridCell {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Grid dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GridSize {
    pub rows: usize,
    pub cols: usize,
}

impl GridSize {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Largest accepted grid, in cells.
    pub const MAX_CELLS: usize = 1 << 24;

    /// Number of cells; `None` when `rows × cols` overflows.
    pub fn area(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Non-empty and at most [`Self::MAX_CELLS`] cells.
    pub fn validate(&self) -> Result<()> {
        match self.area() {
            Some(n) if n > 0 && n <= Self::MAX_CELLS => Ok(()),
            _ => Err(Error::InvalidInput(format!(
                "grid size {}x{} must hold between 1 and {} cells",
                self.rows,
                self.cols,
                Self::MAX_CELLS
            ))),
        }
    }

    /// Vehicle parking spot used when no start cell is configured:
    /// bottom row, middle column.
    pub fn bottom_center(&self) -> GridCell {
        GridCell::new(self.rows.saturating_sub(1), self.cols / 2)
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self { rows: 10, cols: 10 }
    }
}
