//! Grid-cell scan: flag cells by mask pixel count.

use image::GrayImage;

use crate::error::Result;
use crate::grid::{GridCell, GridMapper, GridSize, ImageSize};

/// Mask pixel count per cell, row-major.
pub fn cell_counts(mask: &GrayImage, grid: GridSize) -> Result<Vec<u32>> {
    let mapper = GridMapper::new(ImageSize::of(mask), grid)?;
    let mut counts = Vec::with_capacity(grid.area().unwrap_or(0));
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let rect = mapper.grid_to_pixel(GridCell::new(row, col));
            let mut n = 0u32;
            for y in rect.y..rect.y + rect.height {
                for x in rect.x..rect.x + rect.width {
                    if mask.get_pixel(x, y)[0] != 0 {
                        n += 1;
                    }
                }
            }
            counts.push(n);
        }
    }
    Ok(counts)
}

/// Cells whose mask count is strictly greater than `min_pixels`, row-major.
pub fn flagged_cells(mask: &GrayImage, grid: GridSize, min_pixels: u32) -> Result<Vec<GridCell>> {
    let counts = cell_counts(mask, grid)?;
    Ok(counts
        .iter()
        .enumerate()
        .filter(|(_, &n)| n > min_pixels)
        .map(|(i, _)| GridCell::new(i / grid.cols, i % grid.cols))
        .collect())
}
