//! Rendering helpers for debug overlays. Pure drawing; nothing here feeds
//! back into detection or planning.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::grid::{GridCell, GridMapper, GridSize, ImageSize, PixelRect};
use crate::hazard::HazardRegion;
use crate::marker::DetectedMarker;
use crate::planner::Path;

pub const GRID_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const HAZARD_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const PATH_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

/// Cell boundary lines using the same partition as the grid mapper.
pub fn draw_grid(img: &mut RgbImage, grid: GridSize, color: Rgb<u8>) {
    let Ok(mapper) = GridMapper::new(ImageSize::of(img), grid) else {
        return;
    };
    let (w, h) = (img.width() as f32, img.height() as f32);
    for col in 1..grid.cols {
        let x = mapper.grid_to_pixel(GridCell::new(0, col)).x as f32;
        draw_line_segment_mut(img, (x, 0.0), (x, h - 1.0), color);
    }
    for row in 1..grid.rows {
        let y = mapper.grid_to_pixel(GridCell::new(row, 0)).y as f32;
        draw_line_segment_mut(img, (0.0, y), (w - 1.0, y), color);
    }
}

/// Hazard outlines: contour bounding boxes with centroids, or flagged cells.
pub fn draw_hazards(img: &mut RgbImage, region: &HazardRegion, mapper: &GridMapper, color: Rgb<u8>) {
    match region {
        HazardRegion::Contours { contours } => {
            for c in contours {
                outline(img, c.bbox, color);
                let (cx, cy) = (c.centroid.x.round() as i32, c.centroid.y.round() as i32);
                draw_filled_circle_mut(img, (cx, cy), 3, color);
            }
        }
        HazardRegion::Cells { cells } => {
            for &cell in cells {
                outline(img, mapper.grid_to_pixel(cell), color);
            }
        }
    }
}

/// Polyline through cell centres, with a dot on the start cell.
pub fn draw_path(img: &mut RgbImage, path: &Path, mapper: &GridMapper, color: Rgb<u8>) {
    let centers: Vec<(f32, f32)> = path
        .cells()
        .iter()
        .map(|&c| {
            let p = mapper.grid_to_pixel(c).center();
            (p.x as f32, p.y as f32)
        })
        .collect();
    for pair in centers.windows(2) {
        draw_line_segment_mut(img, pair[0], pair[1], color);
    }
    if let Some(&(x, y)) = centers.first() {
        draw_filled_circle_mut(img, (x.round() as i32, y.round() as i32), 4, color);
    }
}

/// Marker quads and centroids, in frame coordinates.
pub fn draw_markers(img: &mut RgbImage, markers: &[DetectedMarker], color: Rgb<u8>) {
    for m in markers {
        for i in 0..4 {
            let a = m.corners[i];
            let b = m.corners[(i + 1) % 4];
            draw_line_segment_mut(img, (a[0] as f32, a[1] as f32), (b[0] as f32, b[1] as f32), color);
        }
        let (cx, cy) = (m.centroid[0].round() as i32, m.centroid[1].round() as i32);
        draw_filled_circle_mut(img, (cx, cy), 4, color);
    }
}

fn outline(img: &mut RgbImage, r: PixelRect, color: Rgb<u8>) {
    if r.width == 0 || r.height == 0 {
        return;
    }
    draw_hollow_rect_mut(img, Rect::at(r.x as i32, r.y as i32).of_size(r.width, r.height), color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::OccupancyGrid;
    use crate::planner::plan;
    use crate::test_utils::{white_frame, WHITE};

    #[test]
    fn grid_lines_on_partition_boundaries() {
        let mut img = white_frame(100, 50);
        draw_grid(&mut img, GridSize::new(2, 4), GRID_COLOR);
        assert_eq!(img.get_pixel(25, 10), &GRID_COLOR);
        assert_eq!(img.get_pixel(60, 25), &GRID_COLOR);
        assert_eq!(img.get_pixel(10, 10), &WHITE);
    }

    #[test]
    fn path_passes_through_cell_centres() {
        let mut img = white_frame(100, 100);
        let mapper = GridMapper::new(ImageSize::new(100, 100), GridSize::new(10, 10)).expect("valid");
        let path = plan(&OccupancyGrid::open(10, 10), GridCell::new(9, 5), GridCell::new(5, 5))
            .expect("in bounds");
        draw_path(&mut img, &path, &mapper, PATH_COLOR);
        assert_eq!(img.get_pixel(55, 75), &PATH_COLOR);
        assert_eq!(img.get_pixel(55, 55), &PATH_COLOR);
        assert_eq!(img.get_pixel(20, 20), &WHITE);
    }

    #[test]
    fn hazard_cells_are_outlined() {
        let mut img = white_frame(100, 100);
        let mapper = GridMapper::new(ImageSize::new(100, 100), GridSize::new(4, 4)).expect("valid");
        let region = HazardRegion::Cells {
            cells: vec![GridCell::new(1, 1)],
        };
        draw_hazards(&mut img, &region, &mapper, HAZARD_COLOR);
        assert_eq!(img.get_pixel(25, 25), &HAZARD_COLOR);
        assert_eq!(img.get_pixel(49, 30), &HAZARD_COLOR);
        assert_eq!(img.get_pixel(37, 37), &WHITE);
    }
}
