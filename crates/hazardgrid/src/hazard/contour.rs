//! External contour extraction from a binary hazard mask.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::grid::{PixelPoint, PixelRect};

/// One hazard blob outline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HazardContour {
    /// Polygon area of the outline (shoelace), px².
    pub area: f64,
    /// Bounding box of the outline pixels.
    pub bbox: PixelRect,
    pub centroid: PixelPoint,
    /// Outline pixel coordinates `[x, y]`.
    pub points: Vec<[i32; 2]>,
}

/// Top-level outer contours with `area >= min_area`, largest first.
pub fn external_contours(mask: &GrayImage, min_area: f64) -> Vec<HazardContour> {
    let mut out: Vec<HazardContour> = find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| describe(&c.points))
        .filter(|c| c.area >= min_area)
        .collect();
    out.sort_by(|a, b| b.area.total_cmp(&a.area));
    out
}

fn describe(points: &[Point<i32>]) -> Option<HazardContour> {
    let first = points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    let bbox = PixelRect {
        x: x0.max(0) as u32,
        y: y0.max(0) as u32,
        width: (x1 - x0 + 1) as u32,
        height: (y1 - y0 + 1) as u32,
    };

    let (signed, cx, cy) = shoelace(points);
    let centroid = if signed.abs() > 1e-9 {
        PixelPoint::new(cx, cy)
    } else {
        bbox_center(x0, y0, x1, y1)
    };

    Some(HazardContour {
        area: signed.abs(),
        bbox,
        centroid,
        points: points.iter().map(|p| [p.x, p.y]).collect(),
    })
}

/// Signed polygon area and centroid.
fn shoelace(points: &[Point<i32>]) -> (f64, f64, f64) {
    let n = points.len();
    let (mut a2, mut cx, mut cy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let (px, py, qx, qy) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
        let cross = px * qy - qx * py;
        a2 += cross;
        cx += (px + qx) * cross;
        cy += (py + qy) * cross;
    }
    if a2.abs() < 1e-12 {
        return (0.0, 0.0, 0.0);
    }
    (a2 / 2.0, cx / (3.0 * a2), cy / (3.0 * a2))
}

fn bbox_center(x0: i32, y0: i32, x1: i32, y1: i32) -> PixelPoint {
    PixelPoint::new((x0 + x1) as f64 / 2.0, (y0 + y1) as f64 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn mask_with_rects(w: u32, h: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut m = GrayImage::new(w, h);
        for &(x, y, rw, rh) in rects {
            for yy in y..y + rh {
                for xx in x..x + rw {
                    m.put_pixel(xx, yy, Luma([255]));
                }
            }
        }
        m
    }

    #[test]
    fn rectangle_area_bbox_centroid() {
        let mask = mask_with_rects(100, 100, &[(10, 20, 40, 30)]);
        let cs = external_contours(&mask, 0.0);
        assert_eq!(cs.len(), 1);
        let c = &cs[0];
        assert_abs_diff_eq!(c.area, 39.0 * 29.0, epsilon = 1e-9);
        assert_eq!(
            c.bbox,
            PixelRect {
                x: 10,
                y: 20,
                width: 40,
                height: 30
            }
        );
        assert_abs_diff_eq!(c.centroid.x, 29.5, epsilon = 1e-9);
        assert_abs_diff_eq!(c.centroid.y, 34.5, epsilon = 1e-9);
    }

    #[test]
    fn sorted_by_area_and_filtered() {
        let mask = mask_with_rects(120, 120, &[(5, 5, 10, 10), (30, 30, 20, 20), (70, 70, 40, 40)]);
        let cs = external_contours(&mask, 200.0);
        let areas: Vec<f64> = cs.iter().map(|c| c.area).collect();
        assert_eq!(areas, vec![39.0 * 39.0, 19.0 * 19.0]);
    }

    #[test]
    fn holes_and_nested_blobs_are_not_external() {
        // Ring with a separate blob inside the hole.
        let mut mask = mask_with_rects(100, 100, &[(10, 10, 80, 80)]);
        for y in 20..80 {
            for x in 20..80 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 40..60 {
            for x in 40..60 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let cs = external_contours(&mask, 0.0);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].bbox.width, 80);
    }

    #[test]
    fn single_line_falls_back_to_bbox_center() {
        let mask = mask_with_rects(50, 50, &[(10, 10, 20, 1)]);
        let cs = external_contours(&mask, 0.0);
        assert_eq!(cs.len(), 1);
        assert_abs_diff_eq!(cs[0].area, 0.0);
        assert_abs_diff_eq!(cs[0].centroid.x, 19.5);
        assert_abs_diff_eq!(cs[0].centroid.y, 10.0);
    }
}
