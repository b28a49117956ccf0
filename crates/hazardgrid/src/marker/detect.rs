//! Quad-based fiducial detection.
//!
//! Stages:
//! 1. Otsu threshold of the grayscale frame (markers dark on light).
//! 2. Outer contours, Douglas–Peucker reduction to convex quadrilaterals.
//! 3. Lattice sampling through the unit-square → quad homography: a 6×6
//!    cell grid with a dark 1-cell border around the 4×4 payload.
//! 4. Rotation-aware dictionary match; duplicate ids keep the largest quad.

use std::collections::BTreeMap;

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

use crate::error::Result;
use crate::homography::{estimate_homography_dlt, project};

use super::dictionary::{word_from_bits, Dictionary, MarkerFamily, PAYLOAD_CELLS};

/// Lattice side length in cells: payload plus a one-cell border each side.
pub const MARKER_CELLS: usize = PAYLOAD_CELLS + 2;

/// Sub-sample offsets within a cell, in cell units.
const CELL_SAMPLES: [f64; 3] = [0.3, 0.5, 0.7];

/// Marker detection tuning.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Dictionary the payload words are matched against.
    pub family: MarkerFamily,
    /// Maximum payload bit errors accepted by the matcher.
    pub max_hamming: u8,
    /// Contours shorter than this (pixels) are not considered.
    pub min_perimeter_px: f64,
    /// Douglas–Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Fraction of the 20 border cells allowed to read light.
    pub border_tolerance: f32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            family: MarkerFamily::Aruco4x4,
            max_hamming: 1,
            min_perimeter_px: 40.0,
            approx_epsilon_ratio: 0.04,
            border_tolerance: 0.15,
        }
    }
}

/// A decoded fiducial in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectedMarker {
    /// Dictionary id.
    pub id: u32,
    /// Quad corners, clockwise in image coordinates.
    pub corners: [[f64; 2]; 4],
    /// Mean of the four corners.
    pub centroid: [f64; 2],
    /// Clockwise quarter turns that aligned the payload with the dictionary.
    pub rotation: u8,
    /// Payload bit errors.
    pub hamming: u8,
    /// Quad perimeter in pixels.
    pub perimeter: f64,
}

/// Detects dictionary markers in color or grayscale frames.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    config: MarkerConfig,
    dictionary: Dictionary,
}

impl MarkerDetector {
    pub fn new(config: MarkerConfig) -> Result<Self> {
        let dictionary = Dictionary::new(&config.family)?;
        Ok(Self { config, dictionary })
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Detect markers in an RGB frame. Result is sorted by id, one per id.
    pub fn detect(&self, frame: &RgbImage) -> Vec<DetectedMarker> {
        self.detect_gray(&image::imageops::grayscale(frame))
    }

    pub fn detect_gray(&self, gray: &GrayImage) -> Vec<DetectedMarker> {
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let level = imageproc::contrast::otsu_level(gray);
        let binary = GrayImage::from_fn(w, h, |x, y| {
            if gray.get_pixel(x, y)[0] <= level {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let mut by_id: BTreeMap<u32, DetectedMarker> = BTreeMap::new();
        let mut n_quads = 0usize;
        for contour in find_contours::<i32>(&binary) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(corners) = self.quad_from_contour(&contour.points) else {
                continue;
            };
            n_quads += 1;
            let Some(marker) = self.decode_quad(gray, level, corners) else {
                continue;
            };
            tracing::debug!(
                id = marker.id,
                rotation = marker.rotation,
                hamming = marker.hamming,
                "marker decoded at ({:.1}, {:.1})",
                marker.centroid[0],
                marker.centroid[1]
            );
            match by_id.get(&marker.id) {
                Some(existing) if existing.perimeter >= marker.perimeter => {}
                _ => {
                    by_id.insert(marker.id, marker);
                }
            }
        }

        tracing::info!(
            "{} quads, {} markers decoded (otsu level {})",
            n_quads,
            by_id.len(),
            level
        );
        by_id.into_values().collect()
    }

    fn quad_from_contour(&self, points: &[Point<i32>]) -> Option<[[f64; 2]; 4]> {
        if points.len() < 4 {
            return None;
        }
        let perimeter = arc_length(points, true);
        if perimeter < self.config.min_perimeter_px {
            return None;
        }
        let epsilon = (self.config.approx_epsilon_ratio * perimeter).max(1.0);
        // Closed DP always keeps the first point; start it on a hull vertex.
        let start = farthest_from_centroid(points);
        let rotated: Vec<Point<i32>> = points[start..].iter().chain(&points[..start]).copied().collect();
        let approx = approximate_polygon_dp(&rotated, epsilon, true);
        let mut poly = drop_close_vertices(&approx, epsilon);
        drop_collinear_vertices(&mut poly, epsilon);
        if poly.len() != 4 {
            return None;
        }

        let mut quad = [[0.0; 2]; 4];
        for (dst, p) in quad.iter_mut().zip(&poly) {
            *dst = [p.x as f64, p.y as f64];
        }
        if !is_convex(&quad) {
            return None;
        }
        if signed_area(&quad) < 0.0 {
            quad.reverse();
        }
        Some(quad)
    }

    fn decode_quad(&self, gray: &GrayImage, level: u8, corners: [[f64; 2]; 4]) -> Option<DetectedMarker> {
        let n = MARKER_CELLS as f64;
        let lattice = [[0.0, 0.0], [n, 0.0], [n, n], [0.0, n]];
        let h = estimate_homography_dlt(&lattice, &corners).ok()?;

        let mut light = [[false; MARKER_CELLS]; MARKER_CELLS];
        for (row, cells) in light.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                *cell = cell_mean(gray, &h, row, col)? > level as f32;
            }
        }

        let border_light = (0..MARKER_CELLS)
            .flat_map(|i| {
                [
                    light[0][i],
                    light[MARKER_CELLS - 1][i],
                    light[i][0],
                    light[i][MARKER_CELLS - 1],
                ]
            })
            .filter(|&b| b)
            .count();
        // Corner cells are visited twice above; 4 * MARKER_CELLS - 4 distinct cells.
        let border_cells = 4 * MARKER_CELLS - 4;
        if border_light as f32 > self.config.border_tolerance * border_cells as f32 {
            return None;
        }

        let mut bits = [[false; PAYLOAD_CELLS]; PAYLOAD_CELLS];
        for (r, row) in bits.iter_mut().enumerate() {
            for (c, bit) in row.iter_mut().enumerate() {
                *bit = light[r + 1][c + 1];
            }
        }
        let word = word_from_bits(&bits);
        let m = self.dictionary.decode(word, self.config.max_hamming)?;

        let centroid = [
            corners.iter().map(|c| c[0]).sum::<f64>() / 4.0,
            corners.iter().map(|c| c[1]).sum::<f64>() / 4.0,
        ];
        Some(DetectedMarker {
            id: m.id,
            corners,
            centroid,
            rotation: m.rotation,
            hamming: m.hamming,
            perimeter: perimeter(&corners),
        })
    }
}

/// Mean intensity over a 3×3 sub-sample pattern inside lattice cell `(row, col)`.
/// `None` when any sample projects outside the image.
fn cell_mean(gray: &GrayImage, h: &nalgebra::Matrix3<f64>, row: usize, col: usize) -> Option<f32> {
    let (w, ht) = gray.dimensions();
    let mut sum = 0.0f32;
    for dy in CELL_SAMPLES {
        for dx in CELL_SAMPLES {
            let [x, y] = project(h, col as f64 + dx, row as f64 + dy);
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            let (xi, yi) = (x.round(), y.round());
            if xi < 0.0 || yi < 0.0 || xi >= w as f64 || yi >= ht as f64 {
                return None;
            }
            sum += gray.get_pixel(xi as u32, yi as u32)[0] as f32;
        }
    }
    Some(sum / (CELL_SAMPLES.len() * CELL_SAMPLES.len()) as f32)
}

/// Remove vertices closer than `min_dist` to the previously kept vertex,
/// including the wrap-around from last to first.
fn drop_close_vertices(poly: &[Point<i32>], min_dist: f64) -> Vec<Point<i32>> {
    let dist = |a: &Point<i32>, b: &Point<i32>| {
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        (dx * dx + dy * dy).sqrt()
    };
    let mut out: Vec<Point<i32>> = Vec::with_capacity(poly.len());
    for p in poly {
        if out.last().map_or(true, |q| dist(p, q) >= min_dist) {
            out.push(*p);
        }
    }
    while out.len() > 1 && dist(&out[0], &out[out.len() - 1]) < min_dist {
        out.pop();
    }
    out
}

/// Index of the contour point farthest from the contour's mean point.
fn farthest_from_centroid(points: &[Point<i32>]) -> usize {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / n;
    let mut best = 0;
    let mut best_d2 = f64::NEG_INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d2 = (p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2);
        if d2 > best_d2 {
            best = i;
            best_d2 = d2;
        }
    }
    best
}

/// Repeatedly remove the vertex nearest the chord of its two neighbours while
/// that distance is below `tol`. Stops at a triangle.
fn drop_collinear_vertices(poly: &mut Vec<Point<i32>>, tol: f64) {
    while poly.len() > 3 {
        let n = poly.len();
        let (idx, d) = (0..n)
            .map(|i| {
                let a = poly[(i + n - 1) % n];
                let b = poly[(i + 1) % n];
                (i, chord_distance(poly[i], a, b))
            })
            .fold((0, f64::INFINITY), |acc, x| if x.1 < acc.1 { x } else { acc });
        if d >= tol {
            break;
        }
        poly.remove(idx);
    }
}

/// Distance from `p` to the segment line through `a` and `b`.
fn chord_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let len = (dx * dx + dy * dy).sqrt();
    let (px, py) = ((p.x - a.x) as f64, (p.y - a.y) as f64);
    if len < f64::EPSILON {
        return (px * px + py * py).sqrt();
    }
    (dx * py - dy * px).abs() / len
}

/// Shoelace area; positive for clockwise order in image (y-down) coordinates.
pub(crate) fn signed_area(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    let mut acc = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    acc / 2.0
}

fn is_convex(quad: &[[f64; 2]; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let c = quad[(i + 2) % 4];
        let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn perimeter(quad: &[[f64; 2]; 4]) -> f64 {
    (0..4)
        .map(|i| {
            let a = quad[i];
            let b = quad[(i + 1) % 4];
            ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt()
        })
        .sum()
}
