//! Shared synthetic scenes for image-based unit tests.
//!
//! Markers are rendered axis-aligned with square cells; the marker lattice is
//! 6×6 cells (dark border around the 4×4 payload, light payload cells = `1`).

use image::{Rgb, RgbImage};

use crate::marker::dictionary::{word_bit, ARUCO_4X4_WORDS, PAYLOAD_CELLS};
use crate::marker::MARKER_CELLS;

pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub(crate) const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

pub(crate) fn white_frame(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, WHITE)
}

/// Fill the axis-aligned rectangle `[x, x+w) × [y, y+h)`, clipped to the image.
pub(crate) fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let (iw, ih) = img.dimensions();
    for yy in y..(y + h).min(ih) {
        for xx in x..(x + w).min(iw) {
            img.put_pixel(xx, yy, color);
        }
    }
}

/// Draw a marker with its top-left pixel at `(x0, y0)` and `cell` pixels per cell.
pub(crate) fn draw_marker(img: &mut RgbImage, word: u16, x0: u32, y0: u32, cell: u32) {
    let side = MARKER_CELLS as u32 * cell;
    fill_rect(img, x0, y0, side, side, BLACK);
    for r in 0..PAYLOAD_CELLS {
        for c in 0..PAYLOAD_CELLS {
            if word_bit(word, r, c) {
                let x = x0 + (c as u32 + 1) * cell;
                let y = y0 + (r as u32 + 1) * cell;
                fill_rect(img, x, y, cell, cell, WHITE);
            }
        }
    }
}

/// Expected centroid of a marker drawn by [`draw_marker`]: the mean of its
/// outermost pixel centres.
pub(crate) fn marker_centroid(x0: u32, y0: u32, cell: u32) -> [f64; 2] {
    let half = (MARKER_CELLS as u32 * cell - 1) as f64 / 2.0;
    [x0 as f64 + half, y0 as f64 + half]
}

/// White frame with built-in markers 0..=3 near the TL, TR, BR, BL corners.
///
/// Returns the frame and the marker centroids in that same order.
pub(crate) fn corner_marker_scene(w: u32, h: u32, cell: u32) -> (RgbImage, [[f64; 2]; 4]) {
    let side = MARKER_CELLS as u32 * cell;
    let margin = cell * 2;
    let origins = [
        (margin, margin),
        (w - margin - side, margin),
        (w - margin - side, h - margin - side),
        (margin, h - margin - side),
    ];
    let mut frame = white_frame(w, h);
    let mut centroids = [[0.0; 2]; 4];
    for (id, &(x, y)) in origins.iter().enumerate() {
        draw_marker(&mut frame, ARUCO_4X4_WORDS[id], x, y, cell);
        centroids[id] = marker_centroid(x, y, cell);
    }
    (frame, centroids)
}

/// Gaussian-blur an RGB frame via `imageproc`.
pub(crate) fn blur_rgb(img: &RgbImage, sigma: f32) -> RgbImage {
    imageproc::filter::gaussian_blur_f32(img, sigma)
}

/// Floor → frame homography of a tilted, shifted camera.
pub(crate) fn oblique_camera() -> nalgebra::Matrix3<f64> {
    nalgebra::Matrix3::new(
        1.1, 0.08, 60.0, //
        0.02, 1.0, 30.0, //
        0.0001, 0.00005, 1.0,
    )
}
