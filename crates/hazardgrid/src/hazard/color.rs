//! HSV thresholding and mask cleanup.
//!
//! HSV follows the common 8-bit convention: `H ∈ [0, 180)` (degrees / 2),
//! `S, V ∈ [0, 255]`.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;

/// L∞ radius of the square structuring element (5×5).
pub const MORPH_RADIUS: u8 = 2;

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(px: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = px.0.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { delta / v * 255.0 } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        v as u8,
    ]
}

/// Binary mask (255 = inside) of pixels whose HSV lies in `[lower, upper]`,
/// inclusive on every channel.
pub fn in_range(image: &RgbImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let hsv = rgb_to_hsv(*image.get_pixel(x, y));
        let inside = (0..3).all(|c| hsv[c] >= lower[c] && hsv[c] <= upper[c]);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// Opening then closing with a 5×5 square element: drops speckle, fills pinholes.
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let opened = imageproc::morphology::open(mask, Norm::LInf, MORPH_RADIUS);
    imageproc::morphology::close(&opened, Norm::LInf, MORPH_RADIUS)
}
