//! Planar homography estimation, projection, and perspective resampling.
//!
//! Provides:
//! - Direct Linear Transform (DLT) with Hartley normalization from ≥4
//!   correspondences.
//! - Point projection through a 3×3 homography.
//! - Inverse-mapped bilinear warp of an RGB image.

use image::{Rgb, RgbImage};
use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::error::{Error, Result};

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3×3 homography: H * [x, y, 1]^T → [u, v].
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Reprojection error: ||project(H, src) - dst||.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(h, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    (dx * dx + dy * dy).sqrt()
}

/// Row-major copy of a 3×3 matrix, for serialization.
pub fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Compute a normalizing transform: translate centroid to origin, scale so
/// mean distance from origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

// ── DLT ──────────────────────────────────────────────────────────────────

/// Estimate H with `dst ≈ project(H, src)` from ≥4 correspondences.
///
/// Four points in general position give an exact fit. Collinear or
/// coincident inputs are reported as [`Error::Degenerate`].
pub fn estimate_homography_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return Err(Error::Degenerate(format!(
            "homography needs >= 4 matched points, got {} src / {} dst",
            n,
            dst.len()
        )));
    }
    if !src.iter().chain(dst).all(|p| p[0].is_finite() && p[1].is_finite()) {
        return Err(Error::Degenerate("non-finite correspondence".into()));
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // Build 2n × 9 matrix A
    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        // Row 2i:   [  0  0  0 | -sx -sy -1 | dy*sx  dy*sy  dy ]
        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        // Row 2i+1: [ sx  sy  1 |  0  0  0 | -dx*sx -dx*sy -dx ]
        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of the smallest eigenvalue of A^T A.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);

    let mut order: Vec<usize> = (0..9).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[i]
            .abs()
            .total_cmp(&eig.eigenvalues[j].abs())
    });
    // A second (near-)zero eigenvalue means the points do not pin down a
    // unique homography.
    if eig.eigenvalues[order[1]].abs() < 1e-10 {
        return Err(Error::Degenerate(
            "correspondences are collinear or coincident".into(),
        ));
    }

    let col = order[0];
    let h_norm = Matrix3::from_fn(|r, c| eig.eigenvectors[(r * 3 + c, col)]);

    // Denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| Error::Degenerate("destination normalization not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    let h = if scale.abs() < 1e-15 { h } else { h / scale };
    if h.determinant().abs() < 1e-12 {
        return Err(Error::Degenerate("homography is singular".into()));
    }
    Ok(h)
}

// ── Resampling ───────────────────────────────────────────────────────────

/// Warp `src` into a `width × height` image through `h` (src → dst).
///
/// Each output pixel `(x, y)` is pulled from `H⁻¹·(x, y)` with bilinear
/// interpolation; samples falling outside `src` are black.
pub fn warp_perspective(
    src: &RgbImage,
    h: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let h_inv = h
        .try_inverse()
        .ok_or_else(|| Error::Degenerate("homography is not invertible".into()))?;
    let mut out = RgbImage::new(width, height);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let [sx, sy] = project(&h_inv, x as f64, y as f64);
        *px = sample_bilinear(src, sx, sy);
    }
    Ok(out)
}

fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return Rgb([0, 0, 0]);
    }
    if x > (w - 1) as f64 || y > (h - 1) as f64 {
        return Rgb([0, 0, 0]);
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;
    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

// ── Tests ────────────────────────────────────────────────────────────────
