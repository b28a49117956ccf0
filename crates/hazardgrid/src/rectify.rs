//! Marker-based perspective rectification to a top-down view.
//!
//! Four fiducials are ordered TL, TR, BR, BL and their centroids are mapped
//! to the output corners `(0,0), (w,0), (w,h), (0,h)`. Geometric ordering
//! (coordinate sum/difference extremes) is canonical; ordering by id is
//! available for layouts with known id placement. One strategy per call.

use image::RgbImage;
use nalgebra::Matrix3;

use crate::error::{Error, Result};
use crate::homography::{estimate_homography_dlt, matrix3_to_array, warp_perspective};
use crate::marker::{DetectedMarker, MarkerConfig, MarkerDetector};

/// Markers needed to pin down the homography.
pub const REQUIRED_MARKERS: usize = 4;

/// How detected markers are assigned to the TL, TR, BR, BL corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingStrategy {
    /// TL = min(x+y), BR = max(x+y), TR = min(y−x), BL = max(y−x).
    #[default]
    Geometric,
    /// Four lowest ids, ascending, taken as TL, TR, BR, BL.
    ById,
}

/// Policy when fewer than four markers are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RectifyFallback {
    /// Continue with the unrectified frame.
    #[default]
    RawFrame,
    /// Fail the run with [`Error::InsufficientMarkers`].
    Abort,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Rectified image size `[width, height]`.
    pub output_size: [u32; 2],
    pub ordering: OrderingStrategy,
    pub fallback: RectifyFallback,
    pub markers: MarkerConfig,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            output_size: [500, 500],
            ordering: OrderingStrategy::default(),
            fallback: RectifyFallback::default(),
            markers: MarkerConfig::default(),
        }
    }
}

impl RectifyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_size.contains(&0) {
            return Err(Error::Config(format!(
                "rectify.output_size must be non-zero, got {:?}",
                self.output_size
            )));
        }
        let m = &self.markers;
        if !(m.approx_epsilon_ratio > 0.0 && m.approx_epsilon_ratio < 1.0) {
            return Err(Error::Config(
                "rectify.markers.approx_epsilon_ratio must be in (0, 1)".into(),
            ));
        }
        if !(0.0..=1.0).contains(&m.border_tolerance) {
            return Err(Error::Config(
                "rectify.markers.border_tolerance must be in [0, 1]".into(),
            ));
        }
        if !m.min_perimeter_px.is_finite() || m.min_perimeter_px < 0.0 {
            return Err(Error::Config(
                "rectify.markers.min_perimeter_px must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// A rectified frame plus the geometry that produced it.
#[derive(Debug, Clone)]
pub struct Rectification {
    pub image: RgbImage,
    /// Corner markers in TL, TR, BR, BL order.
    pub corners: [DetectedMarker; 4],
    /// Every marker decoded in the frame, sorted by id.
    pub detected: Vec<DetectedMarker>,
    /// Frame → rectified homography.
    pub homography: Matrix3<f64>,
}

impl Rectification {
    /// Row-major homography for serialization.
    pub fn homography_array(&self) -> [[f64; 3]; 3] {
        matrix3_to_array(&self.homography)
    }
}

/// Image handed to hazard detection after the fallback policy is applied.
#[derive(Debug, Clone)]
pub enum RectifyOutcome {
    Rectified(Rectification),
    /// Too few markers; the raw frame is used as-is.
    Raw { image: RgbImage, found: usize },
}

impl RectifyOutcome {
    pub fn image(&self) -> &RgbImage {
        match self {
            Self::Rectified(r) => &r.image,
            Self::Raw { image, .. } => image,
        }
    }

    pub fn is_rectified(&self) -> bool {
        matches!(self, Self::Rectified(_))
    }
}

/// Detects corner markers and warps frames to the configured output size.
#[derive(Debug, Clone)]
pub struct Rectifier {
    config: RectifyConfig,
    detector: MarkerDetector,
}

impl Rectifier {
    pub fn new(config: RectifyConfig) -> Result<Self> {
        config.validate()?;
        let detector = MarkerDetector::new(config.markers.clone())?;
        Ok(Self { config, detector })
    }

    pub fn config(&self) -> &RectifyConfig {
        &self.config
    }

    pub fn detector(&self) -> &MarkerDetector {
        &self.detector
    }

    /// Rectify `frame`, failing with [`Error::InsufficientMarkers`] when fewer
    /// than four distinct markers decode.
    pub fn rectify(&self, frame: &RgbImage) -> Result<Rectification> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::InvalidInput("frame has zero size".into()));
        }
        let detected = self.detector.detect(frame);
        let corners = order_markers(&detected, self.config.ordering)?;
        let [w, h] = self.config.output_size;
        let homography = corner_homography(&corners, w, h)?;
        let image = warp_perspective(frame, &homography, w, h)?;
        tracing::info!(
            ids = ?corners.iter().map(|m| m.id).collect::<Vec<_>>(),
            ordering = ?self.config.ordering,
            "rectified {}x{} frame to {}x{}",
            frame.width(),
            frame.height(),
            w,
            h
        );
        Ok(Rectification {
            image,
            corners,
            detected,
            homography,
        })
    }

    /// [`Self::rectify`] with the configured fallback applied to
    /// [`Error::InsufficientMarkers`]. Other errors always propagate.
    pub fn rectify_or_fallback(&self, frame: &RgbImage) -> Result<RectifyOutcome> {
        match self.rectify(frame) {
            Ok(r) => Ok(RectifyOutcome::Rectified(r)),
            Err(Error::InsufficientMarkers { found, required })
                if self.config.fallback == RectifyFallback::RawFrame =>
            {
                tracing::warn!(
                    found,
                    required,
                    "insufficient markers, continuing with the raw frame"
                );
                Ok(RectifyOutcome::Raw {
                    image: frame.clone(),
                    found,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Pick and order four corner markers with a single strategy.
pub fn order_markers(
    markers: &[DetectedMarker],
    strategy: OrderingStrategy,
) -> Result<[DetectedMarker; 4]> {
    if markers.len() < REQUIRED_MARKERS {
        return Err(Error::InsufficientMarkers {
            found: markers.len(),
            required: REQUIRED_MARKERS,
        });
    }
    let idx = match strategy {
        OrderingStrategy::Geometric => {
            let centroids: Vec<[f64; 2]> = markers.iter().map(|m| m.centroid).collect();
            order_geometric(&centroids)?
        }
        OrderingStrategy::ById => {
            let mut by_id: Vec<usize> = (0..markers.len()).collect();
            by_id.sort_by_key(|&i| markers[i].id);
            [by_id[0], by_id[1], by_id[2], by_id[3]]
        }
    };
    Ok(idx.map(|i| markers[i].clone()))
}

/// Indices of the TL, TR, BR, BL points by coordinate sum/difference extremes.
///
/// Fails with [`Error::Degenerate`] when one point wins two corners, e.g.
/// a layout rotated by 45°.
pub fn order_geometric(points: &[[f64; 2]]) -> Result<[usize; 4]> {
    if points.len() < REQUIRED_MARKERS {
        return Err(Error::InsufficientMarkers {
            found: points.len(),
            required: REQUIRED_MARKERS,
        });
    }
    let sum = |i: usize| points[i][0] + points[i][1];
    let diff = |i: usize| points[i][1] - points[i][0];
    let argmin = |key: &dyn Fn(usize) -> f64| {
        (0..points.len())
            .min_by(|&a, &b| key(a).total_cmp(&key(b)))
            .unwrap_or(0)
    };
    let argmax = |key: &dyn Fn(usize) -> f64| {
        (0..points.len())
            .max_by(|&a, &b| key(a).total_cmp(&key(b)))
            .unwrap_or(0)
    };

    let order = [argmin(&sum), argmin(&diff), argmax(&sum), argmax(&diff)];
    for i in 0..4 {
        for j in (i + 1)..4 {
            if order[i] == order[j] {
                return Err(Error::Degenerate(format!(
                    "geometric ordering assigned point {} to two corners",
                    order[i]
                )));
            }
        }
    }
    Ok(order)
}

/// Homography taking ordered marker centroids to the corners of a `w × h` image.
pub fn corner_homography(corners: &[DetectedMarker; 4], w: u32, h: u32) -> Result<Matrix3<f64>> {
    let src = corners.clone().map(|m| m.centroid);
    let (w, h) = (w as f64, h as f64);
    let dst = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
    estimate_homography_dlt(&src, &dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::project;
    use crate::marker::dictionary::ARUCO_4X4_WORDS;
    use crate::test_utils::{corner_marker_scene, draw_marker, fill_rect, oblique_camera, white_frame};
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    fn marker_at(id: u32, centroid: [f64; 2]) -> DetectedMarker {
        DetectedMarker {
            id,
            corners: [centroid; 4],
            centroid,
            rotation: 0,
            hamming: 0,
            perimeter: 40.0,
        }
    }

    #[test]
    fn geometric_order_from_shuffled_points() {
        let pts = [[90.0, 85.0], [10.0, 80.0], [95.0, 5.0], [8.0, 12.0]];
        assert_eq!(order_geometric(&pts).expect("distinct"), [3, 2, 0, 1]);
    }

    #[test]
    fn geometric_order_rejects_diamond() {
        // Min sum and min difference both land on the top vertex.
        let pts = [[50.0, 0.0], [100.0, 50.0], [50.0, 100.0], [0.0, 50.0]];
        assert!(matches!(order_geometric(&pts), Err(Error::Degenerate(_))));
    }

    #[test]
    fn strategies_disagree_on_swapped_ids() {
        let markers = vec![
            marker_at(0, [100.0, 100.0]),
            marker_at(1, [10.0, 10.0]),
            marker_at(2, [100.0, 10.0]),
            marker_at(3, [10.0, 100.0]),
        ];
        let geo = order_markers(&markers, OrderingStrategy::Geometric).expect("four");
        let ids: Vec<u32> = geo.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 0, 3]);
        let by_id = order_markers(&markers, OrderingStrategy::ById).expect("four");
        let ids: Vec<u32> = by_id.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn by_id_keeps_four_lowest() {
        let markers = vec![
            marker_at(7, [0.0, 0.0]),
            marker_at(2, [1.0, 0.0]),
            marker_at(5, [1.0, 1.0]),
            marker_at(0, [0.0, 1.0]),
            marker_at(3, [0.5, 0.5]),
        ];
        let ordered = order_markers(&markers, OrderingStrategy::ById).expect("five");
        let ids: Vec<u32> = ordered.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 2, 3, 5]);
    }

    #[test]
    fn too_few_markers_is_reported() {
        let markers = vec![marker_at(0, [0.0, 0.0]), marker_at(1, [5.0, 0.0])];
        let err = order_markers(&markers, OrderingStrategy::Geometric).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientMarkers {
                found: 2,
                required: 4
            }
        ));
    }

    #[test]
    fn rectify_maps_centroids_to_output_corners() {
        let (frame, centroids) = corner_marker_scene(320, 240, 8);
        let rectifier = Rectifier::new(RectifyConfig {
            output_size: [200, 100],
            ..RectifyConfig::default()
        })
        .expect("valid config");
        let r = rectifier.rectify(&frame).expect("four markers");
        assert_eq!(r.image.dimensions(), (200, 100));
        let ids: Vec<u32> = r.corners.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let expected = [[0.0, 0.0], [200.0, 0.0], [200.0, 100.0], [0.0, 100.0]];
        for (c, e) in centroids.iter().zip(expected) {
            let p = project(&r.homography, c[0], c[1]);
            assert_abs_diff_eq!(p[0], e[0], epsilon = 1.5);
            assert_abs_diff_eq!(p[1], e[1], epsilon = 1.5);
        }
    }

    #[test]
    fn rectified_pixels_come_from_mapped_source() {
        let (mut frame, centroids) = corner_marker_scene(320, 240, 8);
        // Red patch at the midpoint between the marker centroids.
        let cx = (centroids[0][0] + centroids[2][0]) / 2.0;
        let cy = (centroids[0][1] + centroids[2][1]) / 2.0;
        for y in (cy as u32 - 10)..(cy as u32 + 10) {
            for x in (cx as u32 - 10)..(cx as u32 + 10) {
                frame.put_pixel(x, y, Rgb([220, 20, 20]));
            }
        }
        let rectifier = Rectifier::new(RectifyConfig::default()).expect("valid config");
        let r = rectifier.rectify(&frame).expect("four markers");
        // Axis-aligned markers give an affine map; the centre maps to the centre.
        assert_eq!(r.image.get_pixel(250, 250), &Rgb([220, 20, 20]));
        assert_eq!(r.image.get_pixel(60, 250), &Rgb([255, 255, 255]));
    }

    #[test]
    fn oblique_view_is_rectified_to_floor_plane() {
        let (mut floor, centroids) = corner_marker_scene(320, 240, 8);
        // Red patch at the floor point halfway between the outer centroids.
        fill_rect(&mut floor, 150, 110, 20, 20, Rgb([220, 20, 20]));
        let camera = oblique_camera();
        let frame = warp_perspective(&floor, &camera, 480, 320).expect("invertible");

        let rectifier = Rectifier::new(RectifyConfig::default()).expect("valid config");
        let r = rectifier.rectify(&frame).expect("four markers");
        let ids: Vec<u32> = r.corners.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let expected = [[0.0, 0.0], [500.0, 0.0], [500.0, 500.0], [0.0, 500.0]];
        for (c, e) in centroids.iter().zip(expected) {
            let seen = project(&camera, c[0], c[1]);
            let p = project(&r.homography, seen[0], seen[1]);
            assert_abs_diff_eq!(p[0], e[0], epsilon = 5.0);
            assert_abs_diff_eq!(p[1], e[1], epsilon = 5.0);
        }

        // Floor (160, 120) is the centroid midpoint, so it lands mid-view.
        assert_eq!(r.image.get_pixel(250, 250), &Rgb([220, 20, 20]));
        assert_eq!(r.image.get_pixel(60, 250), &Rgb([255, 255, 255]));
    }

    #[test]
    fn missing_marker_falls_back_or_aborts() {
        let mut frame = white_frame(320, 240);
        for (id, (x, y)) in [(16, 16), (256, 16), (256, 176)].into_iter().enumerate() {
            draw_marker(&mut frame, ARUCO_4X4_WORDS[id], x, y, 8);
        }

        let raw = Rectifier::new(RectifyConfig::default()).expect("valid config");
        assert!(matches!(
            raw.rectify(&frame),
            Err(Error::InsufficientMarkers { found: 3, .. })
        ));
        let outcome = raw.rectify_or_fallback(&frame).expect("fallback");
        assert!(!outcome.is_rectified());
        assert_eq!(outcome.image().dimensions(), (320, 240));

        let abort = Rectifier::new(RectifyConfig {
            fallback: RectifyFallback::Abort,
            ..RectifyConfig::default()
        })
        .expect("valid config");
        assert!(abort.rectify_or_fallback(&frame).is_err());
    }

    #[test]
    fn config_validation() {
        let bad = RectifyConfig {
            output_size: [0, 10],
            ..RectifyConfig::default()
        };
        assert!(matches!(Rectifier::new(bad), Err(Error::Config(_))));
        let json = r#"{"ordering":"by_id","fallback":"abort"}"#;
        let cfg: RectifyConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(cfg.ordering, OrderingStrategy::ById);
        assert_eq!(cfg.fallback, RectifyFallback::Abort);
        assert_eq!(cfg.output_size, [500, 500]);
    }
}
