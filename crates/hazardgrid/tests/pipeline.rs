use hazardgrid::marker::dictionary::{word_bit, ARUCO_4X4_WORDS, PAYLOAD_CELLS};
use hazardgrid::{
    DetectionStrategy, DirDebugSink, FileFrameSource, GridCell, HazardConfig, NoopDebugSink,
    PathMessage, Pipeline, PipelineConfig, PipelineOutcome,
};
use image::{Rgb, RgbImage};
use nalgebra::Matrix3;

const CELL: u32 = 10;
const RED: Rgb<u8> = Rgb([220, 20, 20]);

fn fill(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for yy in y..y + h {
        for xx in x..x + w {
            img.put_pixel(xx, yy, color);
        }
    }
}

fn draw_marker(img: &mut RgbImage, word: u16, x0: u32, y0: u32) {
    let side = (PAYLOAD_CELLS as u32 + 2) * CELL;
    fill(img, x0, y0, side, side, Rgb([0, 0, 0]));
    for r in 0..PAYLOAD_CELLS {
        for c in 0..PAYLOAD_CELLS {
            if word_bit(word, r, c) {
                let x = x0 + (c as u32 + 1) * CELL;
                let y = y0 + (r as u32 + 1) * CELL;
                fill(img, x, y, CELL, CELL, Rgb([255, 255, 255]));
            }
        }
    }
}

/// 400×400 floor with markers 0..=3 at TL, TR, BR, BL (centroids ≈ 39.5 / 359.5)
/// and a red 40×40 patch whose centre rectifies to (375, 125) in a 500×500 view,
/// i.e. cell (2, 7) of a 10×10 grid.
fn floor() -> RgbImage {
    let mut img = RgbImage::from_pixel(400, 400, Rgb([255, 255, 255]));
    for (id, (x, y)) in [(10, 10), (330, 10), (330, 330), (10, 330)].into_iter().enumerate() {
        draw_marker(&mut img, ARUCO_4X4_WORDS[id], x, y);
    }
    fill(&mut img, 260, 100, 40, 40, RED);
    img
}

/// Floor seen by an oblique camera.
fn camera_frame() -> RgbImage {
    let h = Matrix3::new(
        1.1, 0.08, 60.0, //
        0.02, 1.0, 30.0, //
        0.0001, 0.00005, 1.0,
    );
    hazardgrid::warp_perspective(&floor(), &h, 640, 480).expect("invertible")
}

fn red_config() -> PipelineConfig {
    PipelineConfig {
        hazard: HazardConfig {
            strategy: DetectionStrategy::Contours,
            color_lower: [0, 150, 150],
            color_upper: [10, 255, 255],
            ..HazardConfig::default()
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn oblique_frame_plans_path_to_hazard() {
    let pipeline = Pipeline::new(red_config()).expect("valid config");
    let outcome = pipeline
        .run(&camera_frame(), &mut NoopDebugSink)
        .expect("run succeeds");
    let PipelineOutcome::Planned(report) = outcome else {
        panic!("expected a hazard");
    };
    assert!(report.rectified);
    assert_eq!(report.start, GridCell::new(9, 5));
    assert_eq!(report.goal, GridCell::new(2, 7));
    assert_eq!(report.path.len(), 10);

    let msg = PathMessage::from_path(&report.path);
    assert_eq!(msg.path.first(), Some(&[9, 5]));
    assert_eq!(msg.path.last(), Some(&[2, 7]));
    for pair in msg.path.windows(2) {
        let d = pair[0][0].abs_diff(pair[1][0]) + pair[0][1].abs_diff(pair[1][1]);
        assert_eq!(d, 1);
    }
}

#[test]
fn file_source_and_debug_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame_path = dir.path().join("frame.png");
    camera_frame().save(&frame_path).expect("write frame");

    let pipeline = Pipeline::new(PipelineConfig {
        debug: true,
        ..red_config()
    })
    .expect("valid config");
    let mut source = FileFrameSource::new(&frame_path);
    let mut sink = DirDebugSink::new(dir.path().join("debug"));
    let outcome = pipeline
        .run_source(&mut source, &mut sink)
        .expect("run succeeds");

    assert!(outcome.report().is_some());
    let stages: Vec<String> = sink
        .written()
        .iter()
        .filter_map(|p| p.file_name()?.to_str()?.split('_').next().map(str::to_string))
        .collect();
    assert_eq!(stages, vec!["raw", "markers", "rectified", "overlay"]);
    assert!(sink.written().iter().all(|p| p.exists()));
}

#[test]
fn frame_without_hazard_reports_none() {
    let pipeline = Pipeline::new(PipelineConfig {
        hazard: HazardConfig {
            color_lower: [50, 150, 150],
            color_upper: [70, 255, 255],
            ..HazardConfig::default()
        },
        ..PipelineConfig::default()
    })
    .expect("valid config");
    let outcome = pipeline
        .run(&camera_frame(), &mut NoopDebugSink)
        .expect("run succeeds");
    assert_eq!(outcome, PipelineOutcome::NoHazard);
}
