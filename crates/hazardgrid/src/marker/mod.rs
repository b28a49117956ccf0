//! Square fiducial markers: dictionary and detection.

mod detect;
pub mod dictionary;

pub use detect::{DetectedMarker, MarkerConfig, MarkerDetector, MARKER_CELLS};
pub(crate) use detect::signed_area;
pub use dictionary::{Dictionary, Match, MarkerFamily};
