//! Error taxonomy shared by every pipeline stage.
//!
//! "No hazard" and "no path" are not errors: detection returns `None` and the
//! planner returns an empty [`Path`](crate::Path).

use crate::grid::GridCell;

/// Failures that abort a single pipeline run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The frame source was unreachable or returned undecodable data.
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    /// Fewer distinct fiducials than needed to form a rectification.
    #[error("insufficient markers: found {found}, need {required}")]
    InsufficientMarkers {
        /// Distinct marker IDs decoded in the frame.
        found: usize,
        /// Markers required for a perspective warp.
        required: usize,
    },

    /// An absent or empty image, or a malformed coordinate container.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A planner endpoint outside the occupancy grid.
    #[error("cell {cell:?} is outside a {rows}x{cols} grid")]
    OutOfBounds {
        /// Offending cell.
        cell: GridCell,
        /// Grid row count.
        rows: usize,
        /// Grid column count.
        cols: usize,
    },

    /// The marker centroids do not define a usable perspective transform.
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// The configuration could not be read or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = Error::InsufficientMarkers {
            found: 2,
            required: 4,
        };
        assert_eq!(err.to_string(), "insufficient markers: found 2, need 4");

        let err = Error::OutOfBounds {
            cell: GridCell::new(12, 3),
            rows: 10,
            cols: 10,
        };
        assert!(err.to_string().contains("outside a 10x10 grid"));
    }
}
