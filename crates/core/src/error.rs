//! Error types for map construction and arithmetic
//!
//! Degenerate numerics (division by zero, zero variance, infinities) are never errors:
//! they propagate through the grids as IEEE `inf`/`NaN`. Only structural problems are
//! reported here.

use crate::map::PersistenceError;

/// Errors that can occur when building or combining maps
#[derive(Debug)]
pub enum MapError {
    /// Two grids that must be co-indexed have different shapes
    ShapeMismatch {
        /// Which pair of grids was compared (e.g. `"value/ivar"`, `"left/right"`)
        context: &'static str,
        /// Shape of the first grid as `(rows, cols)`
        expected: (usize, usize),
        /// Shape of the second grid as `(rows, cols)`
        found: (usize, usize),
    },
    /// An inverse-variance entry is negative
    NegativeIvar {
        /// Row of the offending entry
        row: usize,
        /// Column of the offending entry
        col: usize,
        /// The offending value
        value: f64,
    },
    /// A derived-quantity correction was requested for a map that does not support it
    CorrectionUnsupported(String),
    /// Saving or restoring a map failed
    Persistence(PersistenceError),
}

impl MapError {
    /// Fail with `ShapeMismatch` unless both shapes agree
    ///
    /// # Errors
    /// Returns `MapError::ShapeMismatch` if the shapes differ
    pub fn check_shape(
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Result<(), MapError> {
        if expected == found {
            Ok(())
        } else {
            Err(MapError::ShapeMismatch {
                context,
                expected,
                found,
            })
        }
    }
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::ShapeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "Shape mismatch ({context}): {}x{} vs {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            MapError::NegativeIvar { row, col, value } => {
                write!(f, "Inverse variance must be non-negative, got {value} at ({row}, {col})")
            }
            MapError::CorrectionUnsupported(msg) => write!(f, "{msg}"),
            MapError::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersistenceError> for MapError {
    fn from(err: PersistenceError) -> Self {
        MapError::Persistence(err)
    }
}
