//! Error type for the normalizer and its helpers.

use core::fmt;

use thiserror::Error;

/// Matrix axis named in shape and degeneracy errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// Prototype axis (rows of the score matrix).
    Row,
    /// Sample axis (columns of the score matrix).
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => f.write_str("row"),
            Axis::Column => f.write_str("column"),
        }
    }
}

/// Everything that can go wrong while balancing a score matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SinkhornError {
    /// The score matrix has no prototypes or no samples.
    #[error("score matrix is empty: {rows} x {cols}")]
    EmptyMatrix {
        /// Number of rows (prototypes).
        rows: usize,
        /// Number of columns (samples).
        cols: usize,
    },

    /// The global sum of the scores is zero, negative, or not finite.
    #[error("score matrix total must be finite and positive, got {0}")]
    NonPositiveTotal(f32),

    /// A row or column sum used as a divisor collapsed to zero or went non-finite.
    #[error("degenerate {axis} sum at index {index} (iteration {iteration}): {value}")]
    DegenerateSum {
        /// Axis whose sum degenerated.
        axis: Axis,
        /// Row or column index.
        index: usize,
        /// Balancing round in which it happened; equal to the iteration
        /// count for the final column renormalization.
        iteration: usize,
        /// The offending sum.
        value: f32,
    },

    /// A marginal vector does not match the matrix dimension along its axis.
    #[error("{axis} marginal has length {actual}, matrix expects {expected}")]
    MarginalLengthMismatch {
        /// Axis of the marginal.
        axis: Axis,
        /// Dimension of the score matrix along that axis.
        expected: usize,
        /// Length of the supplied marginal.
        actual: usize,
    },

    /// A signed iteration count from a foreign caller was negative.
    #[error("iteration count must be non-negative, got {0}")]
    NegativeIterations(i64),

    /// A score entry is negative or NaN.
    #[error("score at ({row}, {col}) is negative or NaN: {value}")]
    NegativeEntry {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
        /// The offending score.
        value: f32,
    },

    /// Two matrices that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected `[rows, cols]`.
        expected: [usize; 2],
        /// Actual `[rows, cols]`.
        actual: [usize; 2],
    },

    /// A scalar parameter is outside its valid range.
    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Supplied value.
        value: f32,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, SinkhornError>;

/// Convert a signed iteration count into the unsigned count the normalizer runs.
///
/// ```
/// use swav_sinkhorn::error::{iterations_from_signed, SinkhornError};
///
/// assert_eq!(iterations_from_signed(3), Ok(3));
/// assert_eq!(iterations_from_signed(-1), Err(SinkhornError::NegativeIterations(-1)));
/// ```
pub fn iterations_from_signed(n: i64) -> Result<usize> {
    usize::try_from(n).map_err(|_| SinkhornError::NegativeIterations(n))
}
