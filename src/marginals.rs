//! Target row and column distributions for the balancing loop.
//!
//! SwAV always balances toward uniform marginals: every prototype should
//! receive `1/K` of the batch mass and every sample carries `1/B`. Explicit
//! marginals are accepted for callers with a known prototype prior.

use ndarray::Array1;

use crate::error::{Axis, Result, SinkhornError};

/// Row (prototype) and column (sample) target sums.
#[derive(Clone, Debug, PartialEq)]
pub struct Marginals {
    rows: Array1<f32>,
    cols: Array1<f32>,
}

impl Marginals {
    /// Uniform targets: `r[i] = 1/k`, `c[j] = 1/b`.
    pub fn uniform(k: usize, b: usize) -> Self {
        Self {
            rows: uniform_vector(k),
            cols: uniform_vector(b),
        }
    }

    /// Explicit targets. Lengths are checked against the score matrix when
    /// the marginals are used, see [`Marginals::validate`].
    pub fn new(rows: Array1<f32>, cols: Array1<f32>) -> Self {
        Self { rows, cols }
    }

    /// Row targets, one per prototype.
    pub fn rows(&self) -> &Array1<f32> {
        &self.rows
    }

    /// Column targets, one per sample.
    pub fn cols(&self) -> &Array1<f32> {
        &self.cols
    }

    /// Check that the marginals fit a `k × b` score matrix.
    pub fn validate(&self, k: usize, b: usize) -> Result<()> {
        if self.rows.len() != k {
            return Err(SinkhornError::MarginalLengthMismatch {
                axis: Axis::Row,
                expected: k,
                actual: self.rows.len(),
            });
        }
        if self.cols.len() != b {
            return Err(SinkhornError::MarginalLengthMismatch {
                axis: Axis::Column,
                expected: b,
                actual: self.cols.len(),
            });
        }
        Ok(())
    }

    /// True when these marginals fit a `k × b` matrix and are uniform.
    pub(crate) fn is_uniform_for(&self, k: usize, b: usize) -> bool {
        self.validate(k, b).is_ok()
            && self.rows.iter().all(|&v| v == 1.0 / k as f32)
            && self.cols.iter().all(|&v| v == 1.0 / b as f32)
    }
}

fn uniform_vector(n: usize) -> Array1<f32> {
    Array1::ones(n) / n as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn uniform_entries() {
        let m = Marginals::uniform(4, 8);
        assert!(m.rows().iter().all(|&v| v == 0.25));
        assert!(m.cols().iter().all(|&v| v == 0.125));
        assert!(m.is_uniform_for(4, 8));
    }

    #[test]
    fn validate_reports_row_mismatch_first() {
        let m = Marginals::new(array![0.5, 0.5], array![1.0]);
        assert_eq!(
            m.validate(3, 2),
            Err(SinkhornError::MarginalLengthMismatch {
                axis: Axis::Row,
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn validate_reports_column_mismatch() {
        let m = Marginals::new(array![0.5, 0.5], array![1.0]);
        assert_eq!(
            m.validate(2, 4),
            Err(SinkhornError::MarginalLengthMismatch {
                axis: Axis::Column,
                expected: 4,
                actual: 1,
            })
        );
    }

    #[test]
    fn explicit_marginals_are_not_uniform() {
        let m = Marginals::new(array![0.75, 0.25], array![0.5, 0.5]);
        assert!(m.validate(2, 2).is_ok());
        assert!(!m.is_uniform_for(2, 2));
    }
}
