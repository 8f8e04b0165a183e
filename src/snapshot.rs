//! Portable record of one normalization, for persistence and transport.
//!
//! Captures the configuration, the convergence report and the `B × K`
//! assignment (row-major) so a training run can log its targets per step
//! and reload them later without re-running the normalizer.
//!
//! Requires the `serde` feature.

use ndarray::{Array2, ArrayView2};

use crate::error::{Result, SinkhornError};
use crate::sinkhorn::{ConvergenceReport, SinkhornConfig};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Serializable copy of an assignment matrix and how it was produced.
///
/// # Example
///
/// ```rust,ignore
/// use swav_sinkhorn::snapshot::AssignmentSnapshot;
///
/// let (out, report) = sinkhorn.normalize_with_report(q)?;
/// let snap = AssignmentSnapshot::from_output(sinkhorn.config(), &report, out.view());
/// let json = serde_json::to_string(&snap).unwrap();
/// ```
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct AssignmentSnapshot {
    /// Format version, always [`SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Configuration the assignment was computed with.
    pub config: SinkhornConfig,
    /// Residuals of the balancing loop.
    pub report: ConvergenceReport,
    /// Rows of the assignment (batch size B).
    pub samples: usize,
    /// Columns of the assignment (prototype count K).
    pub prototypes: usize,
    /// Assignment values in row-major order, `samples * prototypes` long.
    pub assignments: Vec<f32>,
}

impl AssignmentSnapshot {
    /// Capture a `B × K` assignment.
    pub fn from_output(
        config: &SinkhornConfig,
        report: &ConvergenceReport,
        assignment: ArrayView2<'_, f32>,
    ) -> Self {
        let (samples, prototypes) = assignment.dim();
        Self {
            version: SNAPSHOT_VERSION,
            config: config.clone(),
            report: report.clone(),
            samples,
            prototypes,
            // logical order regardless of memory layout
            assignments: assignment.iter().copied().collect(),
        }
    }

    /// Rebuild the assignment matrix.
    ///
    /// Shape fields come from untrusted input after deserialising, so a
    /// `samples × prototypes` product that overflows or disagrees with the
    /// data length is reported as [`SinkhornError::ShapeMismatch`].
    pub fn to_array(&self) -> Result<Array2<f32>> {
        let mismatch = SinkhornError::ShapeMismatch {
            expected: [self.samples, self.prototypes],
            actual: [self.assignments.len(), 1],
        };
        match self.samples.checked_mul(self.prototypes) {
            Some(len) if len == self.assignments.len() => {}
            _ => return Err(mismatch),
        }
        Array2::from_shape_vec((self.samples, self.prototypes), self.assignments.clone())
            .map_err(|_| mismatch)
    }

    /// Assignment distribution of one sample, or `None` if out of range.
    pub fn row(&self, sample: usize) -> Option<&[f32]> {
        if sample >= self.samples {
            return None;
        }
        let start = sample.checked_mul(self.prototypes)?;
        let end = start.checked_add(self.prototypes)?;
        self.assignments.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn report() -> ConvergenceReport {
        ConvergenceReport { iterations: 3, row_residual: 0.0, col_residual: 0.0 }
    }

    #[test]
    fn captures_logical_order_of_transposed_output() {
        let a = array![[0.1_f32, 0.9], [0.6, 0.4], [0.3, 0.7]];
        // column-major view with the same logical content
        let t = a.t().to_owned();
        let snap = AssignmentSnapshot::from_output(&SinkhornConfig::default(), &report(), t.t());
        assert_eq!(snap.samples, 3);
        assert_eq!(snap.prototypes, 2);
        assert_eq!(snap.row(1), Some(&[0.6_f32, 0.4][..]));
        assert_eq!(snap.to_array().unwrap(), a);
    }

    #[test]
    fn row_out_of_range() {
        let a = array![[1.0_f32]];
        let snap = AssignmentSnapshot::from_output(&SinkhornConfig::default(), &report(), a.view());
        assert_eq!(snap.row(1), None);
    }

    #[test]
    fn truncated_data_rejected() {
        let a = array![[0.5_f32, 0.5]];
        let mut snap =
            AssignmentSnapshot::from_output(&SinkhornConfig::default(), &report(), a.view());
        snap.assignments.pop();
        assert!(matches!(snap.to_array(), Err(SinkhornError::ShapeMismatch { .. })));
    }

    #[test]
    fn overflowing_shape_rejected() {
        let mut snap = AssignmentSnapshot::from_output(
            &SinkhornConfig::default(),
            &report(),
            array![[1.0_f32]].view(),
        );
        snap.samples = 2;
        snap.prototypes = usize::MAX;
        snap.assignments.clear();
        assert_eq!(
            snap.to_array(),
            Err(SinkhornError::ShapeMismatch { expected: [2, usize::MAX], actual: [0, 1] })
        );
        assert_eq!(snap.row(0), None);
        assert_eq!(snap.row(1), None);
    }
}
