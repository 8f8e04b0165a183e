//! Glue between a prototype layer and the normalizer.
//!
//! A SwAV head scores each sample against every prototype, sharpens the
//! scores with `exp(score / epsilon)`, balances them with [`Sinkhorn`] and
//! uses the result as the target of a cross-entropy against the prediction
//! made from a different view of the same sample ("swapped prediction").
//!
//! Logits are laid out the way a prototype layer emits them: `B × K`, one
//! row per sample.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Result, SinkhornError};
use crate::sinkhorn::Sinkhorn;
use crate::workspace::Workspace;

/// Sharpening temperature used by SwAV when building targets.
pub const DEFAULT_EPSILON: f32 = 0.05;

/// Softmax temperature used by SwAV for the predicted side of the loss.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// `exp(logits / epsilon)`, transposed from `B × K` to the `K × B` layout
/// the normalizer expects.
///
/// No max-subtraction is applied: large `logits / epsilon` overflow to
/// infinity, which [`Sinkhorn`] then reports as a degenerate total.
pub fn exp_scores(logits: ArrayView2<'_, f32>, epsilon: f32) -> Result<Array2<f32>> {
    positive("epsilon", epsilon)?;
    Ok(logits.mapv(|x| (x / epsilon).exp()).reversed_axes())
}

impl Sinkhorn {
    /// Soft targets for a batch of prototype logits (`B × K` in, `B × K` out).
    pub fn assign(&self, logits: ArrayView2<'_, f32>, epsilon: f32) -> Result<Array2<f32>> {
        self.normalize(exp_scores(logits, epsilon)?)
    }

    /// Normalize one score matrix per prototype head.
    ///
    /// Heads may have different prototype counts; the workspace re-allocates
    /// its marginals only when the shape changes from one head to the next.
    pub fn normalize_heads(
        &self,
        heads: Vec<Array2<f32>>,
        ws: &mut Workspace,
    ) -> Result<Vec<Array2<f32>>> {
        heads
            .into_iter()
            .map(|q| self.normalize_in(q, ws))
            .collect()
    }
}

/// Index of the highest-scoring prototype for every sample of a `B × K`
/// assignment. Ties go to the lower index.
///
/// An assignment with no prototype columns returns
/// [`SinkhornError::EmptyMatrix`]; an empty batch yields an empty vector.
pub fn hard_assignments(assignment: ArrayView2<'_, f32>) -> Result<Vec<usize>> {
    let (b, k) = assignment.dim();
    if k == 0 {
        return Err(SinkhornError::EmptyMatrix { rows: b, cols: k });
    }
    Ok(assignment.rows().into_iter().map(argmax).collect())
}

/// Number of samples whose hard assignment lands on each prototype.
pub fn occupancy(assignment: ArrayView2<'_, f32>) -> Result<Vec<usize>> {
    let mut counts = vec![0; assignment.ncols()];
    for k in hard_assignments(assignment)? {
        counts[k] += 1;
    }
    Ok(counts)
}

/// True when a single prototype holds every assigned sample.
pub fn is_collapsed(occupancy: &[usize]) -> bool {
    occupancy.iter().filter(|&&n| n > 0).count() == 1
}

/// Swapped-prediction cross-entropy.
///
/// `-mean_b Σ_k targets[b,k] · log_softmax(logits[b,:] / temperature)[k]`
///
/// `targets` and `logits` are both `B × K`. The log-softmax subtracts the
/// row maximum before exponentiating.
pub fn swapped_prediction_loss(
    targets: ArrayView2<'_, f32>,
    logits: ArrayView2<'_, f32>,
    temperature: f32,
) -> Result<f32> {
    if targets.dim() != logits.dim() {
        let (tr, tc) = targets.dim();
        let (lr, lc) = logits.dim();
        return Err(SinkhornError::ShapeMismatch {
            expected: [tr, tc],
            actual: [lr, lc],
        });
    }
    let (b, k) = logits.dim();
    if b == 0 || k == 0 {
        return Err(SinkhornError::EmptyMatrix { rows: b, cols: k });
    }
    positive("temperature", temperature)?;

    let scaled = logits.mapv(|x| x / temperature);
    let row_max = scaled.map_axis(Axis(1), |row| {
        row.fold(f32::NEG_INFINITY, |m, &v| m.max(v))
    });
    let shifted = scaled - &row_max.insert_axis(Axis(1));
    let log_norm = shifted.mapv(f32::exp).sum_axis(Axis(1)).mapv(f32::ln);
    let log_probs = shifted - &log_norm.insert_axis(Axis(1));

    let per_sample = (&targets * &log_probs).sum_axis(Axis(1));
    Ok(-per_sample.sum() / b as f32)
}

fn argmax(row: ArrayView1<'_, f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

fn positive(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SinkhornError::InvalidParameter { name, value })
    }
}
