//! Equipartition of prototype scores via Sinkhorn-Knopp iteration.
//!
//! Given a non-negative `K × B` matrix of scores (K prototypes, B samples),
//! alternately rescales rows toward the prototype marginal `r` and columns
//! toward the sample marginal `c`, then renormalises every column to sum to
//! one and returns the transpose: a `B × K` soft assignment whose rows are
//! distributions over prototypes.
//!
//! Balancing toward uniform `r` gives every prototype an equal share of the
//! batch, which keeps a clustering head from collapsing onto one prototype.
//!
//! The round count is fixed. There is no tolerance check and no early exit,
//! so every call costs exactly `nmb_iters` rounds of bulk array operations.
//!
//! # Invariants
//! - Output shape is the transpose of the input shape.
//! - Every output row sums to 1 within float rounding, for any round count.
//! - Uniform input is a fixed point of the balancing loop.
//! - [`DegeneracyPolicy::Reject`] and [`DegeneracyPolicy::Propagate`] give
//!   bit-identical output whenever no divisor degenerates.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{self, Result, SinkhornError};
use crate::marginals::Marginals;
use crate::workspace::Workspace;

/// Round count used by SwAV's training recipe.
pub const DEFAULT_ITERATIONS: usize = 3;

/// What to do when a row or column sum used as a divisor reaches zero,
/// turns negative, or stops being finite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DegeneracyPolicy {
    /// Divide anyway. NaN or infinity flows into the output exactly as the
    /// unguarded reference computation would produce it.
    Propagate,
    /// Stop and return [`SinkhornError::DegenerateSum`] or
    /// [`SinkhornError::NonPositiveTotal`].
    #[default]
    Reject,
}

/// Normalizer configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SinkhornConfig {
    /// Balancing rounds to run (default: 3). Zero is valid.
    pub nmb_iters: usize,
    /// Divisor guard (default: [`DegeneracyPolicy::Reject`]).
    pub policy: DegeneracyPolicy,
    /// Scan the input for negative or NaN scores before balancing (default: off).
    pub check_non_negative: bool,
}

impl Default for SinkhornConfig {
    fn default() -> Self {
        Self {
            nmb_iters: DEFAULT_ITERATIONS,
            policy: DegeneracyPolicy::Reject,
            check_non_negative: false,
        }
    }
}

impl SinkhornConfig {
    /// Set the round count.
    pub fn with_iterations(mut self, nmb_iters: usize) -> Self {
        self.nmb_iters = nmb_iters;
        self
    }

    /// Set the divisor guard.
    pub fn with_policy(mut self, policy: DegeneracyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable the non-negativity scan.
    pub fn with_non_negative_check(mut self, enabled: bool) -> Self {
        self.check_non_negative = enabled;
        self
    }
}

/// How far the balanced matrix is from its marginals, measured after the
/// last round and before the final column renormalisation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceReport {
    /// Rounds performed (always the configured count).
    pub iterations: usize,
    /// max_i |row_sum(i) - r[i]|.
    pub row_residual: f32,
    /// max_j |col_sum(j) - c[j]|.
    pub col_residual: f32,
}

/// Sinkhorn-Knopp normalizer with a fixed round count.
#[derive(Clone, Debug, Default)]
pub struct Sinkhorn {
    config: SinkhornConfig,
}

impl Sinkhorn {
    /// Create a normalizer from a configuration.
    pub fn new(config: SinkhornConfig) -> Self {
        Self { config }
    }

    /// Default configuration with a custom round count.
    pub fn with_iterations(nmb_iters: usize) -> Self {
        Self::new(SinkhornConfig::default().with_iterations(nmb_iters))
    }

    /// Active configuration.
    pub fn config(&self) -> &SinkhornConfig {
        &self.config
    }

    /// Balance a `K × B` score matrix toward uniform marginals and return the
    /// `B × K` assignment.
    ///
    /// The matrix is consumed and rescaled in place.
    ///
    /// ```
    /// use ndarray::array;
    /// use swav_sinkhorn::sinkhorn::Sinkhorn;
    ///
    /// let q = array![[1.0_f32, 2.0], [3.0, 4.0]];
    /// let out = Sinkhorn::with_iterations(0).normalize(q).unwrap();
    /// assert!((out[[0, 1]] - 0.75).abs() < 1e-6);
    /// ```
    pub fn normalize(&self, q: Array2<f32>) -> Result<Array2<f32>> {
        let mut ws = Workspace::new();
        self.normalize_in(q, &mut ws)
    }

    /// Same as [`Sinkhorn::normalize`] but leaves the caller's matrix untouched.
    pub fn normalize_view(&self, q: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.normalize(q.to_owned())
    }

    /// Balance using the marginal buffers held by `ws`.
    pub fn normalize_in(&self, q: Array2<f32>, ws: &mut Workspace) -> Result<Array2<f32>> {
        let (k, b) = non_empty_dim(&q)?;
        let marginals = ws.prepare(k, b);
        self.balance(q, marginals).map(|(out, _)| out)
    }

    /// Balance toward explicit marginals.
    pub fn normalize_with_marginals(
        &self,
        q: Array2<f32>,
        marginals: &Marginals,
    ) -> Result<Array2<f32>> {
        self.balance(q, marginals).map(|(out, _)| out)
    }

    /// Balance toward uniform marginals and also report the residuals.
    pub fn normalize_with_report(
        &self,
        q: Array2<f32>,
    ) -> Result<(Array2<f32>, ConvergenceReport)> {
        let (k, b) = non_empty_dim(&q)?;
        self.balance(q, &Marginals::uniform(k, b))
    }

    fn balance(
        &self,
        mut q: Array2<f32>,
        marginals: &Marginals,
    ) -> Result<(Array2<f32>, ConvergenceReport)> {
        let (k, b) = non_empty_dim(&q)?;
        marginals.validate(k, b)?;
        if self.config.check_non_negative {
            check_non_negative(&q)?;
        }

        let iters = self.config.nmb_iters;
        let strict = self.config.policy == DegeneracyPolicy::Reject;
        let span = tracing::debug_span!("sinkhorn", k, b, iters);
        let _enter = span.enter();

        let total = q.sum();
        if strict && !(total.is_finite() && total > 0.0) {
            return Err(SinkhornError::NonPositiveTotal(total));
        }
        q /= total;

        let r = marginals.rows();
        let c = marginals.cols();
        let mut curr_sum = q.sum_axis(Axis(1));

        for it in 0..iters {
            let u = curr_sum;
            if strict {
                check_divisors(&u, error::Axis::Row, it)?;
            }
            q *= &(r / &u).insert_axis(Axis(1));

            let col_sum = q.sum_axis(Axis(0));
            if strict {
                check_divisors(&col_sum, error::Axis::Column, it)?;
            }
            q *= &(c / &col_sum).insert_axis(Axis(0));

            curr_sum = q.sum_axis(Axis(1));
        }

        let col_sum = q.sum_axis(Axis(0));
        let report = ConvergenceReport {
            iterations: iters,
            row_residual: max_deviation(&curr_sum, r),
            col_residual: max_deviation(&col_sum, c),
        };
        if strict {
            check_divisors(&col_sum, error::Axis::Column, iters)?;
        }
        q /= &col_sum.insert_axis(Axis(0));

        let out = q.reversed_axes();
        if !strict && out.iter().any(|v| !v.is_finite()) {
            tracing::warn!(k, b, "assignment contains non-finite values");
        }
        tracing::debug!(
            row_residual = report.row_residual,
            col_residual = report.col_residual,
            "balanced score matrix"
        );
        Ok((out, report))
    }
}

fn non_empty_dim(q: &Array2<f32>) -> Result<(usize, usize)> {
    match q.dim() {
        (k, b) if k == 0 || b == 0 => Err(SinkhornError::EmptyMatrix { rows: k, cols: b }),
        dim => Ok(dim),
    }
}

fn check_non_negative(q: &Array2<f32>) -> Result<()> {
    match q.indexed_iter().find(|&(_, &v)| v.is_nan() || v < 0.0) {
        Some(((row, col), &value)) => Err(SinkhornError::NegativeEntry { row, col, value }),
        None => Ok(()),
    }
}

fn check_divisors(sums: &Array1<f32>, axis: error::Axis, iteration: usize) -> Result<()> {
    match sums.iter().position(|&s| !(s.is_finite() && s > 0.0)) {
        Some(index) => Err(SinkhornError::DegenerateSum {
            axis,
            index,
            iteration,
            value: sums[index],
        }),
        None => Ok(()),
    }
}

fn max_deviation(sums: &Array1<f32>, target: &Array1<f32>) -> f32 {
    sums.iter()
        .zip(target.iter())
        .map(|(s, t)| (s - t).abs())
        .fold(0.0_f32, f32::max)
}
