//! Python FFI bindings via PyO3.
//!
//! Exposes the normalizer to Python training code. Matrices cross the
//! boundary as lists of rows.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from swav_sinkhorn import Sinkhorn, sinkhorn
//!
//! # K = 2 prototypes, B = 2 samples
//! q = [[1.0, 2.0], [3.0, 4.0]]
//! print(sinkhorn(q, nmb_iters=0))   # [[0.25, 0.75], [0.333.., 0.666..]]
//!
//! sk = Sinkhorn(nmb_iters=3)
//! targets = sk.assign(prototype_logits, epsilon=0.05)   # B x K rows
//! ```

use ndarray::Array2;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::assignment::DEFAULT_EPSILON;
use crate::error::{iterations_from_signed, SinkhornError};
use crate::sinkhorn::{
    DegeneracyPolicy, Sinkhorn as RustSinkhorn, SinkhornConfig, DEFAULT_ITERATIONS,
};
use crate::workspace::Workspace;

fn to_py_err(e: SinkhornError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn rows_to_array(rows: Vec<Vec<f32>>) -> PyResult<Array2<f32>> {
    let k = rows.len();
    let b = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().position(|r| r.len() != b) {
        return Err(PyValueError::new_err(format!(
            "row {bad} has {} entries, expected {b}",
            rows[bad].len()
        )));
    }
    Array2::from_shape_vec((k, b), rows.into_iter().flatten().collect())
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

fn array_to_rows(a: Array2<f32>) -> Vec<Vec<f32>> {
    a.rows().into_iter().map(|r| r.to_vec()).collect()
}

fn build(nmb_iters: i64, strict: bool, check_non_negative: bool) -> PyResult<RustSinkhorn> {
    let nmb_iters = iterations_from_signed(nmb_iters).map_err(to_py_err)?;
    let policy = if strict {
        DegeneracyPolicy::Reject
    } else {
        DegeneracyPolicy::Propagate
    };
    Ok(RustSinkhorn::new(
        SinkhornConfig::default()
            .with_iterations(nmb_iters)
            .with_policy(policy)
            .with_non_negative_check(check_non_negative),
    ))
}

/// Balance a K x B score matrix and return the B x K assignment.
///
/// Args:
///     q:         list of K rows, each with B non-negative scores
///     nmb_iters: balancing rounds (default 3, must be >= 0)
///     strict:    raise ValueError on a degenerate row/column sum instead
///                of returning NaN (default True)
#[pyfunction]
#[pyo3(signature = (q, nmb_iters=3, strict=true))]
pub fn sinkhorn(q: Vec<Vec<f32>>, nmb_iters: i64, strict: bool) -> PyResult<Vec<Vec<f32>>> {
    let normalizer = build(nmb_iters, strict, false)?;
    let out = normalizer
        .normalize(rows_to_array(q)?)
        .map_err(to_py_err)?;
    Ok(array_to_rows(out))
}

/// Reusable normalizer. Keeps its marginal buffers between calls.
#[pyclass(name = "Sinkhorn")]
pub struct PySinkhorn {
    inner: RustSinkhorn,
    workspace: Workspace,
}

#[pymethods]
impl PySinkhorn {
    /// Create a normalizer.
    ///
    /// Args:
    ///     nmb_iters:          balancing rounds (default 3)
    ///     strict:             raise on degenerate sums (default True)
    ///     check_non_negative: reject negative or NaN scores up front (default False)
    #[new]
    #[pyo3(signature = (nmb_iters=3, strict=true, check_non_negative=false))]
    pub fn new(nmb_iters: i64, strict: bool, check_non_negative: bool) -> PyResult<Self> {
        Ok(Self {
            inner: build(nmb_iters, strict, check_non_negative)?,
            workspace: Workspace::new(),
        })
    }

    /// Balance a K x B score matrix; returns B x K rows.
    pub fn normalize(&mut self, q: Vec<Vec<f32>>) -> PyResult<Vec<Vec<f32>>> {
        let out = self
            .inner
            .normalize_in(rows_to_array(q)?, &mut self.workspace)
            .map_err(to_py_err)?;
        Ok(array_to_rows(out))
    }

    /// Soft targets from B x K prototype logits: exp(logits / epsilon), balanced.
    #[pyo3(signature = (logits, epsilon=DEFAULT_EPSILON))]
    pub fn assign(&self, logits: Vec<Vec<f32>>, epsilon: f32) -> PyResult<Vec<Vec<f32>>> {
        let logits = rows_to_array(logits)?;
        let out = self
            .inner
            .assign(logits.view(), epsilon)
            .map_err(to_py_err)?;
        Ok(array_to_rows(out))
    }

    /// Configured round count.
    #[getter]
    pub fn nmb_iters(&self) -> usize {
        self.inner.config().nmb_iters
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        let c = self.inner.config();
        format!(
            "Sinkhorn(nmb_iters={}, strict={}, check_non_negative={})",
            c.nmb_iters,
            c.policy == DegeneracyPolicy::Reject,
            c.check_non_negative,
        )
    }
}

/// SwAV Sinkhorn-Knopp normalizer.
#[pymodule]
pub fn swav_sinkhorn(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(sinkhorn, m)?)?;
    m.add_class::<PySinkhorn>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("DEFAULT_ITERATIONS", DEFAULT_ITERATIONS)?;
    Ok(())
}

