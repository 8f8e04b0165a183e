//! # swav-sinkhorn
//!
//! Sinkhorn-Knopp equipartition for SwAV-style clustering heads.
//!
//! ---
//!
//! ## Why balance the assignments at all
//!
//! A self-supervised clustering head scores every sample in a batch against a
//! set of learned prototypes. Left alone, the cheapest solution is to send
//! every sample to the same prototype, and the representation collapses.
//!
//! SwAV avoids this by turning the scores into *balanced* soft assignments
//! before using them as training targets: across the batch, every prototype
//! must receive the same total mass. The balancing is a few rounds of
//! Sinkhorn-Knopp row/column rescaling, run with a fixed round count so the
//! cost per training step is constant.
//!
//! ## The pipeline
//!
//! ```text
//! prototype logits (B × K)
//!        │  exp(· / epsilon), transpose      assignment::exp_scores
//!        ▼
//! scores Q (K × B) ──► Sinkhorn ──► targets (B × K)
//!                         ↑                │
//!                 Marginals, Workspace     ▼
//!                          swapped_prediction_loss(targets, other-view logits)
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`sinkhorn`] | [`Sinkhorn`], [`SinkhornConfig`] | Fixed-round balancing of a `K × B` score matrix |
//! | [`marginals`] | [`Marginals`] | Row and column target sums (uniform by default) |
//! | [`workspace`] | [`Workspace`] | Caller-owned buffers reused across calls |
//! | [`assignment`] | [`assignment::exp_scores`] | Score sharpening, hard assignments, swapped-prediction loss |
//! | [`error`] | [`SinkhornError`] | Error type and `Result` alias |
//! | [`snapshot`] | [`snapshot::AssignmentSnapshot`] | Serialisable assignment record (requires `serde` feature) |
//!
//! ## Quick start
//!
//! ```
//! use ndarray::array;
//! use swav_sinkhorn::Sinkhorn;
//!
//! // 2 prototypes × 3 samples
//! let q = array![[4.0_f32, 1.0, 1.0], [1.0, 1.0, 2.0]];
//! let targets = Sinkhorn::with_iterations(3).normalize(q).unwrap();
//! assert_eq!(targets.dim(), (3, 2));
//! ```
//!
//! ## Features
//!
//! - `serde`: serialisation for configs, reports and [`snapshot`].
//! - `python-ffi`: PyO3 bindings (`ffi` module).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod marginals;
pub mod workspace;
pub mod sinkhorn;
pub mod assignment;
#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use error::{Result, SinkhornError};
pub use marginals::Marginals;
pub use sinkhorn::{ConvergenceReport, DegeneracyPolicy, Sinkhorn, SinkhornConfig};
pub use workspace::Workspace;
