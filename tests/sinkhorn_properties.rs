//! Behavioural properties of the normalizer on randomised inputs.
//!
//! Random matrices are drawn from a seeded `StdRng` so failures reproduce;
//! the shape and row-sum properties are additionally fuzzed with proptest.

use ndarray::Array2;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swav_sinkhorn::{DegeneracyPolicy, Sinkhorn, SinkhornConfig, Workspace};

// ─── helpers ─────────────────────────────────────────────────────────────────

/// Exponentiated scores in roughly [e^-2, e^2], like a sharpened prototype layer.
fn random_scores(k: usize, b: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((k, b), |_| rng.gen_range(-2.0_f32..2.0).exp())
}

fn max_row_error(m: &Array2<f32>) -> f32 {
    m.rows()
        .into_iter()
        .map(|row| (row.sum() - 1.0).abs())
        .fold(0.0_f32, f32::max)
}

fn scores_strategy() -> impl Strategy<Value = (Array2<f32>, usize)> {
    (1usize..8, 1usize..16, 0usize..10).prop_flat_map(|(k, b, iters)| {
        (prop::collection::vec(0.01_f32..10.0, k * b), Just(k), Just(b), Just(iters))
            .prop_map(|(data, k, b, iters)| {
                let q = Array2::from_shape_vec((k, b), data).expect("k * b entries");
                (q, iters)
            })
    })
}

// ─── properties ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn output_is_transpose_shaped((q, iters) in scores_strategy()) {
        let (k, b) = q.dim();
        let out = Sinkhorn::with_iterations(iters).normalize(q).unwrap();
        prop_assert_eq!(out.dim(), (b, k));
    }

    #[test]
    fn every_sample_row_sums_to_one((q, iters) in scores_strategy()) {
        let out = Sinkhorn::with_iterations(iters).normalize(q).unwrap();
        prop_assert!(max_row_error(&out) < 1e-5);
    }

    #[test]
    fn entries_stay_in_unit_interval((q, iters) in scores_strategy()) {
        let out = Sinkhorn::with_iterations(iters).normalize(q).unwrap();
        prop_assert!(out.iter().all(|&v| (0.0..=1.0 + 1e-6).contains(&v)));
    }
}

#[test]
fn row_residual_shrinks_with_more_rounds() {
    let q = random_scores(8, 32, 7);
    let residual = |n: usize| {
        let (_, report) = Sinkhorn::with_iterations(n)
            .normalize_with_report(q.clone())
            .unwrap();
        report.row_residual
    };

    // the first round may overshoot the raw input; from there on the
    // row error only shrinks
    let residuals: Vec<f32> = (1..=64).map(&residual).collect();
    for (n, w) in (2..).zip(residuals.windows(2)) {
        assert!(
            w[1] <= w[0] + 1e-6,
            "residual grew at {} rounds: {:?}",
            n,
            residuals
        );
    }

    let unbalanced = residual(0);
    assert!(unbalanced > 1e-3, "random input already balanced: {}", unbalanced);
    assert!(residuals[63] < 1e-4, "did not converge: {:?}", residuals);
}

#[test]
fn identical_inputs_give_bit_identical_output() {
    let sk = Sinkhorn::with_iterations(5);
    let a = sk.normalize(random_scores(6, 20, 11)).unwrap();
    let b = sk.normalize(random_scores(6, 20, 11)).unwrap();
    assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn guard_policy_does_not_change_valid_output() {
    let q = random_scores(5, 12, 3);
    let strict = Sinkhorn::new(SinkhornConfig::default().with_policy(DegeneracyPolicy::Reject));
    let loose = Sinkhorn::new(SinkhornConfig::default().with_policy(DegeneracyPolicy::Propagate));
    let a = strict.normalize(q.clone()).unwrap();
    let b = loose.normalize(q).unwrap();
    assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn workspace_reuse_matches_fresh_calls() {
    let sk = Sinkhorn::default();
    let mut ws = Workspace::new();
    for seed in 0..4 {
        let q = random_scores(4, 16, seed);
        let reused = sk.normalize_in(q.clone(), &mut ws).unwrap();
        let fresh = sk.normalize(q).unwrap();
        assert_eq!(reused, fresh);
    }
    assert_eq!(ws.allocations(), 1);
}

#[test]
fn single_prototype_gets_every_sample() {
    let q = random_scores(1, 9, 5);
    let out = Sinkhorn::default().normalize(q).unwrap();
    assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-6));
}
