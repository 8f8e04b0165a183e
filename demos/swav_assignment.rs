//! # SwAV assignment walkthrough
//!
//! Builds a batch whose raw prototype scores all favour one prototype,
//! then shows how the Sinkhorn targets spread the batch across every
//! prototype, and what the swapped-prediction loss looks like between two
//! views of the same samples.
//!
//! Run with: `cargo run --example swav_assignment`

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swav_sinkhorn::assignment::{
    exp_scores, is_collapsed, occupancy, swapped_prediction_loss, DEFAULT_EPSILON,
    DEFAULT_TEMPERATURE,
};
use swav_sinkhorn::{Sinkhorn, Workspace};

const BATCH: usize = 64;
const PROTOTYPES: usize = 8;

/// Cosine-like logits in [-1, 1] with a bias toward prototype 0.
fn biased_logits(rng: &mut StdRng) -> Array2<f32> {
    Array2::from_shape_fn((BATCH, PROTOTYPES), |(_, k)| {
        let bias = if k == 0 { 0.3 } else { 0.0 };
        (rng.gen_range(-0.6_f32..0.6) + bias).clamp(-1.0, 1.0)
    })
}

fn main() {
    let mut rng = StdRng::seed_from_u64(2020);
    let view_a = biased_logits(&mut rng);
    let view_b = biased_logits(&mut rng);

    println!("── Raw prototype scores ──────────────────────────────────────");
    let raw_occ = occupancy(view_a.view()).expect("logits have prototype columns");
    println!("  occupancy by argmax : {:?}", raw_occ);
    println!("  collapsed           : {}", is_collapsed(&raw_occ));

    let sk = Sinkhorn::default();
    let mut ws = Workspace::new();

    println!();
    println!("── Sinkhorn targets (nmb_iters = {}) ─────────────────────────", sk.config().nmb_iters);
    let q = exp_scores(view_a.view(), DEFAULT_EPSILON).expect("epsilon is positive");
    let (targets_a, report) = sk
        .normalize_with_report(q)
        .expect("exp scores are finite for logits in [-1, 1]");
    println!(
        "  occupancy by argmax : {:?}",
        occupancy(targets_a.view()).expect("targets have prototype columns")
    );
    println!("  row residual        : {:.3e}", report.row_residual);
    println!("  column residual     : {:.3e}", report.col_residual);

    println!();
    println!("── Residual vs rounds ─────────────────────────────────────────");
    for n in [0, 1, 3, 10, 30] {
        let q = exp_scores(view_a.view(), DEFAULT_EPSILON).expect("epsilon is positive");
        let (_, r) = Sinkhorn::with_iterations(n)
            .normalize_with_report(q)
            .expect("valid scores");
        println!("  {:>3} rounds : {:.3e}", n, r.row_residual);
    }

    println!();
    println!("── Swapped prediction ─────────────────────────────────────────");
    let q_b = exp_scores(view_b.view(), DEFAULT_EPSILON).expect("epsilon is positive");
    let targets_b = sk.normalize_in(q_b, &mut ws).expect("valid scores");
    let loss = 0.5
        * (swapped_prediction_loss(targets_a.view(), view_b.view(), DEFAULT_TEMPERATURE)
            .expect("matching shapes")
            + swapped_prediction_loss(targets_b.view(), view_a.view(), DEFAULT_TEMPERATURE)
                .expect("matching shapes"));
    println!("  loss                : {:.4}", loss);
    println!("  uniform baseline    : {:.4}", (PROTOTYPES as f32).ln());
}
