//! Fuzz target for the dual Youden search and AUC.
//!
//! Arbitrary probabilities (including NaN and infinities) and labels must
//! produce either a validation error or a result, never a panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sc_core::threshold::{compute_auc, compute_roc_curve, optimize_thresholds};

#[derive(Debug, Arbitrary)]
struct Input {
    p_mis: Vec<f64>,
    labels: Vec<i32>,
}

fuzz_target!(|input: Input| {
    if optimize_thresholds(&input.p_mis, &input.labels).is_ok() {
        let curve = compute_roc_curve(&input.p_mis, &input.labels);
        assert_eq!(curve.fpr.len(), curve.thresholds.len());

        let auc = compute_auc(&input.p_mis, &input.labels);
        assert!((0.0..=1.0).contains(&auc) || auc.is_nan());
    }
});
