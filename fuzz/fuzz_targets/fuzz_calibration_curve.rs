//! Fuzz target for ECE binning.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sc_core::calibrate::CalibrationCurve;

#[derive(Debug, Arbitrary)]
struct Input {
    samples: Vec<(f64, bool)>,
    bins: u8,
}

fuzz_target!(|input: Input| {
    let (probs, labels): (Vec<f64>, Vec<u8>) = input
        .samples
        .iter()
        .map(|&(p, y)| (p, u8::from(y)))
        .unzip();
    let Ok(curve) = CalibrationCurve::from_probabilities(&probs, &labels, usize::from(input.bins))
    else {
        return;
    };
    assert_eq!(curve.bins.len(), usize::from(input.bins));
    assert!(curve.binned_count() <= probs.len());
});
