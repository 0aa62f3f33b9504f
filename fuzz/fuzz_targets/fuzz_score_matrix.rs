//! Fuzz target for score matrix construction and temperature fitting.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sc_core::calibrate::{fit_temperature, TemperatureSearch};
use sc_math::ScoreMatrix;

#[derive(Debug, Arbitrary)]
struct Input {
    rows: Vec<Vec<f64>>,
    true_indices: Vec<usize>,
    min: f64,
    max: f64,
    steps: u8,
}

fuzz_target!(|input: Input| {
    let Ok(scores) = ScoreMatrix::from_rows(input.rows) else {
        return;
    };
    let search = TemperatureSearch {
        min: input.min,
        max: input.max,
        steps: usize::from(input.steps),
    };
    let _ = fit_temperature(&scores, &input.true_indices, &search);
});
