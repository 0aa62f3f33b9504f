//! Numerically stable primitives for probability math.

/// Clipping margin applied before taking logarithms of probabilities.
pub const PROBABILITY_EPSILON: f64 = 1e-15;

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = max_of(values);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Row softmax using the max-subtraction trick.
///
/// Empty input yields empty output.
pub fn softmax(row: &[f64]) -> Vec<f64> {
    softmax_with_temperature(row, 1.0)
}

/// Row softmax of `row / temperature`.
///
/// Precondition: `temperature > 0`. A non-positive temperature is not checked
/// here and produces degenerate (NaN or inverted) output; validated entry
/// points live in `sc_core::calibrate`.
pub fn softmax_with_temperature(row: &[f64], temperature: f64) -> Vec<f64> {
    if row.is_empty() {
        return Vec::new();
    }
    let scaled: Vec<f64> = row.iter().map(|s| s / temperature).collect();
    let max = max_of(&scaled);
    let exps: Vec<f64> = scaled.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Clamp a probability into `[eps, 1 - eps]`.
pub fn clip_probability(p: f64, eps: f64) -> f64 {
    p.clamp(eps, 1.0 - eps)
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}
