//! Temperature scaling.
//!
//! Divides raw candidate scores by a scalar temperature before the softmax.
//! `T > 1` softens the distribution, `T < 1` sharpens it, and the ranking of
//! candidates never changes. The temperature is picked by a bounded grid
//! search over negative log-likelihood.

use serde::{Deserialize, Serialize};
use sc_math::{clip_probability, linspace, ScoreMatrix, PROBABILITY_EPSILON};
use tracing::debug;

use super::{CalibrationError, CalibrationFit};

/// Temperature evaluated as the untouched baseline.
pub const BASELINE_TEMPERATURE: f64 = 1.0;

/// Grid of candidate temperatures, inclusive of both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureSearch {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl Default for TemperatureSearch {
    fn default() -> Self {
        Self {
            min: 0.1,
            max: 5.0,
            steps: 100,
        }
    }
}

impl TemperatureSearch {
    /// Build a validated search grid.
    pub fn new(min: f64, max: f64, steps: usize) -> Result<Self, CalibrationError> {
        let search = Self { min, max, steps };
        search.validate()?;
        Ok(search)
    }

    /// Bounds must be finite with `0 < min <= max`.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min <= 0.0 || self.max < self.min
        {
            return Err(CalibrationError::InvalidSearchRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Candidate temperatures in ascending order.
    pub fn grid(&self) -> Vec<f64> {
        linspace(self.min, self.max, self.steps)
    }
}

fn check_temperature(temperature: f64) -> Result<(), CalibrationError> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(())
    } else {
        Err(CalibrationError::InvalidTemperature(temperature))
    }
}

/// Row-wise softmax of `scores / temperature`.
///
/// Accepts any number of rows; wrap a single vector with
/// [`ScoreMatrix::from_row`]. Every output row sums to 1 within floating
/// tolerance, and `temperature == 1.0` reproduces the plain softmax.
///
/// # Errors
///
/// [`CalibrationError::InvalidTemperature`] when `temperature` is not a
/// positive finite number.
pub fn softmax_with_temperature(
    scores: &ScoreMatrix,
    temperature: f64,
) -> Result<ScoreMatrix, CalibrationError> {
    check_temperature(temperature)?;
    Ok(scores.softmax_with_temperature(temperature))
}

/// Same as [`softmax_with_temperature`]; the name used at the scoring call sites.
pub fn apply_temperature_scaling(
    scores: &ScoreMatrix,
    temperature: f64,
) -> Result<ScoreMatrix, CalibrationError> {
    softmax_with_temperature(scores, temperature)
}

/// Mean negative log-likelihood of true-class probabilities.
///
/// Each input is already the probability assigned to the correct outcome, so
/// the implied label is 1 for every sample. Inputs are clipped to
/// `[1e-15, 1 - 1e-15]` before the logarithm, which keeps the result finite
/// and strictly positive. An empty slice yields 0.0.
pub fn negative_log_likelihood(correct_class_probs: &[f64]) -> f64 {
    if correct_class_probs.is_empty() {
        return 0.0;
    }
    let total: f64 = correct_class_probs
        .iter()
        .map(|&p| -clip_probability(p, PROBABILITY_EPSILON).ln())
        .sum();
    total / correct_class_probs.len() as f64
}

/// Gather `probs[i][true_indices[i]]` for every sample.
pub fn correct_class_probabilities(
    probs: &ScoreMatrix,
    true_indices: &[usize],
) -> Result<Vec<f64>, CalibrationError> {
    if true_indices.len() != probs.n_rows() {
        return Err(CalibrationError::LengthMismatch {
            expected: probs.n_rows(),
            actual: true_indices.len(),
        });
    }
    true_indices
        .iter()
        .enumerate()
        .map(|(sample, &index)| {
            probs
                .get(sample, index)
                .ok_or(CalibrationError::IndexOutOfRange {
                    sample,
                    index,
                    n_candidates: probs.n_cols(),
                })
        })
        .collect()
}

/// Per-sample top-class confidence and whether the top class is the true one.
///
/// Ties resolve to the lowest column index. The pair feeds
/// [`expected_calibration_error`](super::expected_calibration_error).
pub fn top_class_confidence(
    probs: &ScoreMatrix,
    true_indices: &[usize],
) -> Result<(Vec<f64>, Vec<u8>), CalibrationError> {
    if true_indices.len() != probs.n_rows() {
        return Err(CalibrationError::LengthMismatch {
            expected: probs.n_rows(),
            actual: true_indices.len(),
        });
    }
    let mut confidence = Vec::with_capacity(probs.n_rows());
    let mut correct = Vec::with_capacity(probs.n_rows());
    for (row, &truth) in probs.rows().zip(true_indices) {
        let (top, p) = row
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });
        confidence.push(p);
        correct.push(u8::from(top == truth));
    }
    Ok((confidence, correct))
}

fn nll_at(
    scores: &ScoreMatrix,
    true_indices: &[usize],
    temperature: f64,
) -> Result<f64, CalibrationError> {
    let probs = scores.softmax_with_temperature(temperature);
    let correct = correct_class_probabilities(&probs, true_indices)?;
    Ok(negative_log_likelihood(&correct))
}

/// Grid-search the temperature minimizing NLL.
///
/// The baseline `T = 1.0` seeds the search and is always reported as
/// `nll_before`. Grid points are visited in ascending order and replace the
/// current best only on strict improvement, so among equal losses the
/// smallest temperature wins and the baseline survives any tie.
///
/// # Errors
///
/// Rejects an empty matrix, a true-index vector whose length differs from the
/// row count, an index outside its row, and an invalid search range.
pub fn fit_temperature(
    scores: &ScoreMatrix,
    true_indices: &[usize],
    search: &TemperatureSearch,
) -> Result<CalibrationFit, CalibrationError> {
    if scores.is_empty() {
        return Err(CalibrationError::NoData);
    }
    search.validate()?;

    let nll_before = nll_at(scores, true_indices, BASELINE_TEMPERATURE)?;
    let mut best_temperature = BASELINE_TEMPERATURE;
    let mut best_nll = nll_before;

    let grid = search.grid();
    for &temperature in &grid {
        let nll = nll_at(scores, true_indices, temperature)?;
        if nll < best_nll {
            best_nll = nll;
            best_temperature = temperature;
        }
    }

    debug!(
        target: "sc_core::calibrate",
        samples = scores.n_rows(),
        candidates = scores.n_cols(),
        grid_points = grid.len(),
        temperature = best_temperature,
        nll_before,
        nll_after = best_nll,
        "temperature search finished"
    );

    Ok(CalibrationFit {
        temperature: best_temperature,
        nll_before,
        nll_after: best_nll,
        improvement: nll_before - best_nll,
    })
}
