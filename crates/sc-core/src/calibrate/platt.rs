//! Platt scaling.
//!
//! Fits `P(correct | s) = σ(a·s + b)` by minimizing the binary
//! cross-entropy, evaluated in log space so saturated sigmoids stay finite. The optimizer is pluggable: any [`ScalarLossMinimizer`]
//! works, and [`PlattSettings::minimizer`] builds the stock Nelder–Mead.

use serde::{Deserialize, Serialize};
use sc_math::{log_sum_exp, NelderMead, ScalarLossMinimizer};
use tracing::debug;

use super::CalibrationError;

/// Fitted sigmoid coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattFit {
    pub a: f64,
    pub b: f64,
    /// Cross-entropy at `(a, b)`.
    pub loss: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl PlattFit {
    /// Calibrated probability for a raw score.
    pub fn apply(&self, score: f64) -> f64 {
        sigmoid(self.a * score + self.b)
    }
}

/// Tunables for the stock minimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlattSettings {
    /// Iteration cap; `None` uses the minimizer's own default.
    pub max_iterations: Option<usize>,
    pub tolerance: f64,
}

impl Default for PlattSettings {
    fn default() -> Self {
        Self {
            max_iterations: None,
            tolerance: 1e-4,
        }
    }
}

impl PlattSettings {
    pub fn minimizer(&self) -> NelderMead {
        NelderMead {
            max_iterations: self.max_iterations,
            x_tolerance: self.tolerance,
            f_tolerance: self.tolerance,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Mean binary cross-entropy of `σ(a·s + b)` against `labels`.
///
/// Uses `-ln σ(z) = ln(1 + e^-z)` and `-ln(1 - σ(z)) = ln(1 + e^z)`.
pub fn platt_loss(a: f64, b: f64, scores: &[f64], labels: &[f64]) -> f64 {
    let n = scores.len().max(1) as f64;
    scores
        .iter()
        .zip(labels)
        .map(|(&s, &y)| {
            let z = a * s + b;
            y * log_sum_exp(&[0.0, -z]) + (1.0 - y) * log_sum_exp(&[0.0, z])
        })
        .sum::<f64>()
        / n
}

/// Fit Platt coefficients starting from `(a, b) = (1, 0)`.
///
/// # Errors
///
/// Empty input, mismatched lengths, or a label other than 0/1.
pub fn fit_platt<L>(
    scores: &[f64],
    labels: &[L],
    minimizer: &dyn ScalarLossMinimizer,
) -> Result<PlattFit, CalibrationError>
where
    L: Copy + Into<f64>,
{
    if scores.is_empty() {
        return Err(CalibrationError::NoData);
    }
    if labels.len() != scores.len() {
        return Err(CalibrationError::LengthMismatch {
            expected: scores.len(),
            actual: labels.len(),
        });
    }
    let labels: Vec<f64> = labels.iter().map(|&l| l.into()).collect();
    if let Some((index, &value)) = labels
        .iter()
        .enumerate()
        .find(|&(_, &v)| v != 0.0 && v != 1.0)
    {
        return Err(CalibrationError::NonBinaryLabel { index, value });
    }

    let loss = |x: &[f64]| platt_loss(x[0], x[1], scores, &labels);
    let minimum = minimizer.minimize(&loss, &[1.0, 0.0]);
    let (a, b) = match minimum.x.as_slice() {
        [a, b] => (*a, *b),
        _ => (1.0, 0.0),
    };

    debug!(
        target: "sc_core::calibrate",
        samples = scores.len(),
        a,
        b,
        loss = minimum.value,
        iterations = minimum.iterations,
        converged = minimum.converged,
        "platt fit finished"
    );

    Ok(PlattFit {
        a,
        b,
        loss: minimum.value,
        iterations: minimum.iterations,
        converged: minimum.converged,
    })
}
