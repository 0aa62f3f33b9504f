//! Reliability bins and Expected Calibration Error.
//!
//! `[0, 1]` is split into equal-width bins taken from `linspace(0, 1, n + 1)`.
//! Every bin is half-open `[lower, upper)` except the top one, which is
//! closed so that a probability of exactly 1.0 is counted.

use serde::{Deserialize, Serialize};
use sc_math::linspace;

use super::CalibrationError;

/// One bin of a reliability diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    /// Bin lower bound (inclusive).
    pub lower: f64,
    /// Bin upper bound (exclusive, except last bin).
    pub upper: f64,
    /// Mean predicted probability in this bin.
    pub mean_confidence: f64,
    /// Mean label in this bin.
    pub accuracy: f64,
    /// Number of samples in this bin.
    pub count: usize,
    /// `|accuracy - mean_confidence|`, 0 for empty bins.
    pub error: f64,
}

/// Reliability diagram data with its summary errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    /// Number of bins used.
    pub num_bins: usize,
    /// The bins.
    pub bins: Vec<CalibrationBin>,
    /// Expected calibration error.
    pub ece: f64,
    /// Maximum calibration error over non-empty bins.
    pub mce: f64,
}

impl CalibrationCurve {
    /// Bin `probs` against `labels` (1 = correct, 0 = incorrect).
    ///
    /// Samples are weighted by `count / probs.len()`, so a probability
    /// outside `[0, 1]` lands in no bin but still dilutes the weights.
    /// `num_bins == 0` produces an empty curve with zero error.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::LengthMismatch`] when `labels` and `probs` differ
    /// in length.
    pub fn from_probabilities<L>(
        probs: &[f64],
        labels: &[L],
        num_bins: usize,
    ) -> Result<Self, CalibrationError>
    where
        L: Copy + Into<f64>,
    {
        if labels.len() != probs.len() {
            return Err(CalibrationError::LengthMismatch {
                expected: probs.len(),
                actual: labels.len(),
            });
        }
        let total = probs.len() as f64;
        let edges = linspace(0.0, 1.0, num_bins + 1);

        let mut ece = 0.0;
        let mut mce = 0.0f64;
        let mut bins = Vec::with_capacity(num_bins);

        for (i, edge) in edges.windows(2).enumerate() {
            let (lower, upper) = (edge[0], edge[1]);
            let is_top = i + 1 == num_bins;

            let mut count = 0usize;
            let mut conf_sum = 0.0;
            let mut label_sum = 0.0;
            for (&p, &label) in probs.iter().zip(labels) {
                let inside = p >= lower && (p < upper || (is_top && p <= upper));
                if inside {
                    count += 1;
                    conf_sum += p;
                    label_sum += label.into();
                }
            }

            let bin = if count == 0 {
                CalibrationBin {
                    lower,
                    upper,
                    mean_confidence: (lower + upper) / 2.0,
                    accuracy: 0.0,
                    count: 0,
                    error: 0.0,
                }
            } else {
                let mean_confidence = conf_sum / count as f64;
                let accuracy = label_sum / count as f64;
                let error = (accuracy - mean_confidence).abs();
                ece += error * (count as f64 / total);
                mce = mce.max(error);
                CalibrationBin {
                    lower,
                    upper,
                    mean_confidence,
                    accuracy,
                    count,
                    error,
                }
            };
            bins.push(bin);
        }

        Ok(CalibrationCurve {
            num_bins,
            bins,
            ece,
            mce,
        })
    }

    /// Number of samples that landed in some bin.
    pub fn binned_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// ASCII reliability diagram: `·` marks the diagonal, `●` the bins.
    pub fn ascii_curve(&self, width: usize, height: usize) -> String {
        let width = width.max(8);
        let height = height.max(2);
        let mut output = String::new();

        output.push_str(&format!(
            "Reliability (ECE={:.4}, MCE={:.4})\n",
            self.ece, self.mce
        ));
        output.push_str(&"─".repeat(width + 4));
        output.push('\n');

        let mut grid = vec![vec![' '; width]; height];

        for i in 0..width {
            let y = (i * (height - 1)) / (width - 1);
            grid[height - 1 - y][i] = '·';
        }

        for bin in self.bins.iter().filter(|b| b.count > 0) {
            let x = ((bin.mean_confidence * (width - 1) as f64) as usize).min(width - 1);
            let y = ((bin.accuracy * (height - 1) as f64) as usize).min(height - 1);
            grid[height - 1 - y][x] = '●';
        }

        for (i, row) in grid.iter().enumerate() {
            let y_val = 1.0 - (i as f64 / (height - 1) as f64);
            output.push_str(&format!("{:.1}│", y_val));
            output.extend(row.iter());
            output.push('\n');
        }

        output.push_str("   └");
        output.push_str(&"─".repeat(width));
        output.push('\n');
        output.push_str("    0");
        output.push_str(&" ".repeat(width / 2 - 2));
        output.push_str("0.5");
        output.push_str(&" ".repeat(width / 2 - 2));
        output.push_str("1.0\n");
        output.push_str("          Confidence\n");

        output
    }
}

/// Expected Calibration Error over `n_bins` equal-width bins.
///
/// Result lies in `[0, 1]`; lower is better. Values below 0.05 are
/// conventionally read as well calibrated.
pub fn expected_calibration_error<L>(
    probs: &[f64],
    labels: &[L],
    n_bins: usize,
) -> Result<f64, CalibrationError>
where
    L: Copy + Into<f64>,
{
    Ok(CalibrationCurve::from_probabilities(probs, labels, n_bins)?.ece)
}
