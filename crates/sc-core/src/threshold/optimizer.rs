//! Dual Youden-index search for the auto and escalate thresholds.
//!
//! Both searches walk the same ascending candidate set and keep the first
//! candidate with a strictly higher J, so ties go to the smallest threshold.
//! They are independent problems: nothing forces
//! `threshold_auto <= threshold_escalate`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::roc::{candidate_thresholds, ConfusionCounts};
use super::{validate_inputs, ThresholdError};

/// Threshold reported when no candidate beats the initial score.
const FALLBACK_THRESHOLD: f64 = 0.5;

/// The two optimized thresholds and their Youden indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub threshold_auto: f64,
    pub threshold_escalate: f64,
    pub youden_auto: f64,
    pub youden_escalate: f64,
}

impl From<ThresholdPair> for (f64, f64, f64, f64) {
    fn from(pair: ThresholdPair) -> Self {
        (
            pair.threshold_auto,
            pair.threshold_escalate,
            pair.youden_auto,
            pair.youden_escalate,
        )
    }
}

/// Thresholds plus run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub threshold_auto: f64,
    pub threshold_escalate: f64,
    pub youden_auto: f64,
    pub youden_escalate: f64,
    pub n_samples: usize,
    /// RFC 3339 UTC timestamp of the run.
    pub timestamp: String,
}

impl ThresholdResult {
    pub fn pair(&self) -> ThresholdPair {
        ThresholdPair {
            threshold_auto: self.threshold_auto,
            threshold_escalate: self.threshold_escalate,
            youden_auto: self.youden_auto,
            youden_escalate: self.youden_escalate,
        }
    }
}

/// First candidate with the highest J, starting from `(0.5, -1.0)`.
fn best_youden(candidates: &[f64], p_mis: &[f64], labels: &[i32]) -> (f64, f64) {
    let mut best_threshold = FALLBACK_THRESHOLD;
    let mut best_j = -1.0;
    for &threshold in candidates {
        let j = ConfusionCounts::at_threshold(threshold, p_mis, labels).youden();
        if j > best_j {
            best_j = j;
            best_threshold = threshold;
        }
    }
    (best_threshold, best_j)
}

/// Find the auto and escalate thresholds.
///
/// The auto threshold maximizes J with "decision was correct" as the
/// positive class; the escalate threshold maximizes J on the complemented
/// labels, where "decision was incorrect" is positive.
///
/// # Errors
///
/// [`ThresholdError`] for empty input, mismatched lengths, or a label
/// outside `{0, 1}`.
pub fn optimize_thresholds(p_mis: &[f64], labels: &[i32]) -> Result<ThresholdPair, ThresholdError> {
    validate_inputs(p_mis, labels)?;

    let candidates = candidate_thresholds(p_mis);
    let (threshold_auto, youden_auto) = best_youden(&candidates, p_mis, labels);

    let flipped: Vec<i32> = labels.iter().map(|&l| 1 - l).collect();
    let (threshold_escalate, youden_escalate) = best_youden(&candidates, p_mis, &flipped);

    debug!(
        target: "sc_core::threshold",
        samples = p_mis.len(),
        candidates = candidates.len(),
        threshold_auto,
        youden_auto,
        threshold_escalate,
        youden_escalate,
        "threshold search finished"
    );

    Ok(ThresholdPair {
        threshold_auto,
        threshold_escalate,
        youden_auto,
        youden_escalate,
    })
}

/// [`optimize_thresholds`] stamped with the current UTC time.
pub fn optimize_thresholds_with_metadata(
    p_mis: &[f64],
    labels: &[i32],
) -> Result<ThresholdResult, ThresholdError> {
    optimize_thresholds_at(p_mis, labels, Utc::now())
}

/// [`optimize_thresholds`] stamped with a caller-supplied time.
pub fn optimize_thresholds_at(
    p_mis: &[f64],
    labels: &[i32],
    at: DateTime<Utc>,
) -> Result<ThresholdResult, ThresholdError> {
    let pair = optimize_thresholds(p_mis, labels)?;
    Ok(ThresholdResult {
        threshold_auto: pair.threshold_auto,
        threshold_escalate: pair.threshold_escalate,
        youden_auto: pair.youden_auto,
        youden_escalate: pair.youden_escalate,
        n_samples: p_mis.len(),
        timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}
