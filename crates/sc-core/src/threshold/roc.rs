//! Confusion-matrix bookkeeping at a single threshold.

use serde::{Deserialize, Serialize};

/// Youden's J statistic, `tpr - fpr`, in `[-1, 1]`.
pub fn youden_index(tpr: f64, fpr: f64) -> f64 {
    tpr - fpr
}

/// Confusion counts with "predicted correct" as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionCounts {
    /// Tally predictions at `threshold`: positive iff `p < threshold`.
    ///
    /// Labels other than 0 or 1 are ignored.
    pub fn at_threshold(threshold: f64, p_mis: &[f64], labels: &[i32]) -> Self {
        let mut counts = ConfusionCounts::default();
        for (&p, &label) in p_mis.iter().zip(labels) {
            let predicted = p < threshold;
            match (predicted, label) {
                (true, 1) => counts.tp += 1,
                (true, 0) => counts.fp += 1,
                (false, 0) => counts.tn += 1,
                (false, 1) => counts.fn_ += 1,
                _ => {}
            }
        }
        counts
    }

    /// `tp / (tp + fn)`, or 0.0 with no positives.
    pub fn tpr(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// `fp / (fp + tn)`, or 0.0 with no negatives.
    pub fn fpr(&self) -> f64 {
        ratio(self.fp, self.fp + self.tn)
    }

    pub fn youden(&self) -> f64 {
        youden_index(self.tpr(), self.fpr())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// One operating point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub tpr: f64,
    pub fpr: f64,
}

impl RocPoint {
    pub fn at_threshold(threshold: f64, p_mis: &[f64], labels: &[i32]) -> Self {
        let counts = ConfusionCounts::at_threshold(threshold, p_mis, labels);
        RocPoint {
            threshold,
            tpr: counts.tpr(),
            fpr: counts.fpr(),
        }
    }

    pub fn youden(&self) -> f64 {
        youden_index(self.tpr, self.fpr)
    }
}

/// `(tpr, fpr)` at `threshold`.
///
/// Degenerate denominators yield 0.0 rather than NaN, so an all-correct or
/// all-incorrect label set reports 0 for the missing rate.
pub fn compute_roc_point(threshold: f64, p_mis: &[f64], labels: &[i32]) -> (f64, f64) {
    let counts = ConfusionCounts::at_threshold(threshold, p_mis, labels);
    (counts.tpr(), counts.fpr())
}

/// Sorted unique values of `{0.0, 1.0} ∪ p_mis`.
///
/// Every operating point reachable with a strict `<` comparison is produced
/// by exactly one candidate.
pub fn candidate_thresholds(p_mis: &[f64]) -> Vec<f64> {
    let mut candidates: Vec<f64> = [0.0, 1.0].iter().chain(p_mis).copied().collect();
    candidates.sort_by(f64::total_cmp);
    candidates.dedup();
    candidates
}
