//! ROC curve construction and trapezoidal AUC.

use std::iter::once;

use serde::{Deserialize, Serialize};

use super::roc::{candidate_thresholds, RocPoint};

/// ROC curve in ascending-threshold order.
///
/// As the threshold rises more items are predicted correct, so both rates
/// are non-decreasing along the curve. Use [`RocCurve::sorted_by_fpr`]
/// before plotting a conventional ROC chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn points(&self) -> Vec<RocPoint> {
        self.thresholds
            .iter()
            .zip(&self.tpr)
            .zip(&self.fpr)
            .map(|((&threshold, &tpr), &fpr)| RocPoint { threshold, tpr, fpr })
            .collect()
    }

    /// Same points ordered by FPR, then TPR.
    pub fn sorted_by_fpr(&self) -> RocCurve {
        let mut points = self.points();
        points.sort_by(|a, b| a.fpr.total_cmp(&b.fpr).then(a.tpr.total_cmp(&b.tpr)));
        RocCurve {
            fpr: points.iter().map(|p| p.fpr).collect(),
            tpr: points.iter().map(|p| p.tpr).collect(),
            thresholds: points.iter().map(|p| p.threshold).collect(),
        }
    }

    /// Trapezoid area over the stored points only.
    pub fn area(&self) -> f64 {
        trapezoid(&self.fpr, &self.tpr)
    }
}

/// Trapezoid rule over consecutive `(x, y)` pairs in the given order.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// One ROC point per candidate threshold, ascending.
pub fn compute_roc_curve(p_mis: &[f64], labels: &[i32]) -> RocCurve {
    let candidates = candidate_thresholds(p_mis);
    let mut curve = RocCurve {
        fpr: Vec::with_capacity(candidates.len()),
        tpr: Vec::with_capacity(candidates.len()),
        thresholds: Vec::with_capacity(candidates.len()),
    };
    for threshold in candidates {
        let point = RocPoint::at_threshold(threshold, p_mis, labels);
        curve.fpr.push(point.fpr);
        curve.tpr.push(point.tpr);
        curve.thresholds.push(threshold);
    }
    curve
}

/// Area under the ROC curve, in `[0, 1]`.
///
/// Integrates [`compute_roc_curve`] in ascending-threshold order, anchored
/// by the operating points at `-inf` (nothing predicted correct) and `+inf`
/// (everything predicted correct). The anchors add zero width unless an
/// input probability sits at or beyond a candidate bound, as with
/// `p_mis == 1.0`, which `< 1.0` never accepts.
pub fn compute_auc(p_mis: &[f64], labels: &[i32]) -> f64 {
    let curve = compute_roc_curve(p_mis, labels);
    let open = RocPoint::at_threshold(f64::NEG_INFINITY, p_mis, labels);
    let close = RocPoint::at_threshold(f64::INFINITY, p_mis, labels);

    let fpr: Vec<f64> = once(open.fpr)
        .chain(curve.fpr.iter().copied())
        .chain(once(close.fpr))
        .collect();
    let tpr: Vec<f64> = once(open.tpr)
        .chain(curve.tpr.iter().copied())
        .chain(once(close.tpr))
        .collect();

    trapezoid(&fpr, &tpr).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_lengths_match() {
        let curve = compute_roc_curve(&[0.3, 0.1, 0.3], &[1, 0, 1]);
        assert_eq!(curve.len(), 4);
        assert_eq!(curve.fpr.len(), curve.len());
        assert_eq!(curve.tpr.len(), curve.len());
        assert_eq!(curve.thresholds, vec![0.0, 0.1, 0.3, 1.0]);
    }

    #[test]
    fn empty_input_still_has_bounds() {
        let curve = compute_roc_curve(&[], &[]);
        assert_eq!(curve.thresholds, vec![0.0, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.0]);
        assert_eq!(compute_auc(&[], &[]), 0.0);
    }

    #[test]
    fn rates_non_decreasing_in_threshold() {
        let p = [0.9, 0.2, 0.5, 0.4, 0.7, 0.1];
        let y = [0, 1, 0, 1, 1, 0];
        let curve = compute_roc_curve(&p, &y);
        for i in 1..curve.len() {
            assert!(curve.fpr[i] >= curve.fpr[i - 1]);
            assert!(curve.tpr[i] >= curve.tpr[i - 1]);
        }
    }

    #[test]
    fn perfect_separation_including_one() {
        let p = [0.1, 0.2, 0.3, 0.8, 0.9, 1.0];
        let y = [1, 1, 1, 0, 0, 0];
        let auc = compute_auc(&p, &y);
        assert!((auc - 1.0).abs() < 1e-12, "auc={auc}");
        // Without the closing anchor the last negative is never accepted.
        let curve = compute_roc_curve(&p, &y);
        assert!(curve.area() < 0.7);
    }

    #[test]
    fn inverted_separation_is_zero() {
        let p = [0.1, 0.2, 0.8, 0.9];
        let y = [0, 0, 1, 1];
        assert!(compute_auc(&p, &y).abs() < 1e-12);
    }

    #[test]
    fn interleaved_is_partial() {
        let p = [0.2, 0.4, 0.6, 0.8];
        let y = [1, 0, 1, 0];
        let auc = compute_auc(&p, &y);
        assert!((auc - 0.75).abs() < 1e-12, "auc={auc}");
    }

    #[test]
    fn sorted_by_fpr_orders_points() {
        let curve = RocCurve {
            fpr: vec![0.5, 0.0, 1.0],
            tpr: vec![0.5, 0.0, 1.0],
            thresholds: vec![0.4, 0.0, 1.0],
        };
        let sorted = curve.sorted_by_fpr();
        assert_eq!(sorted.fpr, vec![0.0, 0.5, 1.0]);
        assert_eq!(sorted.thresholds, vec![0.0, 0.4, 1.0]);
        assert_eq!(sorted.points().len(), 3);
    }

    #[test]
    fn trapezoid_unit_square_diagonal() {
        assert!((trapezoid(&[0.0, 1.0], &[0.0, 1.0]) - 0.5).abs() < 1e-15);
        assert_eq!(trapezoid(&[], &[]), 0.0);
    }
}
