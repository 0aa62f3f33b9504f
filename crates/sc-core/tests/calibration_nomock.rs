//! No-mock integration tests for the calibration pipeline.
//!
//! These tests run real score matrices end to end and cover:
//! - Temperature search on over- and under-confident models
//! - Baseline retention when no temperature helps
//! - ECE before and after scaling
//! - Platt scaling against a known logistic model

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sc_core::calibrate::{
    correct_class_probabilities, expected_calibration_error, fit_platt, fit_temperature,
    negative_log_likelihood, softmax_with_temperature, top_class_confidence, CalibrationCurve,
    CalibrationError, CalibrationQuality, PlattSettings, TemperatureSearch,
};
use sc_math::{NelderMead, ScoreMatrix};

/// Print test event (simple logging for integration tests).
macro_rules! log_test {
    ($level:expr, $msg:expr $(,)?) => {{
        eprintln!("[{}] {}", $level, $msg);
    }};
    ($level:expr, $msg:expr, $($key:ident = $val:expr),* $(,)?) => {{
        eprintln!("[{}] {} {{ {} }}", $level, $msg, stringify!($($key = $val),*));
    }};
}

// ============================================================================
// Fixtures
// ============================================================================

/// Ten samples scored `[5, 0, 0]`; the first candidate is right 7 times.
///
/// The likelihood peaks where the top probability equals 0.7, i.e. at
/// `T = 5 / ln(14 / 3)`.
fn overconfident() -> (ScoreMatrix, Vec<usize>) {
    let rows = vec![vec![5.0, 0.0, 0.0]; 10];
    let truth = vec![0, 0, 0, 0, 0, 0, 0, 1, 1, 1];
    (ScoreMatrix::from_rows(rows).unwrap(), truth)
}

fn ece_at(scores: &ScoreMatrix, truth: &[usize], temperature: f64) -> f64 {
    let probs = softmax_with_temperature(scores, temperature).unwrap();
    let (confidence, correct) = top_class_confidence(&probs, truth).unwrap();
    expected_calibration_error(&confidence, &correct, 10).unwrap()
}

// ============================================================================
// Temperature Scaling
// ============================================================================

#[test]
fn test_overconfident_model_is_softened() {
    let (scores, truth) = overconfident();
    let fit = fit_temperature(&scores, &truth, &TemperatureSearch::default()).unwrap();

    let optimum = 5.0 / (14.0f64 / 3.0).ln();
    log_test!(
        "INFO",
        "overconfident fit",
        temperature = fit.temperature,
        optimum = optimum,
    );

    assert!(fit.temperature > 1.0);
    assert!((fit.temperature - optimum).abs() < 0.05, "{fit:?}");
    assert!(fit.nll_after < fit.nll_before);
    assert!((fit.improvement - (fit.nll_before - fit.nll_after)).abs() < 1e-12);
}

#[test]
fn test_scaling_reduces_ece() {
    let (scores, truth) = overconfident();
    let fit = fit_temperature(&scores, &truth, &TemperatureSearch::default()).unwrap();

    let before = ece_at(&scores, &truth, 1.0);
    let after = ece_at(&scores, &truth, fit.temperature);

    assert!(before > 0.25, "before={before}");
    assert!(after < 0.05, "after={after}");
    assert_eq!(CalibrationQuality::from_ece(before), CalibrationQuality::Poor);
    assert_eq!(CalibrationQuality::from_ece(after), CalibrationQuality::Excellent);
}

#[test]
fn test_underconfident_model_sharpens_to_grid_floor() {
    // Always right with a weak margin: sharper is always better.
    let scores = ScoreMatrix::from_rows(vec![vec![0.5, 0.0, 0.0]; 6]).unwrap();
    let truth = vec![0; 6];
    let search = TemperatureSearch::default();
    let fit = fit_temperature(&scores, &truth, &search).unwrap();

    assert_eq!(fit.temperature, search.min);
    assert!(fit.nll_after < fit.nll_before);
}

#[test]
fn test_flat_scores_keep_baseline() {
    let scores = ScoreMatrix::from_rows(vec![vec![0.0, 0.0, 0.0]; 4]).unwrap();
    let truth = vec![0, 1, 2, 0];
    let fit = fit_temperature(&scores, &truth, &TemperatureSearch::default()).unwrap();

    assert_eq!(fit.temperature, 1.0);
    assert_eq!(fit.improvement, 0.0);
    assert!((fit.nll_before - 3.0f64.ln()).abs() < 1e-12);
}

#[test]
fn test_nll_matches_manual_computation() {
    let (scores, truth) = overconfident();
    let probs = softmax_with_temperature(&scores, 1.0).unwrap();
    let correct = correct_class_probabilities(&probs, &truth).unwrap();

    let denom = 5.0f64.exp() + 2.0;
    let expected = (7.0 * -(5.0f64.exp() / denom).ln() + 3.0 * -(1.0 / denom).ln()) / 10.0;
    assert!((negative_log_likelihood(&correct) - expected).abs() < 1e-12);

    let fit = fit_temperature(&scores, &truth, &TemperatureSearch::default()).unwrap();
    assert!((fit.nll_before - expected).abs() < 1e-12);
}

#[test]
fn test_custom_search_range() {
    let (scores, truth) = overconfident();
    let narrow = TemperatureSearch::new(0.5, 2.0, 16).unwrap();
    let fit = fit_temperature(&scores, &truth, &narrow).unwrap();
    // The optimum lies above the range, so the upper bound wins.
    assert_eq!(fit.temperature, 2.0);
}

#[test]
fn test_invalid_inputs_rejected() {
    let (scores, truth) = overconfident();

    let empty = ScoreMatrix::from_rows(vec![]).unwrap();
    assert_eq!(
        fit_temperature(&empty, &[], &TemperatureSearch::default()).unwrap_err(),
        CalibrationError::NoData
    );

    assert!(matches!(
        fit_temperature(&scores, &truth[..3], &TemperatureSearch::default()),
        Err(CalibrationError::LengthMismatch { .. })
    ));

    let mut bad = truth.clone();
    bad[4] = 3;
    assert_eq!(
        fit_temperature(&scores, &bad, &TemperatureSearch::default()).unwrap_err(),
        CalibrationError::IndexOutOfRange {
            sample: 4,
            index: 3,
            n_candidates: 3
        }
    );

    assert!(matches!(
        TemperatureSearch::new(0.0, 5.0, 10),
        Err(CalibrationError::InvalidSearchRange { .. })
    ));
}

#[test]
fn test_fit_is_deterministic() {
    let (scores, truth) = overconfident();
    let search = TemperatureSearch::default();
    let a = fit_temperature(&scores, &truth, &search).unwrap();
    let b = fit_temperature(&scores, &truth, &search).unwrap();
    assert_eq!(a.temperature.to_bits(), b.temperature.to_bits());
    assert_eq!(a.nll_after.to_bits(), b.nll_after.to_bits());
}

// ============================================================================
// Reliability Curve
// ============================================================================

#[test]
fn test_curve_weights_sum_to_sample_count() {
    let mut rng = StdRng::seed_from_u64(7);
    let probs: Vec<f64> = (0..500).map(|_| rng.random::<f64>()).collect();
    let labels: Vec<u8> = probs.iter().map(|&p| u8::from(rng.random::<f64>() < p)).collect();

    let curve = CalibrationCurve::from_probabilities(&probs, &labels, 10).unwrap();
    assert_eq!(curve.binned_count(), 500);
    assert!(curve.ece <= curve.mce);
    // Labels drawn from the probabilities themselves: close to calibrated.
    assert!(curve.ece < 0.1, "ece={}", curve.ece);
}

// ============================================================================
// Platt Scaling
// ============================================================================

#[test]
fn test_platt_recovers_logistic_model() {
    let mut rng = StdRng::seed_from_u64(42);
    let (true_a, true_b) = (2.0, -1.0);

    let scores: Vec<f64> = (0..2000).map(|_| rng.random::<f64>() * 6.0 - 3.0).collect();
    let labels: Vec<u8> = scores
        .iter()
        .map(|&s| {
            let p = 1.0 / (1.0 + (-(true_a * s + true_b)).exp());
            u8::from(rng.random::<f64>() < p)
        })
        .collect();

    let fit = fit_platt(&scores, &labels, &PlattSettings::default().minimizer()).unwrap();
    log_test!("INFO", "platt fit", a = fit.a, b = fit.b, loss = fit.loss);

    assert!((fit.a - true_a).abs() < 0.5, "{fit:?}");
    assert!((fit.b - true_b).abs() < 0.4, "{fit:?}");
    assert!(fit.apply(3.0) > 0.9);
    assert!(fit.apply(-3.0) < 0.1);
}

#[test]
fn test_platt_accepts_float_labels() {
    let scores = [-1.0, -0.5, 0.5, 1.0];
    let labels = [0.0f64, 0.0, 1.0, 1.0];
    let fit = fit_platt(&scores, &labels, &NelderMead::default()).unwrap();
    assert!(fit.a > 0.0);
}
