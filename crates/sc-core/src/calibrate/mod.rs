//! Probability calibration for multi-candidate classifiers.
//!
//! Rescales raw model scores so that predicted probabilities track empirical
//! accuracy, and measures how well they do.
//!
//! # Components
//!
//! - **Temperature scaling**: softmax of `scores / T`, with a grid search for
//!   the `T` minimizing negative log-likelihood ([`fit_temperature`])
//! - **Expected Calibration Error (ECE)**: binned gap between confidence and
//!   accuracy ([`expected_calibration_error`], [`CalibrationCurve`])
//! - **Platt scaling**: sigmoid fit through a pluggable scalar-loss minimizer
//!   ([`fit_platt`])
//!
//! # Usage
//!
//! ```
//! use sc_core::calibrate::{fit_temperature, TemperatureSearch};
//! use sc_math::ScoreMatrix;
//!
//! let scores = ScoreMatrix::from_rows(vec![
//!     vec![2.0, 0.5, 0.1],
//!     vec![0.2, 1.8, 0.3],
//!     vec![0.1, 0.4, 2.2],
//! ])
//! .unwrap();
//! let fit = fit_temperature(&scores, &[0, 1, 2], &TemperatureSearch::default()).unwrap();
//! assert!(fit.nll_after <= fit.nll_before);
//! ```

pub mod curve;
pub mod platt;
pub mod temperature;

pub use curve::*;
pub use platt::*;
pub use temperature::*;

use serde::{Deserialize, Serialize};
use sc_math::MatrixError;
use thiserror::Error;

/// Outcome of a temperature search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFit {
    /// Best temperature found (1.0 when no grid point beats the baseline).
    pub temperature: f64,
    /// NLL at the untouched baseline T = 1.0.
    pub nll_before: f64,
    /// NLL at `temperature`.
    pub nll_after: f64,
    /// `nll_before - nll_after`; never negative.
    pub improvement: f64,
}

/// Calibration quality level based on ECE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationQuality {
    /// ECE < 0.05 (conventionally "well calibrated")
    Excellent,
    /// ECE < 0.10
    Good,
    /// ECE < 0.15
    Fair,
    /// ECE >= 0.15
    Poor,
}

impl std::fmt::Display for CalibrationQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationQuality::Excellent => write!(f, "excellent"),
            CalibrationQuality::Good => write!(f, "good"),
            CalibrationQuality::Fair => write!(f, "fair"),
            CalibrationQuality::Poor => write!(f, "poor"),
        }
    }
}

impl CalibrationQuality {
    /// Grade an ECE value. Informational only; nothing enforces a grade.
    pub fn from_ece(ece: f64) -> Self {
        if ece < 0.05 {
            CalibrationQuality::Excellent
        } else if ece < 0.10 {
            CalibrationQuality::Good
        } else if ece < 0.15 {
            CalibrationQuality::Fair
        } else {
            CalibrationQuality::Poor
        }
    }
}

/// Error type for calibration operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("no calibration data provided")]
    NoData,

    #[error("length mismatch: expected {expected} entries, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("sample {sample}: true index {index} out of range for {n_candidates} candidates")]
    IndexOutOfRange {
        sample: usize,
        index: usize,
        n_candidates: usize,
    },

    #[error("temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),

    #[error("invalid temperature search range [{min}, {max}]")]
    InvalidSearchRange { min: f64, max: f64 },

    #[error("label at index {index} must be 0 or 1, got {value}")]
    NonBinaryLabel { index: usize, value: f64 },

    #[error("malformed score matrix: {0}")]
    Matrix(#[from] MatrixError),
}

impl CalibrationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            CalibrationError::NoData => 30,
            CalibrationError::LengthMismatch { .. } => 31,
            CalibrationError::IndexOutOfRange { .. } => 32,
            CalibrationError::InvalidTemperature(_) => 33,
            CalibrationError::InvalidSearchRange { .. } => 34,
            CalibrationError::NonBinaryLabel { .. } => 35,
            CalibrationError::Matrix(_) => 36,
        }
    }
}
