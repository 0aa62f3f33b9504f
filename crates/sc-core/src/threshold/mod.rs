//! Decision thresholds from ROC analysis.
//!
//! Inputs are a misclassification probability per item (`p_mis`) and a binary
//! label (1 = the decision was correct, 0 = it was not). An item is
//! predicted correct at threshold `t` iff `p_mis < t`.
//!
//! - [`roc`]: confusion counts and the (TPR, FPR) pair at one threshold
//! - [`optimizer`]: dual Youden-index search for the auto/escalate thresholds
//! - [`curve`]: full ROC curve over the candidate thresholds and its AUC
//!
//! # Example
//!
//! ```
//! use sc_core::threshold::{compute_auc, optimize_thresholds};
//!
//! let p_mis = [0.05, 0.08, 0.12, 0.50, 0.60, 0.80];
//! let labels = [1, 1, 1, 0, 0, 0];
//! let pair = optimize_thresholds(&p_mis, &labels).unwrap();
//! assert!(pair.youden_auto > 0.5);
//! assert!(compute_auc(&p_mis, &labels) > 0.9);
//! ```

pub mod curve;
pub mod optimizer;
pub mod roc;

pub use curve::*;
pub use optimizer::*;
pub use roc::*;

use thiserror::Error;

/// Input validation failures for threshold optimization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("probability and label arrays must not be empty")]
    Empty,

    #[error("got {probabilities} probabilities but {labels} labels")]
    LengthMismatch { probabilities: usize, labels: usize },

    #[error("label at index {index} must be 0 or 1, got {value}")]
    NonBinaryLabel { index: usize, value: i32 },
}

impl ThresholdError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ThresholdError::Empty => 40,
            ThresholdError::LengthMismatch { .. } => 41,
            ThresholdError::NonBinaryLabel { .. } => 42,
        }
    }
}

/// Reject empty, mismatched, or non-binary inputs.
pub fn validate_inputs(p_mis: &[f64], labels: &[i32]) -> Result<(), ThresholdError> {
    if p_mis.is_empty() || labels.is_empty() {
        return Err(ThresholdError::Empty);
    }
    if p_mis.len() != labels.len() {
        return Err(ThresholdError::LengthMismatch {
            probabilities: p_mis.len(),
            labels: labels.len(),
        });
    }
    if let Some((index, &value)) = labels
        .iter()
        .enumerate()
        .find(|&(_, &l)| l != 0 && l != 1)
    {
        return Err(ThresholdError::NonBinaryLabel { index, value });
    }
    Ok(())
}
