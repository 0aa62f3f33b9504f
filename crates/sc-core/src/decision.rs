//! Candidate scoring and three-level routing of individual predictions.
//!
//! [`score_candidates`] turns normalized features into one raw score per
//! candidate (`w1·ocr + w2·error + w3·prior + w4·rag + bias`), a softmax
//! distribution, and a misclassification probability. [`decide`] compares
//! that probability against the auto and escalate thresholds; safety flags
//! override the comparison.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sc_math::softmax_with_temperature;
use thiserror::Error;
use tracing::debug;

use crate::threshold::ThresholdResult;

/// RAG similarity below which the knowledge base is considered missed.
pub const RAG_MISS_SIMILARITY: f64 = 0.1;

/// Candidate label the clusterer uses when it cannot identify an error.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Routing outcome for one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Accept the model's answer without review.
    AutoResolve,
    /// Ask the requester for more detail.
    AskClarification,
    /// Route to a human.
    Escalate,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoResolve => write!(f, "AUTO_RESOLVE"),
            Self::AskClarification => write!(f, "ASK_CLARIFICATION"),
            Self::Escalate => write!(f, "ESCALATE"),
        }
    }
}

/// Boundaries on misclassification probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    pub auto: f64,
    pub escalate: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            auto: 0.15,
            escalate: 0.50,
        }
    }
}

impl From<&ThresholdResult> for DecisionThresholds {
    fn from(result: &ThresholdResult) -> Self {
        Self {
            auto: result.threshold_auto,
            escalate: result.threshold_escalate,
        }
    }
}

/// Conditions that force escalation regardless of confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyFlags {
    pub rag_miss: bool,
    pub unknown_error: bool,
}

impl SafetyFlags {
    /// Derive flags from retrieval similarity and the top candidate's label.
    pub fn from_signals(rag_similarity: f64, top_label: &str) -> Self {
        Self {
            rag_miss: rag_similarity < RAG_MISS_SIMILARITY,
            unknown_error: top_label == UNKNOWN_LABEL,
        }
    }

    pub fn any(&self) -> bool {
        self.rag_miss || self.unknown_error
    }
}

/// `1 - max(probs)`; 1.0 for an empty distribution.
pub fn misclassification_probability(probs: &[f64]) -> f64 {
    if probs.is_empty() {
        return 1.0;
    }
    1.0 - probs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Route one prediction.
pub fn decide(p_mis: f64, thresholds: &DecisionThresholds, flags: &SafetyFlags) -> Decision {
    if flags.any() {
        return Decision::Escalate;
    }
    if p_mis < thresholds.auto {
        Decision::AutoResolve
    } else if p_mis < thresholds.escalate {
        Decision::AskClarification
    } else {
        Decision::Escalate
    }
}

/// Error type for candidate scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("no candidates to score")]
    NoCandidates,

    #[error("scoring temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),

    #[error("weight {name} must be finite, got {value}")]
    NonFiniteWeight { name: String, value: f64 },
}

impl ScoringError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ScoringError::NoCandidates => 60,
            ScoringError::InvalidTemperature(_) => 61,
            ScoringError::NonFiniteWeight { .. } => 62,
        }
    }
}

/// Clamp into `[0, 1]`. NaN maps to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Normalized evidence for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub ocr_confidence: f64,
    pub error_code_match: f64,
    pub cluster_prior: f64,
    pub rag_similarity: f64,
}

impl Features {
    /// Every feature clamped into `[0, 1]`.
    pub fn clamped(&self) -> Self {
        Self {
            ocr_confidence: clamp01(self.ocr_confidence),
            error_code_match: clamp01(self.error_code_match),
            cluster_prior: clamp01(self.cluster_prior),
            rag_similarity: clamp01(self.rag_similarity),
        }
    }
}

/// A candidate cluster; `label` selects its bias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub label: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Linear scoring weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    /// OCR confidence.
    pub w1: f64,
    /// Error-code match.
    pub w2: f64,
    /// Cluster prior.
    pub w3: f64,
    /// RAG similarity.
    pub w4: f64,
    pub default_bias: f64,
    /// Bias by candidate label; falls back to `default_bias`.
    pub per_candidate_biases: BTreeMap<String, f64>,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            w1: 0.3,
            w2: 0.3,
            w3: 0.2,
            w4: 0.2,
            default_bias: 0.0,
            per_candidate_biases: BTreeMap::new(),
        }
    }
}

impl Weights {
    pub fn bias(&self, label: &str) -> f64 {
        self.per_candidate_biases
            .get(label)
            .copied()
            .unwrap_or(self.default_bias)
    }

    /// `w1·ocr + w2·error + w3·prior + w4·rag + bias(label)`, on the features as given.
    pub fn raw_score(&self, features: &Features, label: &str) -> f64 {
        self.w1 * features.ocr_confidence
            + self.w2 * features.error_code_match
            + self.w3 * features.cluster_prior
            + self.w4 * features.rag_similarity
            + self.bias(label)
    }

    /// Reject NaN or infinite weights and biases.
    pub fn validate(&self) -> Result<(), ScoringError> {
        let named = [
            ("w1", self.w1),
            ("w2", self.w2),
            ("w3", self.w3),
            ("w4", self.w4),
            ("default_bias", self.default_bias),
        ];
        let biases = self
            .per_candidate_biases
            .iter()
            .map(|(label, &value)| (label.as_str(), value));
        for (name, value) in named.into_iter().chain(biases) {
            if !value.is_finite() {
                return Err(ScoringError::NonFiniteWeight {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Weights plus the optional softmax temperature applied to raw scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub weights: Weights,
    /// `None` scores with the plain softmax.
    pub temperature: Option<f64>,
}

impl ScoringSettings {
    pub fn validate(&self) -> Result<(), ScoringError> {
        self.weights.validate()?;
        match self.temperature {
            Some(t) if !(t.is_finite() && t > 0.0) => Err(ScoringError::InvalidTemperature(t)),
            _ => Ok(()),
        }
    }
}

/// Raw score and probability for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub id: String,
    pub label: String,
    pub raw_score: f64,
    pub probability: f64,
}

/// Full audit record of one scored request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub decision: Decision,
    pub top_candidate: Candidate,
    pub top_score: f64,
    pub top_probability: f64,
    pub misclassification_probability: f64,
    /// Every candidate, in input order.
    pub scores: Vec<CandidateScore>,
    pub safety_flags: SafetyFlags,
}

/// Score `candidates` against `features` and route the request.
///
/// Features are clamped into `[0, 1]` first. The top candidate is the first
/// one holding the largest probability; the RAG-miss and UNKNOWN-label
/// safety rules are evaluated against it and the clamped features.
///
/// # Errors
///
/// [`ScoringError::NoCandidates`] for an empty candidate list, and the
/// validation errors of [`ScoringSettings::validate`].
pub fn score_candidates(
    candidates: &[Candidate],
    features: &Features,
    settings: &ScoringSettings,
    thresholds: &DecisionThresholds,
) -> Result<ScoringResult, ScoringError> {
    if candidates.is_empty() {
        return Err(ScoringError::NoCandidates);
    }
    settings.validate()?;

    let features = features.clamped();
    let raw: Vec<f64> = candidates
        .iter()
        .map(|c| settings.weights.raw_score(&features, &c.label))
        .collect();
    let probabilities = softmax_with_temperature(&raw, settings.temperature.unwrap_or(1.0));

    let mut top = 0;
    for (i, &p) in probabilities.iter().enumerate().skip(1) {
        if p > probabilities[top] {
            top = i;
        }
    }

    let top_candidate = candidates[top].clone();
    let p_mis = misclassification_probability(&probabilities);
    let safety_flags = SafetyFlags::from_signals(features.rag_similarity, &top_candidate.label);
    let decision = decide(p_mis, thresholds, &safety_flags);

    debug!(
        target: "sc_core::decision",
        candidates = candidates.len(),
        top = %top_candidate.id,
        p_mis,
        decision = %decision,
        "candidates scored"
    );

    let scores = candidates
        .iter()
        .zip(raw.iter().zip(&probabilities))
        .map(|(c, (&raw_score, &probability))| CandidateScore {
            id: c.id.clone(),
            label: c.label.clone(),
            raw_score,
            probability,
        })
        .collect();

    Ok(ScoringResult {
        decision,
        top_candidate,
        top_score: raw[top],
        top_probability: probabilities[top],
        misclassification_probability: p_mis,
        scores,
        safety_flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands() {
        let t = DecisionThresholds::default();
        let none = SafetyFlags::default();
        assert_eq!(decide(0.05, &t, &none), Decision::AutoResolve);
        assert_eq!(decide(0.15, &t, &none), Decision::AskClarification);
        assert_eq!(decide(0.49, &t, &none), Decision::AskClarification);
        assert_eq!(decide(0.50, &t, &none), Decision::Escalate);
    }

    #[test]
    fn safety_flags_override() {
        let t = DecisionThresholds::default();
        let rag = SafetyFlags {
            rag_miss: true,
            ..Default::default()
        };
        let unknown = SafetyFlags {
            unknown_error: true,
            ..Default::default()
        };
        assert_eq!(decide(0.0, &t, &rag), Decision::Escalate);
        assert_eq!(decide(0.0, &t, &unknown), Decision::Escalate);
    }

    #[test]
    fn flags_from_signals() {
        assert!(SafetyFlags::from_signals(0.05, "E42").rag_miss);
        assert!(!SafetyFlags::from_signals(0.1, "E42").any());
        assert!(SafetyFlags::from_signals(0.9, UNKNOWN_LABEL).unknown_error);
    }

    #[test]
    fn misclassification_from_distribution() {
        assert!((misclassification_probability(&[0.7, 0.2, 0.1]) - 0.3).abs() < 1e-12);
        assert_eq!(misclassification_probability(&[]), 1.0);
    }

    #[test]
    fn thresholds_from_result() {
        let result = ThresholdResult {
            threshold_auto: 0.2,
            threshold_escalate: 0.6,
            youden_auto: 0.8,
            youden_escalate: 0.5,
            n_samples: 10,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(
            DecisionThresholds::from(&result),
            DecisionThresholds {
                auto: 0.2,
                escalate: 0.6
            }
        );
    }

    fn two_candidates() -> Vec<Candidate> {
        vec![Candidate::new("c1", "error_001"), Candidate::new("c2", "error_002")]
    }

    fn favouring(label: &str, bias: f64) -> ScoringSettings {
        let mut weights = Weights::default();
        weights.per_candidate_biases.insert(label.to_string(), bias);
        ScoringSettings {
            weights,
            temperature: None,
        }
    }

    const STRONG: Features = Features {
        ocr_confidence: 0.95,
        error_code_match: 0.90,
        cluster_prior: 0.85,
        rag_similarity: 0.88,
    };

    #[test]
    fn clamp01_bounds() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.5), 0.5);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }

    #[test]
    fn raw_score_applies_weights() {
        let features = Features {
            ocr_confidence: 1.0,
            ..Default::default()
        };
        let weights = Weights {
            w1: 0.3,
            w2: 0.2,
            w3: 0.1,
            w4: 0.4,
            ..Default::default()
        };
        assert!((weights.raw_score(&features, "test_label") - 0.3).abs() < 1e-12);
    }

    #[test]
    fn raw_score_uses_label_bias() {
        let features = Features {
            ocr_confidence: 0.5,
            error_code_match: 0.5,
            cluster_prior: 0.5,
            rag_similarity: 0.5,
        };
        let mut weights = Weights {
            w1: 0.25,
            w2: 0.25,
            w3: 0.25,
            w4: 0.25,
            ..Default::default()
        };
        weights.per_candidate_biases.insert("error_001".into(), 0.1);
        weights.per_candidate_biases.insert("error_002".into(), -0.1);
        assert!((weights.raw_score(&features, "error_001") - 0.6).abs() < 1e-12);
        assert!((weights.raw_score(&features, "error_002") - 0.4).abs() < 1e-12);
        assert!((weights.raw_score(&features, "other") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn confident_request_auto_resolves() {
        let result = score_candidates(
            &two_candidates(),
            &STRONG,
            &favouring("error_001", 2.0),
            &DecisionThresholds::default(),
        )
        .unwrap();
        assert_eq!(result.decision, Decision::AutoResolve);
        assert_eq!(result.top_candidate.id, "c1");
        assert!(result.top_probability > 0.75);
        assert!(result.misclassification_probability < 0.15);
        assert_eq!(result.scores.len(), 2);
        let total: f64 = result.scores.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((result.top_score - (0.901 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn medium_confidence_asks() {
        let features = Features {
            ocr_confidence: 0.70,
            error_code_match: 0.65,
            cluster_prior: 0.60,
            rag_similarity: 0.55,
        };
        let result = score_candidates(
            &two_candidates(),
            &features,
            &favouring("error_002", 1.0),
            &DecisionThresholds::default(),
        )
        .unwrap();
        assert_eq!(result.decision, Decision::AskClarification);
        assert_eq!(result.top_candidate.id, "c2");
        assert!(result.misclassification_probability >= 0.15);
        assert!(result.misclassification_probability < 0.50);
    }

    #[test]
    fn rag_miss_escalates_confident_request() {
        let features = Features {
            rag_similarity: 0.05,
            ..STRONG
        };
        let result = score_candidates(
            &two_candidates(),
            &features,
            &favouring("error_001", 2.0),
            &DecisionThresholds::default(),
        )
        .unwrap();
        assert_eq!(result.decision, Decision::Escalate);
        assert!(result.safety_flags.rag_miss);

        let features = Features {
            rag_similarity: 0.15,
            ..STRONG
        };
        let result = score_candidates(
            &two_candidates(),
            &features,
            &ScoringSettings::default(),
            &DecisionThresholds::default(),
        )
        .unwrap();
        assert!(!result.safety_flags.rag_miss);
    }

    #[test]
    fn unknown_top_candidate_escalates() {
        let candidates = vec![Candidate::new("c1", UNKNOWN_LABEL), Candidate::new("c2", "error_002")];
        let features = Features {
            ocr_confidence: 0.95,
            error_code_match: 0.05,
            cluster_prior: 0.50,
            rag_similarity: 0.50,
        };
        let result = score_candidates(
            &candidates,
            &features,
            &favouring(UNKNOWN_LABEL, 3.0),
            &DecisionThresholds::default(),
        )
        .unwrap();
        assert_eq!(result.top_candidate.label, UNKNOWN_LABEL);
        assert_eq!(result.decision, Decision::Escalate);
        assert!(result.safety_flags.unknown_error);
    }

    #[test]
    fn tie_picks_first_candidate() {
        let result = score_candidates(
            &two_candidates(),
            &STRONG,
            &ScoringSettings::default(),
            &DecisionThresholds::default(),
        )
        .unwrap();
        assert_eq!(result.top_candidate.id, "c1");
        assert!((result.misclassification_probability - 0.5).abs() < 1e-12);
        assert_eq!(result.decision, Decision::Escalate);
    }

    #[test]
    fn out_of_range_features_are_clamped() {
        let wild = Features {
            ocr_confidence: 1.5,
            error_code_match: -0.1,
            cluster_prior: 0.5,
            rag_similarity: 0.8,
        };
        let tame = Features {
            ocr_confidence: 1.0,
            error_code_match: 0.0,
            ..wild
        };
        let settings = favouring("error_001", 0.5);
        let t = DecisionThresholds::default();
        let a = score_candidates(&two_candidates(), &wild, &settings, &t).unwrap();
        let b = score_candidates(&two_candidates(), &tame, &settings, &t).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a.top_probability));
    }

    #[test]
    fn temperature_softens_distribution() {
        let plain = favouring("error_001", 2.0);
        let softened = ScoringSettings {
            temperature: Some(4.0),
            ..plain.clone()
        };
        let t = DecisionThresholds::default();
        let a = score_candidates(&two_candidates(), &STRONG, &plain, &t).unwrap();
        let b = score_candidates(&two_candidates(), &STRONG, &softened, &t).unwrap();
        assert!(b.top_probability < a.top_probability);
        assert_eq!(a.top_score, b.top_score);
        assert_eq!(b.top_candidate.id, "c1");
    }

    #[test]
    fn three_candidates_scored_independently() {
        let candidates = vec![
            Candidate::new("c1", "error_001"),
            Candidate::new("c2", "error_002"),
            Candidate::new("c3", "error_003"),
        ];
        let result = score_candidates(
            &candidates,
            &STRONG,
            &ScoringSettings::default(),
            &DecisionThresholds::default(),
        )
        .unwrap();
        let ids: Vec<&str> = result.scores.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
    }

    #[test]
    fn scoring_rejects_bad_settings() {
        let t = DecisionThresholds::default();
        assert_eq!(
            score_candidates(&[], &STRONG, &ScoringSettings::default(), &t).unwrap_err(),
            ScoringError::NoCandidates
        );
        let cold = ScoringSettings {
            temperature: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            score_candidates(&two_candidates(), &STRONG, &cold, &t).unwrap_err(),
            ScoringError::InvalidTemperature(0.0)
        );
        let nan_bias = favouring("error_001", f64::NAN);
        assert!(matches!(
            score_candidates(&two_candidates(), &STRONG, &nan_bias, &t),
            Err(ScoringError::NonFiniteWeight { .. })
        ));
    }

    #[test]
    fn decision_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&Decision::AskClarification).unwrap(),
            "\"ASK_CLARIFICATION\""
        );
        assert_eq!(Decision::AutoResolve.to_string(), "AUTO_RESOLVE");
    }
}
