//! Result payloads and their renderings.
//!
//! Every command produces one report type. Reports serialize to JSON and
//! also render as a Markdown table or a one-line summary.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::calibrate::{CalibrationCurve, CalibrationFit, CalibrationQuality, PlattFit};
use crate::config::{ConfigSnapshot, ScoringConfig};
use crate::decision::{Decision, DecisionThresholds, ScoringResult};
use crate::threshold::{RocCurve, ThresholdResult};

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// Human-readable Markdown
    Md,
    /// One-line summary for quick status checks
    Summary,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Md => write!(f, "md"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}

/// A report that can be written in any [`OutputFormat`].
pub trait Render: Serialize {
    fn markdown(&self) -> String;
    fn summary(&self) -> String;
}

/// Render `report` in `format`.
pub fn render<T: Render>(report: &T, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Md => Ok(report.markdown()),
        OutputFormat::Summary => Ok(report.summary()),
    }
}

fn table(rows: &[(&str, String)]) -> String {
    let mut out = String::from("| Metric | Value |\n|---|---|\n");
    for (name, value) in rows {
        out.push_str(&format!("| {} | {} |\n", name, value));
    }
    out
}

/// `fit-temperature` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReport {
    pub samples: usize,
    pub candidates: usize,
    #[serde(flatten)]
    pub fit: CalibrationFit,
    /// Top-class ECE at T = 1: the winning probability of each sample is
    /// binned against whether the winner is the true index. Binning the
    /// true-class probability against all-ones labels would only measure
    /// `1 - mean(p_true)` and grows as the temperature softens.
    pub ece_before: f64,
    /// Top-class ECE at the fitted temperature.
    pub ece_after: f64,
    pub quality: CalibrationQuality,
}

impl Render for TemperatureReport {
    fn markdown(&self) -> String {
        let mut out = String::from("## Temperature scaling\n\n");
        out.push_str(&table(&[
            ("samples", self.samples.to_string()),
            ("candidates", self.candidates.to_string()),
            ("temperature", format!("{:.4}", self.fit.temperature)),
            ("nll_before", format!("{:.6}", self.fit.nll_before)),
            ("nll_after", format!("{:.6}", self.fit.nll_after)),
            ("improvement", format!("{:.6}", self.fit.improvement)),
            ("ece_before", format!("{:.4}", self.ece_before)),
            ("ece_after", format!("{:.4}", self.ece_after)),
            ("quality", self.quality.to_string()),
        ]));
        out
    }

    fn summary(&self) -> String {
        format!(
            "T={:.4} nll {:.4} -> {:.4} (ece {:.4} -> {:.4}, {})",
            self.fit.temperature,
            self.fit.nll_before,
            self.fit.nll_after,
            self.ece_before,
            self.ece_after,
            self.quality
        )
    }
}

/// `ece` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EceReport {
    pub samples: usize,
    pub ece: f64,
    pub mce: f64,
    pub quality: CalibrationQuality,
    pub well_calibrated: bool,
    pub curve: CalibrationCurve,
}

impl EceReport {
    pub fn new(samples: usize, curve: CalibrationCurve, well_calibrated_ece: f64) -> Self {
        Self {
            samples,
            ece: curve.ece,
            mce: curve.mce,
            quality: CalibrationQuality::from_ece(curve.ece),
            well_calibrated: curve.ece < well_calibrated_ece,
            curve,
        }
    }
}

impl Render for EceReport {
    fn markdown(&self) -> String {
        let mut out = String::from("## Expected calibration error\n\n");
        out.push_str(&table(&[
            ("samples", self.samples.to_string()),
            ("ece", format!("{:.4}", self.ece)),
            ("mce", format!("{:.4}", self.mce)),
            ("quality", self.quality.to_string()),
        ]));
        out.push_str("\n| Bin | Count | Confidence | Accuracy | Gap |\n|---|---|---|---|---|\n");
        for bin in self.curve.bins.iter().filter(|b| b.count > 0) {
            out.push_str(&format!(
                "| [{:.2}, {:.2}] | {} | {:.4} | {:.4} | {:.4} |\n",
                bin.lower, bin.upper, bin.count, bin.mean_confidence, bin.accuracy, bin.error
            ));
        }
        out.push_str("\n```\n");
        out.push_str(&self.curve.ascii_curve(40, 10));
        out.push_str("```\n");
        out
    }

    fn summary(&self) -> String {
        format!(
            "ece={:.4} mce={:.4} bins={} ({})",
            self.ece, self.mce, self.curve.num_bins, self.quality
        )
    }
}

/// `platt` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlattReport {
    pub samples: usize,
    #[serde(flatten)]
    pub fit: PlattFit,
}

impl Render for PlattReport {
    fn markdown(&self) -> String {
        let mut out = String::from("## Platt scaling\n\n");
        out.push_str(&table(&[
            ("samples", self.samples.to_string()),
            ("a", format!("{:.6}", self.fit.a)),
            ("b", format!("{:.6}", self.fit.b)),
            ("loss", format!("{:.6}", self.fit.loss)),
            ("iterations", self.fit.iterations.to_string()),
            ("converged", self.fit.converged.to_string()),
        ]));
        out
    }

    fn summary(&self) -> String {
        format!(
            "a={:.4} b={:.4} loss={:.4}{}",
            self.fit.a,
            self.fit.b,
            self.fit.loss,
            if self.fit.converged { "" } else { " (not converged)" }
        )
    }
}

/// `optimize-thresholds` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    #[serde(flatten)]
    pub result: ThresholdResult,
    pub auc: f64,
    /// Whether the auto threshold sits at or below the escalate threshold.
    pub ordered: bool,
}

impl ThresholdReport {
    pub fn new(result: ThresholdResult, auc: f64) -> Self {
        let ordered = result.threshold_auto <= result.threshold_escalate;
        Self {
            result,
            auc,
            ordered,
        }
    }
}

impl Render for ThresholdReport {
    fn markdown(&self) -> String {
        let r = &self.result;
        let mut out = String::from("## Decision thresholds\n\n");
        out.push_str(&table(&[
            ("n_samples", r.n_samples.to_string()),
            ("threshold_auto", format!("{:.4}", r.threshold_auto)),
            ("youden_auto", format!("{:.4}", r.youden_auto)),
            ("threshold_escalate", format!("{:.4}", r.threshold_escalate)),
            ("youden_escalate", format!("{:.4}", r.youden_escalate)),
            ("auc", format!("{:.4}", self.auc)),
            ("timestamp", r.timestamp.clone()),
        ]));
        if !self.ordered {
            out.push_str("\nNote: auto threshold exceeds escalate threshold.\n");
        }
        out
    }

    fn summary(&self) -> String {
        format!(
            "auto={:.4} (J={:.3}) escalate={:.4} (J={:.3}) auc={:.4} n={}",
            self.result.threshold_auto,
            self.result.youden_auto,
            self.result.threshold_escalate,
            self.result.youden_escalate,
            self.auc,
            self.result.n_samples
        )
    }
}

/// `roc` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocReport {
    pub auc: f64,
    pub curve: RocCurve,
}

impl Render for RocReport {
    fn markdown(&self) -> String {
        let mut out = format!("## ROC curve (AUC {:.4})\n\n", self.auc);
        out.push_str("| Threshold | TPR | FPR |\n|---|---|---|\n");
        for p in self.curve.points() {
            out.push_str(&format!("| {:.4} | {:.4} | {:.4} |\n", p.threshold, p.tpr, p.fpr));
        }
        out
    }

    fn summary(&self) -> String {
        format!("auc={:.4} points={}", self.auc, self.curve.len())
    }
}

/// One routed prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    pub p_mis: f64,
    pub decision: Decision,
}

/// `decide` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub thresholds: DecisionThresholds,
    pub auto_resolve: usize,
    pub ask_clarification: usize,
    pub escalate: usize,
    pub decisions: Vec<DecisionRow>,
}

impl DecisionReport {
    pub fn new(thresholds: DecisionThresholds, decisions: Vec<DecisionRow>) -> Self {
        let count = |d: Decision| decisions.iter().filter(|r| r.decision == d).count();
        Self {
            thresholds,
            auto_resolve: count(Decision::AutoResolve),
            ask_clarification: count(Decision::AskClarification),
            escalate: count(Decision::Escalate),
            decisions,
        }
    }
}

impl Render for DecisionReport {
    fn markdown(&self) -> String {
        let mut out = String::from("## Decisions\n\n");
        out.push_str(&table(&[
            ("auto threshold", format!("{:.4}", self.thresholds.auto)),
            ("escalate threshold", format!("{:.4}", self.thresholds.escalate)),
            ("AUTO_RESOLVE", self.auto_resolve.to_string()),
            ("ASK_CLARIFICATION", self.ask_clarification.to_string()),
            ("ESCALATE", self.escalate.to_string()),
        ]));
        out
    }

    fn summary(&self) -> String {
        format!(
            "auto={} ask={} escalate={}",
            self.auto_resolve, self.ask_clarification, self.escalate
        )
    }
}

/// `score` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub thresholds: DecisionThresholds,
    pub temperature: Option<f64>,
    pub auto_resolve: usize,
    pub ask_clarification: usize,
    pub escalate: usize,
    pub results: Vec<ScoringResult>,
}

impl ScoreReport {
    pub fn new(
        thresholds: DecisionThresholds,
        temperature: Option<f64>,
        results: Vec<ScoringResult>,
    ) -> Self {
        let count = |d: Decision| results.iter().filter(|r| r.decision == d).count();
        Self {
            thresholds,
            temperature,
            auto_resolve: count(Decision::AutoResolve),
            ask_clarification: count(Decision::AskClarification),
            escalate: count(Decision::Escalate),
            results,
        }
    }
}

impl Render for ScoreReport {
    fn markdown(&self) -> String {
        let mut out = String::from("## Scored requests\n\n");
        out.push_str("| # | Top | p_top | p_mis | Decision |\n");
        out.push_str("|---|-----|-------|-------|----------|\n");
        for (i, r) in self.results.iter().enumerate() {
            out.push_str(&format!(
                "| {} | {} | {:.4} | {:.4} | {} |\n",
                i, r.top_candidate.id, r.top_probability, r.misclassification_probability, r.decision
            ));
        }
        out
    }

    fn summary(&self) -> String {
        format!(
            "scored={} auto={} ask={} escalate={}",
            self.results.len(),
            self.auto_resolve,
            self.ask_clarification,
            self.escalate
        )
    }
}

/// `config` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigReport {
    pub snapshot: ConfigSnapshot,
    pub config: ScoringConfig,
}

impl Render for ConfigReport {
    fn markdown(&self) -> String {
        let mut out = String::from("## Configuration\n\n");
        out.push_str(&table(&[
            ("source", self.snapshot.source.to_string()),
            (
                "path",
                self.snapshot
                    .path
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            ),
            ("sha256", self.snapshot.hash.clone().unwrap_or_else(|| "-".to_string())),
            ("schema_version", self.config.schema_version.clone()),
            (
                "temperature grid",
                format!(
                    "[{}, {}] x {}",
                    self.config.temperature.min, self.config.temperature.max, self.config.temperature.steps
                ),
            ),
            ("ece_bins", self.config.ece_bins.to_string()),
            ("decision.auto", self.config.decision.auto.to_string()),
            ("decision.escalate", self.config.decision.escalate.to_string()),
        ]));
        out
    }

    fn summary(&self) -> String {
        format!("config from {}", self.snapshot.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::optimize_thresholds_at;
    use chrono::{TimeZone, Utc};

    fn threshold_report() -> ThresholdReport {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let result = optimize_thresholds_at(&[0.1, 0.2, 0.7, 0.9], &[1, 1, 0, 0], at).unwrap();
        ThresholdReport::new(result, 1.0)
    }

    #[test]
    fn json_flattens_result() {
        let json = render(&threshold_report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["n_samples"], 4);
        assert_eq!(value["auc"], 1.0);
        assert_eq!(value["timestamp"], "2024-06-01T00:00:00Z");
    }

    #[test]
    fn markdown_and_summary() {
        let report = threshold_report();
        let md = render(&report, OutputFormat::Md).unwrap();
        assert!(md.contains("| threshold_auto |"));
        let summary = render(&report, OutputFormat::Summary).unwrap();
        assert!(summary.starts_with("auto="));
        assert!(!summary.contains('\n'));
    }

    #[test]
    fn unordered_thresholds_are_flagged() {
        let mut report = threshold_report();
        report.result.threshold_auto = 0.9;
        report.result.threshold_escalate = 0.1;
        let report = ThresholdReport::new(report.result, report.auc);
        assert!(!report.ordered);
        assert!(report.markdown().contains("exceeds"));
    }

    #[test]
    fn decision_counts() {
        let rows = vec![
            DecisionRow {
                p_mis: 0.05,
                decision: Decision::AutoResolve,
            },
            DecisionRow {
                p_mis: 0.3,
                decision: Decision::AskClarification,
            },
            DecisionRow {
                p_mis: 0.8,
                decision: Decision::Escalate,
            },
            DecisionRow {
                p_mis: 0.9,
                decision: Decision::Escalate,
            },
        ];
        let report = DecisionReport::new(DecisionThresholds::default(), rows);
        assert_eq!(report.auto_resolve, 1);
        assert_eq!(report.ask_clarification, 1);
        assert_eq!(report.escalate, 2);
        assert_eq!(report.summary(), "auto=1 ask=1 escalate=2");
    }

    #[test]
    fn score_report_counts() {
        use crate::decision::{score_candidates, Candidate, Features, ScoringSettings};

        let candidates = [Candidate::new("c1", "E1"), Candidate::new("c2", "E2")];
        let thresholds = DecisionThresholds::default();
        let settings = ScoringSettings::default();
        let miss = Features {
            rag_similarity: 0.0,
            ..Default::default()
        };
        let result = score_candidates(&candidates, &miss, &settings, &thresholds).unwrap();
        let report = ScoreReport::new(thresholds, None, vec![result.clone(), result]);
        assert_eq!(report.escalate, 2);
        assert_eq!(report.summary(), "scored=2 auto=0 ask=0 escalate=2");
        assert!(report.markdown().contains("| 1 | c1 | 0.5000 | 0.5000 | ESCALATE |"));
    }

    #[test]
    fn ece_report_grades() {
        let curve = CalibrationCurve::from_probabilities(&[0.9, 0.9], &[1u8, 0], 10).unwrap();
        let report = EceReport::new(2, curve, 0.05);
        assert!(!report.well_calibrated);
        assert_eq!(report.quality, CalibrationQuality::Poor);
        assert!(report.markdown().contains("Reliability"));
    }

    #[test]
    fn format_display() {
        assert_eq!(OutputFormat::Md.to_string(), "md");
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
    }
}
