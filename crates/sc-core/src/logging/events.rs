//! Structured event definitions for logging.
//!
//! Every JSONL line written by [`super::JsonlLayer`] deserializes into a
//! [`LogEvent`]. Correlation data (run id, model version, stage) is lifted
//! to the top level; everything else lands in `fields`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of a calibration batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading input arrays.
    Load,
    /// Temperature / Platt fitting and ECE.
    Calibrate,
    /// Threshold search and ROC analysis.
    Optimize,
    /// Routing individual predictions.
    Decide,
    /// Writing the result payload.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Calibrate => "calibrate",
            Stage::Optimize => "optimize",
            Stage::Decide => "decide",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Stage::Init),
            "load" => Ok(Stage::Load),
            "calibrate" => Ok(Stage::Calibrate),
            "optimize" => Ok(Stage::Optimize),
            "decide" => Ok(Stage::Decide),
            "report" => Ok(Stage::Report),
            _ => Err(format!("unknown stage: {}", s)),
        }
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Load stage
    pub const INPUT_LOADED: &str = "load.input_loaded";
    pub const INPUT_INVALID: &str = "load.input_invalid";

    // Calibrate stage
    pub const CALIBRATE_STARTED: &str = "calibrate.started";
    pub const CALIBRATE_FINISHED: &str = "calibrate.finished";

    // Optimize stage
    pub const OPTIMIZE_STARTED: &str = "optimize.started";
    pub const OPTIMIZE_FINISHED: &str = "optimize.finished";

    // Decide stage
    pub const SCORE_FINISHED: &str = "decide.scored";
    pub const DECIDE_FINISHED: &str = "decide.finished";

    // Report stage
    pub const REPORT_WRITTEN: &str = "report.written";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// A structured log event as written to JSONL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,

    /// Event name (e.g., "run.started"); the tracing target.
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Model version being calibrated, when the run names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    #[serde(default)]
    pub message: String,

    /// Additional structured fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: Level, event: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: None,
            model_version: None,
            stage: None,
            message: message.into(),
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation data shared by every event of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct LogContext {
    pub run_id: String,
    pub model_version: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            model_version: None,
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    /// Model version for log fields, `-` when unset.
    pub fn model_version_or_dash(&self) -> &str {
        self.model_version.as_deref().unwrap_or("-")
    }

    /// Build an event carrying this context.
    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        let mut e = LogEvent::new(level, event, message).with_stage(stage);
        e.run_id = Some(self.run_id.clone());
        e.model_version.clone_from(&self.model_version);
        e
    }

    pub fn info(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }
}
