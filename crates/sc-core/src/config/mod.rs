//! Configuration loading and validation.
//!
//! This module handles:
//! - Loading `calibration.json`
//! - Config resolution order (CLI > env > config dir > XDG > defaults)
//! - Schema checks via serde plus a schema-version gate
//! - Semantic validation (search range, bin count, threshold bounds)
//! - A provenance snapshot (path, source, SHA-256) for result payloads

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::calibrate::{PlattSettings, TemperatureSearch};
use crate::decision::{DecisionThresholds, ScoringSettings};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Default XDG config directory name.
pub const CONFIG_DIR_NAME: &str = "score_calibration";

/// File name looked up inside a config directory.
pub const CONFIG_FILE_NAME: &str = "calibration.json";

/// Env var naming a config file.
pub const ENV_CONFIG_PATH: &str = "SC_CONFIG";

/// Env var naming a config directory.
pub const ENV_CONFIG_DIR: &str = "SC_CONFIG_DIR";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound { .. } => 50,
            ConfigError::ParseError { .. } => 51,
            ConfigError::IoError { .. } => 52,
            ConfigError::VersionMismatch { .. } => 53,
            ConfigError::Invalid { .. } => 54,
        }
    }
}

/// Tunables for a calibration batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub schema_version: String,
    /// Temperature grid for `fit-temperature`.
    pub temperature: TemperatureSearch,
    /// Bin count for ECE and reliability curves.
    pub ece_bins: usize,
    /// ECE below which a model is reported as well calibrated.
    pub well_calibrated_ece: f64,
    /// Thresholds used by `decide` when none are supplied.
    pub decision: DecisionThresholds,
    pub platt: PlattSettings,
    /// Feature weights and temperature used by `score`.
    pub scoring: ScoringSettings,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            temperature: TemperatureSearch::default(),
            ece_bins: 10,
            well_calibrated_ece: 0.05,
            decision: DecisionThresholds::default(),
            platt: PlattSettings::default(),
            scoring: ScoringSettings::default(),
        }
    }
}

fn in_unit_interval(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl ScoringConfig {
    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::VersionMismatch {
                expected: CONFIG_SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }
        self.temperature
            .validate()
            .map_err(|e| ConfigError::Invalid {
                field: "temperature",
                message: e.to_string(),
            })?;
        if self.ece_bins == 0 {
            return Err(ConfigError::Invalid {
                field: "ece_bins",
                message: "must be at least 1".to_string(),
            });
        }
        if !in_unit_interval(self.well_calibrated_ece) {
            return Err(ConfigError::Invalid {
                field: "well_calibrated_ece",
                message: format!("{} is outside [0, 1]", self.well_calibrated_ece),
            });
        }
        for (field, value) in [
            ("decision.auto", self.decision.auto),
            ("decision.escalate", self.decision.escalate),
        ] {
            if !in_unit_interval(value) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("{} is outside [0, 1]", value),
                });
            }
        }
        if !(self.platt.tolerance.is_finite() && self.platt.tolerance > 0.0) {
            return Err(ConfigError::Invalid {
                field: "platt.tolerance",
                message: format!("{} must be positive", self.platt.tolerance),
            });
        }
        self.scoring.validate().map_err(|e| ConfigError::Invalid {
            field: "scoring",
            message: e.to_string(),
        })?;
        Ok(())
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    EnvPath,
    ConfigDir,
    Xdg,
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfigSource::Cli => "cli",
            ConfigSource::EnvPath => "env_path",
            ConfigSource::ConfigDir => "config_dir",
            ConfigSource::Xdg => "xdg",
            ConfigSource::Defaults => "defaults",
        };
        write!(f, "{}", s)
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ScoringConfig,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 of the config file content (None if using defaults).
    pub hash: Option<String>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            path: self.path.clone(),
            hash: self.hash.clone(),
            source: self.source,
            schema_version: self.config.schema_version.clone(),
        }
    }
}

/// Provenance record attached to result payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub path: Option<PathBuf>,
    pub hash: Option<String>,
    pub source: ConfigSource,
    pub schema_version: String,
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority; must exist).
    pub config_path: Option<PathBuf>,
    /// Explicit config directory.
    pub config_dir: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit file (`--config`)
/// 2. `SC_CONFIG` file path
/// 3. Explicit directory, else `SC_CONFIG_DIR`, joined with `calibration.json`
/// 4. XDG config home (`~/.config/score_calibration/calibration.json`)
/// 5. Built-in defaults
///
/// Only an explicit `--config` path is required to exist; the other
/// locations are skipped when absent.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(options: &ConfigOptions, env: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = &options.config_path {
        if !path.exists() {
            return Err(ConfigError::NotFound { path: path.clone() });
        }
        return resolved_from_file(path, ConfigSource::Cli);
    }

    for (candidate, source) in candidate_paths(options, &env) {
        if candidate.exists() {
            return resolved_from_file(&candidate, source);
        }
    }

    Ok(ResolvedConfig {
        config: ScoringConfig::default(),
        path: None,
        hash: None,
        source: ConfigSource::Defaults,
    })
}

fn candidate_paths<F>(options: &ConfigOptions, env: &F) -> Vec<(PathBuf, ConfigSource)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates = Vec::new();
    if let Some(path) = env(ENV_CONFIG_PATH) {
        candidates.push((PathBuf::from(path), ConfigSource::EnvPath));
    }
    let dir = options
        .config_dir
        .clone()
        .or_else(|| env(ENV_CONFIG_DIR).map(PathBuf::from));
    if let Some(dir) = dir {
        candidates.push((dir.join(CONFIG_FILE_NAME), ConfigSource::ConfigDir));
    }
    let xdg = env("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir);
    if let Some(xdg) = xdg {
        candidates.push((
            xdg.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            ConfigSource::Xdg,
        ));
    }
    candidates
}

fn resolved_from_file(path: &Path, source: ConfigSource) -> Result<ResolvedConfig, ConfigError> {
    let (config, hash) = load_config_from_file(path)?;
    Ok(ResolvedConfig {
        config,
        path: Some(path.to_path_buf()),
        hash: Some(hash),
        source,
    })
}

/// Load and validate a config file, returning it with its content hash.
pub fn load_config_from_file(path: &Path) -> Result<(ScoringConfig, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let hash = compute_hash(&content);

    let config: ScoringConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    config.validate()?;
    Ok((config, hash))
}

/// Hex SHA-256 of `content`.
pub fn compute_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
