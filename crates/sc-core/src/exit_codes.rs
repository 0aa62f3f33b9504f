//! Exit codes for the sc-core CLI.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/input errors (recoverable by fixing the invocation or data)
//! - 20-29: Internal errors (bugs, should be reported)

use crate::calibrate::CalibrationError;
use crate::config::ConfigError;
use crate::decision::ScoringError;
use crate::threshold::ThresholdError;

/// Exit codes for sc-core operations.
///
/// These codes are a stable contract for batch automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// Invalid arguments
    ArgsError = 10,

    /// Input file missing or not parseable
    InputError = 11,

    /// Input parsed but rejected by validation (empty arrays, bad labels, shapes)
    ValidationError = 12,

    /// Configuration file missing, unparseable, or invalid
    ConfigError = 13,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error while writing output
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Codes 20-29.
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::ValidationError => "ERR_VALIDATION",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&CalibrationError> for ExitCode {
    fn from(_: &CalibrationError) -> Self {
        ExitCode::ValidationError
    }
}

impl From<&ThresholdError> for ExitCode {
    fn from(_: &ThresholdError) -> Self {
        ExitCode::ValidationError
    }
}

impl From<&ScoringError> for ExitCode {
    fn from(_: &ScoringError) -> Self {
        ExitCode::ValidationError
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(_: &ConfigError) -> Self {
        ExitCode::ConfigError
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
