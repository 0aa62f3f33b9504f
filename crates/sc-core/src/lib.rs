//! Score Calibration Core Library
//!
//! This library provides the core functionality for score calibration:
//! - Temperature scaling, Platt scaling and Expected Calibration Error
//! - Youden-optimal decision thresholds, ROC curves and AUC
//! - Three-way routing of predictions against those thresholds
//! - Exit codes, configuration loading and structured logging
//!
//! The binary entry point is in `main.rs`.

pub mod calibrate;
pub mod config;
pub mod decision;
pub mod exit_codes;
pub mod logging;
pub mod output;
pub mod threshold;
