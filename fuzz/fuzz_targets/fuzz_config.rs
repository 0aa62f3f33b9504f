//! Fuzz target for calibration.json parsing.
//!
//! Tests that config parsing and validation handle arbitrary input
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sc_core::config::ScoringConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<ScoringConfig>(data) {
        let _ = config.validate();
    }
});
