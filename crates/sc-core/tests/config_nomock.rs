//! No-mock integration tests for configuration resolution.
//!
//! Real files in temporary directories; the environment is injected so tests
//! never read the developer's own config.

use std::fs;
use std::path::Path;

use sc_core::config::{
    compute_hash, load_config_from_file, load_config_with, ConfigError, ConfigOptions,
    ConfigSource, ScoringConfig, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
};
use tempfile::tempdir;

const CUSTOM: &str = r#"{
  "schema_version": "1.0.0",
  "temperature": { "min": 0.5, "max": 3.0, "steps": 26 },
  "ece_bins": 15,
  "decision": { "auto": 0.2, "escalate": 0.6 }
}"#;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create config dir");
    }
    fs::write(path, content).expect("write config");
}

/// Environment that only knows `XDG_CONFIG_HOME`, pointed at `xdg`.
fn xdg_only(xdg: &Path) -> impl Fn(&str) -> Option<String> {
    let xdg = xdg.display().to_string();
    move |key: &str| (key == "XDG_CONFIG_HOME").then(|| xdg.clone())
}

#[test]
fn test_explicit_path_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.json");
    write(&path, CUSTOM);

    let options = ConfigOptions {
        config_path: Some(path.clone()),
        config_dir: None,
    };
    let resolved = load_config_with(&options, xdg_only(dir.path())).unwrap();

    assert_eq!(resolved.source, ConfigSource::Cli);
    assert_eq!(resolved.path.as_deref(), Some(path.as_path()));
    assert_eq!(resolved.hash.as_deref(), Some(compute_hash(CUSTOM).as_str()));
    assert_eq!(resolved.config.ece_bins, 15);
    assert_eq!(resolved.config.temperature.steps, 26);
    assert_eq!(resolved.config.decision.auto, 0.2);
}

#[test]
fn test_missing_explicit_path_is_an_error() {
    let dir = tempdir().unwrap();
    let options = ConfigOptions {
        config_path: Some(dir.path().join("absent.json")),
        config_dir: None,
    };
    let err = load_config_with(&options, xdg_only(dir.path())).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
    assert_eq!(err.code(), 50);
}

#[test]
fn test_env_path_beats_config_dir() {
    let dir = tempdir().unwrap();
    let env_file = dir.path().join("env.json");
    write(&env_file, CUSTOM);
    write(&dir.path().join("cfg").join(CONFIG_FILE_NAME), "{}");

    let env_value = env_file.display().to_string();
    let options = ConfigOptions {
        config_path: None,
        config_dir: Some(dir.path().join("cfg")),
    };
    let resolved = load_config_with(&options, move |key: &str| {
        (key == "SC_CONFIG").then(|| env_value.clone())
    })
    .unwrap();

    assert_eq!(resolved.source, ConfigSource::EnvPath);
    assert_eq!(resolved.config.ece_bins, 15);
}

#[test]
fn test_config_dir_then_xdg() {
    let dir = tempdir().unwrap();
    let xdg = dir.path().join("xdg");
    write(&xdg.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME), CUSTOM);

    let options = ConfigOptions {
        config_path: None,
        config_dir: Some(dir.path().join("empty")),
    };
    let resolved = load_config_with(&options, xdg_only(&xdg)).unwrap();
    assert_eq!(resolved.source, ConfigSource::Xdg);

    write(&dir.path().join("empty").join(CONFIG_FILE_NAME), "{}");
    let resolved = load_config_with(&options, xdg_only(&xdg)).unwrap();
    assert_eq!(resolved.source, ConfigSource::ConfigDir);
    assert_eq!(resolved.config, ScoringConfig::default());
}

#[test]
fn test_defaults_when_nothing_found() {
    let dir = tempdir().unwrap();
    let resolved = load_config_with(&ConfigOptions::default(), xdg_only(dir.path())).unwrap();

    assert_eq!(resolved.source, ConfigSource::Defaults);
    assert!(resolved.path.is_none());
    assert!(resolved.hash.is_none());
    assert_eq!(resolved.config, ScoringConfig::default());

    let snapshot = resolved.snapshot();
    assert_eq!(snapshot.source, ConfigSource::Defaults);
    assert_eq!(snapshot.schema_version, "1.0.0");
}

#[test]
fn test_rejected_files() {
    let dir = tempdir().unwrap();

    let broken = dir.path().join("broken.json");
    write(&broken, "{ not json");
    assert!(matches!(
        load_config_from_file(&broken),
        Err(ConfigError::ParseError { .. })
    ));

    let old = dir.path().join("old.json");
    write(&old, r#"{ "schema_version": "0.9.0" }"#);
    assert!(matches!(
        load_config_from_file(&old),
        Err(ConfigError::VersionMismatch { .. })
    ));

    let bins = dir.path().join("bins.json");
    write(&bins, r#"{ "ece_bins": 0 }"#);
    match load_config_from_file(&bins) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "ece_bins"),
        other => panic!("expected invalid ece_bins, got {other:?}"),
    }

    let range = dir.path().join("range.json");
    write(&range, r#"{ "temperature": { "min": 2.0, "max": 1.0 } }"#);
    match load_config_from_file(&range) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "temperature"),
        other => panic!("expected invalid temperature, got {other:?}"),
    }

    let threshold = dir.path().join("threshold.json");
    write(&threshold, r#"{ "decision": { "escalate": 1.5 } }"#);
    match load_config_from_file(&threshold) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "decision.escalate"),
        other => panic!("expected invalid decision.escalate, got {other:?}"),
    }

    let scoring = dir.path().join("scoring.json");
    write(&scoring, r#"{ "scoring": { "temperature": -1.0 } }"#);
    match load_config_from_file(&scoring) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "scoring"),
        other => panic!("expected invalid scoring, got {other:?}"),
    }
}

#[test]
fn test_scoring_weights_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weights.json");
    write(
        &path,
        r#"{ "scoring": { "weights": { "w1": 0.5, "per_candidate_biases": { "E42": 0.25 } }, "temperature": 2.0 } }"#,
    );
    let (config, _) = load_config_from_file(&path).unwrap();
    assert_eq!(config.scoring.weights.w1, 0.5);
    assert_eq!(config.scoring.weights.w2, 0.3);
    assert_eq!(config.scoring.weights.bias("E42"), 0.25);
    assert_eq!(config.scoring.weights.bias("E7"), 0.0);
    assert_eq!(config.scoring.temperature, Some(2.0));
}

#[test]
fn test_hash_tracks_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    write(&path, CUSTOM);
    let (_, first) = load_config_from_file(&path).unwrap();
    write(&path, &CUSTOM.replace("15", "20"));
    let (config, second) = load_config_from_file(&path).unwrap();

    assert_ne!(first, second);
    assert_eq!(config.ece_bins, 20);
    assert_eq!(first.len(), 64);
}
