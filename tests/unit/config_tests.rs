//! Layered configuration loading.

use skillctl::config::Config;
use tempfile::tempdir;

#[test]
fn explicit_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(
        &path,
        "[budget]\nmanifest_tokens = 100\n\n[sync]\nconcurrency = 9\n",
    )
    .unwrap();

    let config = Config::load(Some(&path), dir.path()).unwrap();
    assert_eq!(config.budget.manifest_tokens, 100);
    assert_eq!(config.budget.total_tokens, 15_000);
    assert_eq!(config.sync.concurrency, 9);
    assert_eq!(config.sync.max_attempts, 3);
}

#[test]
fn missing_explicit_file_means_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load(Some(&dir.path().join("absent.toml")), dir.path()).unwrap();
    assert_eq!(config.budget.manifest_tokens, 5000);
    assert_eq!(config.sync.backoff_ms, 250);
    assert!((config.dedup.threshold - 0.5).abs() < f32::EPSILON);
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[budget\nmanifest_tokens = ").unwrap();
    let err = Config::load(Some(&path), dir.path()).unwrap_err();
    assert_eq!(err.code(), "config_error");
}
