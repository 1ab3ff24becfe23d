//! Tests for config file resolution and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MESHWD_CONFIG are marked with #[serial].

use meshwd_common::config::{
    load_toml_config, resolve_config_path, ConfigSource, TomlConfig, CONFIG_ENV_VAR,
};
use meshwd_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_path_overrides_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_falls_back_to_default_location() {
    env::set_var(CONFIG_ENV_VAR, "  ");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, meshwd_common::config::default_config_path());

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_no_path_yields_defaults() {
    let config = load_toml_config(None).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_existing_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[reconcile]\nthreshold = 90.0\nlanguage = \"fr\"").unwrap();

    let config = load_toml_config(Some(file.path())).unwrap();
    assert_eq!(config.reconcile.threshold, Some(90.0));
    assert_eq!(config.reconcile.language.as_deref(), Some("fr"));
}

#[test]
fn test_malformed_file_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "this is = = not toml").unwrap();

    let result = load_toml_config(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_config_source_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let source = ConfigSource::detect(Some(&path));
    assert_eq!(source, ConfigSource::Missing(path.clone()));
    assert!(source.uses_defaults());
    assert_eq!(ConfigSource::detect(None), ConfigSource::NoConfigDir);
}

#[test]
fn test_config_source_reports_loaded_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meshwd.toml");
    std::fs::write(&path, "contact = \"ops@example.org\"\n").unwrap();

    let source = ConfigSource::detect(Some(&path));
    assert_eq!(source, ConfigSource::File(path.clone()));
    assert!(!source.uses_defaults());
}
