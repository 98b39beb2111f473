use std::path::PathBuf;

use boxctl_config::{Config, ConfigError};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(dir.path().join("absent.yaml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_missing_file_is_an_error_for_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::IoError(_)));
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boxctl.yaml");
    std::fs::write(&path, "namespace: [unterminated\n").unwrap();

    let err = Config::load_or_default(&path).unwrap_err();
    match err {
        ConfigError::YamlError { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected YAML error, got {other:?}"),
    }
}

#[test]
fn test_wrong_type_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boxctl.yaml");
    std::fs::write(&path, "debug: maybe\n").unwrap();

    assert!(Config::load(&path).is_err());
}

#[test]
fn test_file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boxctl.yaml");
    std::fs::write(&path, "data_root: /srv/boxctl\nsnapshotter: stargz\n").unwrap();

    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config.data_root, PathBuf::from("/srv/boxctl"));
    assert_eq!(config.snapshotter, "stargz");
    assert_eq!(config.namespace, "default");
}
