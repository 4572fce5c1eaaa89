//! Config file loading from disk

#![allow(clippy::unwrap_used, clippy::panic)]

use hearth_config::{Config, EncryptionBackend};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_resolves_paths_against_config_dir() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(
        &path,
        "[general]\nrepo = \"repo.git\"\n\n[encryption]\nbackend = \"none\"\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.repo_dir().unwrap(), temp.path().join("repo.git"));
    assert_eq!(config.encryption.backend, EncryptionBackend::None);
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let result = Config::load_or_default(Some(&temp.path().join("absent.toml")));
    assert!(result.is_err());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "[general\nrepo = ").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_identity_file_from_config() {
    let temp = TempDir::new().unwrap();
    let identity = hearth_crypto::Identity::generate();
    fs::write(temp.path().join("key.txt"), format!("{identity}\n")).unwrap();

    let path = temp.path().join("config.toml");
    fs::write(&path, "[encryption]\nidentity = \"key.txt\"\n").unwrap();

    let config = Config::load(&path).unwrap();
    let identities = config.encryption.age_identities().unwrap();
    assert_eq!(identities.len(), 1);
}

#[test]
fn test_missing_identity_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "[encryption]\nidentity = \"missing.txt\"\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert!(config.encryption.age_identities().is_err());
}
