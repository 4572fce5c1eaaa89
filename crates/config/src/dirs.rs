//! XDG directory utilities
//!
//! XDG-compliant directory paths for hearth, using the `xdg` crate:
//! - `XDG_CONFIG_HOME` defaults to ~/.config
//! - `XDG_DATA_HOME` defaults to ~/.local/share
//! - `XDG_STATE_HOME` defaults to ~/.local/state

use std::path::PathBuf;
use xdg::BaseDirectories;

/// Get the hearth config directory
///
/// Returns `$XDG_CONFIG_HOME/hearth` or `~/.config/hearth`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hearth").get_config_home()
}

/// Get the hearth data directory
///
/// Returns `$XDG_DATA_HOME/hearth` or `~/.local/share/hearth`
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hearth").get_data_home()
}

/// Get the hearth state directory
///
/// Returns `$XDG_STATE_HOME/hearth` or `~/.local/state/hearth`
#[must_use]
pub fn state_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hearth").get_state_home()
}

/// Default config file: `$XDG_CONFIG_HOME/hearth/config.toml`
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Default repository git dir: `$XDG_DATA_HOME/hearth/repo.git`
#[must_use]
pub fn default_repo_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("repo.git"))
}

/// Default manifest: `$XDG_STATE_HOME/hearth/manifest.toml`
#[must_use]
pub fn default_manifest_file() -> Option<PathBuf> {
    state_dir().map(|d| d.join("manifest.toml"))
}

/// Default age identity: `$XDG_CONFIG_HOME/hearth/key.txt`
#[must_use]
pub fn default_age_identity() -> Option<PathBuf> {
    config_dir().map(|d| d.join("key.txt"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_dirs_are_prefixed() {
        for dir in [config_dir(), data_dir(), state_dir()].into_iter().flatten() {
            assert!(dir.is_absolute(), "should be absolute: {dir:?}");
            assert!(dir.ends_with("hearth"), "should end with hearth: {dir:?}");
        }
    }

    #[test]
    fn test_default_files_live_in_their_dirs() {
        if let (Some(config), Some(file)) = (config_dir(), default_config_file()) {
            assert_eq!(file, config.join("config.toml"));
        }
        if let (Some(state), Some(manifest)) = (state_dir(), default_manifest_file()) {
            assert!(manifest.starts_with(state));
            assert!(manifest.ends_with("manifest.toml"));
        }
        if let Some(repo) = default_repo_dir() {
            assert!(repo.ends_with("hearth/repo.git"));
        }
    }
}
