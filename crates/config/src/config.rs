//! Configuration management
//!
//! This module handles loading the hearth configuration file and resolving
//! the paths it names.

use crate::{Error, Result, dirs};
use hearth_crypto::Identity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// General configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Repository git directory
    #[serde(default)]
    pub repo: Option<PathBuf>,

    /// Directory the repository is overlaid onto (defaults to home)
    #[serde(default, rename = "workTree")]
    pub work_tree: Option<PathBuf>,

    /// Class label used by `##class.<name>` alternates
    #[serde(default)]
    pub class: Option<String>,

    /// Manifest of materialized files
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

/// Sync configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Worker threads for producing and staging content
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Top-level directories whose files get private (0600) permissions
    #[serde(default = "default_private_dirs", rename = "privateDirs")]
    pub private_dirs: Vec<String>,

    /// Overwrite unmanaged files that differ from the resolved content
    #[serde(default)]
    pub force: bool,

    /// Keep materialized files listed in the repository's `info/exclude`
    #[serde(default = "default_auto_exclude", rename = "autoExclude")]
    pub auto_exclude: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            private_dirs: default_private_dirs(),
            force: false,
            auto_exclude: default_auto_exclude(),
        }
    }
}

fn default_private_dirs() -> Vec<String> {
    vec![".ssh".to_string(), ".gnupg".to_string()]
}

fn default_auto_exclude() -> bool {
    true
}

/// Which decryption backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionBackend {
    /// In-process age decryption
    #[default]
    Age,
    /// External command reading ciphertext on stdin
    Command,
    /// Encrypted files cannot be decrypted
    None,
}

/// Encryption configuration section
///
/// ```toml
/// [encryption]
/// backend = "age"
/// identity = "~/.config/hearth/key.txt"
/// passphraseEnv = "HEARTH_PASSPHRASE"
///
/// # or an external tool
/// [encryption]
/// backend = "command"
/// command = "gpg --batch --quiet --decrypt"
/// timeout = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Backend to decrypt with
    #[serde(default)]
    pub backend: EncryptionBackend,

    /// Identity file (age or SSH key)
    #[serde(default)]
    pub identity: Option<PathBuf>,

    /// Environment variable holding a passphrase
    #[serde(default, rename = "passphraseEnv")]
    pub passphrase_env: Option<String>,

    /// Command line for the `command` backend
    #[serde(default)]
    pub command: Option<String>,

    /// Seconds an external command may run
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            backend: EncryptionBackend::default(),
            identity: None,
            passphrase_env: None,
            command: None,
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

impl EncryptionConfig {
    /// Timeout for external commands
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Load age identities from the identity file and the passphrase variable
    ///
    /// A configured identity file that cannot be loaded is an error. The
    /// default identity location is only used when it exists. An empty result
    /// is not an error here; decryption reports it when an encrypted file is
    /// actually met.
    pub fn age_identities(&self) -> Result<Vec<Identity>> {
        let mut identities = Vec::new();

        match &self.identity {
            Some(path) => {
                identities.extend(
                    hearth_crypto::load_identities(path)
                        .map_err(|e| Error::Config(e.to_string()))?,
                );
            }
            None => {
                if let Some(path) = dirs::default_age_identity().filter(|p| p.exists()) {
                    debug!(path = %path.display(), "using default identity");
                    identities.extend(
                        hearth_crypto::load_identities(&path)
                            .map_err(|e| Error::Config(e.to_string()))?,
                    );
                }
            }
        }

        if let Some(var) = &self.passphrase_env
            && let Ok(passphrase) = std::env::var(var)
            && !passphrase.is_empty()
        {
            identities.push(Identity::from_passphrase(passphrase));
        }

        Ok(identities)
    }
}

/// Hearth configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General configuration section
    #[serde(default)]
    pub general: GeneralConfig,

    /// Sync configuration section
    #[serde(default)]
    pub sync: SyncConfig,

    /// Encryption configuration section
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

impl Config {
    /// Load configuration from a file
    ///
    /// Relative paths resolve against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or TOML parsing fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Load the given file, or the default location
    ///
    /// An explicitly named file must exist. A missing default file yields the
    /// default configuration.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match dirs::default_config_file() {
            Some(default) if default.exists() => Self::load(default),
            _ => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if TOML parsing fails
    pub fn from_toml_str(toml_content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_content)
            .map_err(|e| Error::Config(format!("Failed to parse config TOML: {e}")))?;

        if config.sync.jobs == Some(0) {
            return Err(Error::Config("sync.jobs must be at least 1".to_string()));
        }

        config.resolve_relative_paths(base_dir);
        Ok(config)
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        let general = &mut self.general;
        for path in [
            &mut general.repo,
            &mut general.work_tree,
            &mut general.manifest,
            &mut self.encryption.identity,
        ]
        .into_iter()
        .flatten()
        {
            *path = resolve_path(path, base_dir);
        }
    }

    /// Repository git directory
    pub fn repo_dir(&self) -> Result<PathBuf> {
        self.general
            .repo
            .clone()
            .or_else(dirs::default_repo_dir)
            .ok_or(Error::NoHomeDir)
    }

    /// Work tree the repository is overlaid onto
    pub fn work_tree(&self) -> Result<PathBuf> {
        self.general
            .work_tree
            .clone()
            .or_else(::dirs::home_dir)
            .ok_or(Error::NoHomeDir)
    }

    /// Manifest file location
    pub fn manifest_path(&self) -> Result<PathBuf> {
        self.general
            .manifest
            .clone()
            .or_else(dirs::default_manifest_file)
            .ok_or(Error::NoHomeDir)
    }

    /// Worker threads, defaulting to the available parallelism
    pub fn jobs(&self) -> usize {
        self.sync.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// Expand `~` and resolve relative paths against `base_dir`
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = ::dirs::home_dir()
    {
        return home.join(stripped);
    }

    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}
