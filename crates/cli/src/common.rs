//! Common utilities and types shared across CLI commands

use anyhow::{Context, anyhow};
use hearth_config::{Config, EncryptionBackend, EncryptionConfig};
use hearth_core::path::AbsPath;
use hearth_core::{HostAttributes, HostContext, RepoLayout};
use hearth_engine::adapters::{
    AgeDecryptor, BackendDecryptor, BackendProcessor, CommandDecryptor, create_processor,
};
use hearth_engine::classify::PathClassifier;
use hearth_engine::content::NoOpDecryptor;
use hearth_engine::vcs::Git2Vcs;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{debug, warn};

use crate::error::{CommandError, Result};

/// Runtime context for CLI commands
///
/// Holds what every command needs: the configuration, where the repository
/// and its work tree live, and the attributes of this host. Host attributes
/// are detected once and never change during the run.
#[derive(Clone)]
pub struct RuntimeContext {
    /// Shared configuration (uses Arc to avoid cloning)
    pub config: Arc<Config>,
    /// Repository and work tree locations
    pub layout: RepoLayout,
    /// Identity of this machine
    pub host: HostAttributes,
    /// Raised by the interrupt handler
    pub interrupt: Arc<AtomicBool>,
}

impl RuntimeContext {
    /// Create a runtime context, detecting the host
    ///
    /// # Errors
    ///
    /// Returns an error if the repository or work tree location cannot be
    /// determined.
    pub fn new(config: Config) -> Result<Self> {
        let git_dir = AbsPath::new(config.repo_dir().map_err(CommandError::config)?)?;
        let work_tree = AbsPath::new(config.work_tree().map_err(CommandError::config)?)?;
        let host = HostContext::new()
            .with_class(config.general.class.clone())
            .detect();

        Ok(Self::from_parts(
            Arc::new(config),
            RepoLayout::new(git_dir, work_tree),
            host,
        ))
    }

    /// Create a context from already known parts
    pub fn from_parts(config: Arc<Config>, layout: RepoLayout, host: HostAttributes) -> Self {
        Self {
            config,
            layout,
            host,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Manifest file location
    pub fn manifest_path(&self) -> Result<AbsPath> {
        let path = self.config.manifest_path().map_err(CommandError::config)?;
        Ok(AbsPath::new(path)?)
    }

    /// Open the repository
    pub fn open_repo(&self) -> Result<Git2Vcs> {
        Git2Vcs::open(self.layout.git_dir(), self.layout.work_tree())
            .with_context(|| {
                format!(
                    "No hearth repository at {}; set general.repo or pass --repo",
                    self.layout.git_dir()
                )
            })
            .map_err(CommandError::from)
    }

    /// Classifier using the configured private directories
    pub fn classifier(&self) -> PathClassifier {
        PathClassifier::new(self.config.sync.private_dirs.clone())
    }

    /// Content processor for the configured encryption backend
    pub fn processor(&self) -> Result<BackendProcessor> {
        Ok(create_processor(build_decryptor(&self.config.encryption)?))
    }
}

/// Build the decryption backend named by the configuration
///
/// # Errors
///
/// Returns an error if a configured identity cannot be loaded or the
/// decryption command is missing or malformed.
pub fn build_decryptor(config: &EncryptionConfig) -> Result<BackendDecryptor> {
    match config.backend {
        EncryptionBackend::Age => {
            let identities = config
                .age_identities()
                .map_err(CommandError::identity_load)?;
            if identities.is_empty() {
                debug!("no age identities available; encrypted files will fail");
            }
            Ok(BackendDecryptor::Age(AgeDecryptor::new(identities)))
        }
        EncryptionBackend::Command => {
            let command = config.command.as_deref().ok_or_else(|| {
                CommandError::Other(anyhow!(
                    "encryption.command must be set when the backend is \"command\""
                ))
            })?;
            let decryptor = CommandDecryptor::new(command, config.timeout())
                .map_err(CommandError::encryption)?;
            Ok(BackendDecryptor::Command(decryptor))
        }
        EncryptionBackend::None => Ok(BackendDecryptor::None(NoOpDecryptor)),
    }
}

/// Exclusive lock on a repository, released on drop
///
/// The lock is a file created with `create_new`, so two runs racing for it
/// cannot both succeed.
#[derive(Debug)]
pub struct RepoLock {
    path: AbsPath,
}

impl RepoLock {
    /// Take the lock at `path`
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Locked`] if the file already exists.
    pub fn acquire(path: &AbsPath) -> Result<Self> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_path())
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CommandError::Locked(path.as_path().to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(file, "{}", std::process::id())?;
        debug!(%path, "acquired repository lock");
        Ok(Self { path: path.clone() })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(self.path.as_path()) {
            warn!(path = %self.path, error = %e, "failed to release repository lock");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_none_backend() {
        let config = EncryptionConfig {
            backend: EncryptionBackend::None,
            ..EncryptionConfig::default()
        };
        assert!(matches!(
            build_decryptor(&config).unwrap(),
            BackendDecryptor::None(_)
        ));
    }

    #[test]
    fn test_command_backend_requires_command() {
        let config = EncryptionConfig {
            backend: EncryptionBackend::Command,
            ..EncryptionConfig::default()
        };
        let err = build_decryptor(&config).err().unwrap();
        assert!(err.to_string().contains("encryption.command"));
    }

    #[test]
    fn test_command_backend_parses_command() {
        let config = EncryptionConfig {
            backend: EncryptionBackend::Command,
            command: Some("gpg --batch --decrypt".to_string()),
            ..EncryptionConfig::default()
        };
        match build_decryptor(&config).unwrap() {
            BackendDecryptor::Command(d) => assert_eq!(d.program(), "gpg"),
            _ => panic!("expected command backend"),
        }
    }

    #[test]
    fn test_missing_identity_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config = EncryptionConfig {
            identity: Some(temp.path().join("missing.txt")),
            ..EncryptionConfig::default()
        };
        assert!(matches!(
            build_decryptor(&config),
            Err(CommandError::IdentityLoadError(_))
        ));
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let temp = TempDir::new().unwrap();
        let path = AbsPath::new(temp.path().join("hearth.lock")).unwrap();

        let lock = RepoLock::acquire(&path).unwrap();
        assert!(matches!(
            RepoLock::acquire(&path),
            Err(CommandError::Locked(_))
        ));

        drop(lock);
        assert!(!path.as_path().exists());
        assert!(RepoLock::acquire(&path).is_ok());
    }
}
