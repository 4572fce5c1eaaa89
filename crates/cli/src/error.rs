//! Error types for CLI commands
//!
//! Structured errors for the failures a user can act on; anything else is
//! carried through [`CommandError::Other`].

use hearth_engine::report::TransactionAbort;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Failed to load age identities
    #[error("Failed to load age identities: {0}")]
    IdentityLoadError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Decryption backend could not be set up
    #[error("Encryption error: {0}")]
    EncryptionError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Engine failure outside any single entry
    #[error(transparent)]
    Engine(#[from] hearth_engine::Error),

    /// Another run holds the repository lock
    #[error(
        "Repository is locked by another hearth process: {}\nRemove the file if no other run is active",
        .0.display()
    )]
    Locked(PathBuf),

    /// The transaction was rolled back
    #[error(transparent)]
    Aborted(#[from] TransactionAbort),

    /// Apply finished but some entries failed
    #[error("Apply failed: {failed} out of {total} entries")]
    ApplyFailed {
        /// Number of entries that failed
        failed: usize,
        /// Total number of entries
        total: usize,
    },

    /// The shell or command for `enter` cannot be run
    #[error("\"{0}\" does not refer to an executable")]
    NotExecutable(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<hearth_core::Error> for CommandError {
    fn from(err: hearth_core::Error) -> Self {
        Self::Other(err.into())
    }
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

impl CommandError {
    /// Create an `IdentityLoadError` from any error type
    pub fn identity_load<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::IdentityLoadError(Box::new(err))
    }

    /// Create a `ConfigError` from any error type
    pub fn config<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::ConfigError(Box::new(err))
    }

    /// Create an `EncryptionError` from any error type
    pub fn encryption<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::EncryptionError(Box::new(err))
    }
}
