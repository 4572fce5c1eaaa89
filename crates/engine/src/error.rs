//! Error types for hearth-engine
//!
//! Per-entry problems (a file that fails to decrypt, a hand-edited
//! destination) are not errors here; they are recorded as outcomes in the
//! [`SyncReport`](crate::report::SyncReport). This type covers the failures that
//! stop an operation outright.

use hearth_core::path::AbsPath;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for hearth-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hearth-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading a file
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a file
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error creating a directory
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error renaming a file
    #[error("Failed to rename {from} to {to}: {source}")]
    Rename {
        from: AbsPath,
        to: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error removing a file or directory
    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error with file metadata
    #[error("Failed to read metadata for {path}: {source}")]
    Metadata {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Path is not absolute
    #[error("Path must be absolute: {path}")]
    PathNotAbsolute { path: PathBuf },

    /// Path is not relative
    #[error("Path must be relative: {path}")]
    PathNotRelative { path: PathBuf },

    /// Invalid path prefix
    #[error("Path {} is not under base directory {}", path.display(), base.display())]
    InvalidPathPrefix {
        path: Arc<PathBuf>,
        base: Arc<PathBuf>,
    },

    /// Decryption error
    #[error("Decryption failed for {path}: {message}")]
    Decryption { path: String, message: String },

    /// Template rendering error
    #[error("Template rendering failed for {path}: {message}")]
    TemplateRender { path: String, message: String },

    /// Invalid UTF-8 encountered while rendering
    #[error("Invalid UTF-8 in {path}: {source}")]
    InvalidUtf8 {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A staged file does not hold the produced content
    #[error("Staged file {path} does not match the produced content")]
    StagedMismatch { path: AbsPath },

    /// Manifest could not be read or written
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Version control error
    #[error("Git error: {0}")]
    Vcs(String),

    /// Worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    Other {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<hearth_core::Error> for Error {
    fn from(err: hearth_core::Error) -> Self {
        match err {
            hearth_core::Error::PathNotAbsolute { path } => Error::PathNotAbsolute { path },
            hearth_core::Error::PathNotRelative { path } => Error::PathNotRelative { path },
            hearth_core::Error::InvalidPathPrefix { path, base } => {
                Error::InvalidPathPrefix { path, base }
            }
            hearth_core::Error::Io(e) => Error::Io(e),
            _ => Error::Other {
                context: "Shared error".to_string(),
                source: Box::new(err),
            },
        }
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::Vcs(err.message().to_string())
    }
}

impl Error {
    /// Create an error with additional context
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Other {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
