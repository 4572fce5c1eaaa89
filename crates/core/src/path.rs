//! Type-safe path types
//!
//! This module provides two distinct path types using the newtype pattern:
//!
//! - [`AbsPath`]: Absolute filesystem paths (destinations, repository roots)
//! - [`RelPath`]: Paths relative to the repository root or the work tree
//!
//! Repository listings always use `/` as separator, so [`RelPath`] also knows
//! how to render itself in that form for manifests and reports.
//!
//! # Examples
//!
//! ```
//! use hearth_core::path::{AbsPath, RelPath};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let home = AbsPath::new("/home/user".into())?;
//! let config = RelPath::new(".config/nvim/init.lua".into())?;
//!
//! let nvim_config = home.join(&config);
//! assert_eq!(nvim_config.as_path().to_str().unwrap(), "/home/user/.config/nvim/init.lua");
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// An absolute path on the filesystem
///
/// This type guarantees that the path is absolute.
/// Use this for file operations and as base directories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Create a new `AbsPath` from a `PathBuf`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    ///
    /// ```
    /// use hearth_core::path::AbsPath;
    ///
    /// assert!(AbsPath::new("/home/user".into()).is_ok());
    /// assert!(AbsPath::new("relative/path".into()).is_err());
    /// ```
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.is_absolute() {
            Ok(AbsPath(path))
        } else {
            Err(Error::PathNotAbsolute { path })
        }
    }

    /// Create a new `AbsPath` from a reference to a `Path`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(path.to_path_buf())
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Join with a relative path to create a new absolute path
    pub fn join(&self, rel: &RelPath) -> Self {
        AbsPath(self.0.join(rel.as_path()))
    }

    /// Path of a direct child entry
    pub fn child(&self, name: &str) -> Self {
        AbsPath(self.0.join(name))
    }

    /// Get the parent directory
    ///
    /// Returns `None` if this is the root directory.
    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| AbsPath(p.to_path_buf()))
    }

    /// Sibling path in the same directory with a different file name
    ///
    /// Used for scratch files that must live on the same filesystem as the
    /// path they will eventually replace.
    pub fn with_file_name(&self, name: &str) -> Self {
        AbsPath(self.0.with_file_name(name))
    }

    /// Strip a base directory prefix to get a relative path
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not under `base`.
    ///
    /// ```
    /// use hearth_core::path::AbsPath;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let home = AbsPath::new("/home/user".into())?;
    /// let file = AbsPath::new("/home/user/.bashrc".into())?;
    /// let rel = file.strip_prefix(&home)?;
    /// assert_eq!(rel.as_path().to_str().unwrap(), ".bashrc");
    /// # Ok(())
    /// # }
    /// ```
    pub fn strip_prefix(&self, base: &AbsPath) -> Result<RelPath> {
        self.0
            .strip_prefix(&base.0)
            .map(|p| RelPath(p.to_path_buf()))
            .map_err(|_| Error::InvalidPathPrefix {
                path: std::sync::Arc::new(self.as_path().to_path_buf()),
                base: std::sync::Arc::new(base.as_path().to_path_buf()),
            })
    }

    /// Get the file name
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }
}

/// A relative path (no leading slash, no `..` components)
///
/// Rejecting `..` keeps every joined destination inside its base directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelPath(PathBuf);

impl RelPath {
    /// Create a new `RelPath` from a `PathBuf`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absolute or escapes its base via `..`.
    pub fn new(path: PathBuf) -> Result<Self> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if path.is_relative() && !escapes {
            Ok(RelPath(path))
        } else {
            Err(Error::PathNotRelative { path })
        }
    }

    /// Parse a `/`-separated repository path
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absolute or escapes its base via `..`.
    ///
    /// ```
    /// use hearth_core::path::RelPath;
    ///
    /// let rel = RelPath::from_slash(".config/app.conf").unwrap();
    /// assert_eq!(rel.to_slash(), ".config/app.conf");
    /// assert!(RelPath::from_slash("../outside").is_err());
    /// ```
    pub fn from_slash(path: &str) -> Result<Self> {
        Self::new(path.split('/').filter(|s| !s.is_empty()).collect())
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Render with `/` separators regardless of platform
    pub fn to_slash(&self) -> String {
        self.0
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Join with another relative path
    pub fn join(&self, other: &RelPath) -> Self {
        RelPath(self.0.join(&other.0))
    }

    /// Get the parent directory
    ///
    /// Returns `None` if this is a single component path.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| RelPath(p.to_path_buf()))
    }

    /// Replace the final component
    pub fn with_file_name(&self, name: &str) -> Self {
        RelPath(self.0.with_file_name(name))
    }

    /// Get the file name
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }

    /// Whether the first component equals `dir`
    pub fn starts_with_dir(&self, dir: &str) -> bool {
        self.0
            .components()
            .next()
            .is_some_and(|c| c.as_os_str() == dir)
    }
}

impl std::fmt::Display for AbsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl std::fmt::Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_slash())
    }
}
