//! Record of what the last successful sync deployed
//!
//! Stored as TOML:
//!
//! ```toml
//! version = 1
//!
//! [files.".config/app.conf"]
//! destination = "/home/alice/.config/app.conf"
//! sha256 = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! ```
//!
//! The manifest is rewritten wholesale after every commit.

use crate::error::{Error, Result};
use crate::hash::Digest;
use crate::system::System;
use hearth_core::path::{AbsPath, RelPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Current manifest format
pub const MANIFEST_VERSION: u32 = 1;

/// One deployed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Where the file was written
    pub destination: AbsPath,
    /// Digest of the content written
    pub sha256: Digest,
}

/// Deployed files keyed by logical name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    version: u32,
    #[serde(default)]
    files: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Empty manifest
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: BTreeMap::new(),
        }
    }

    /// Load the manifest at `path`, or an empty one if it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(system: &dyn System, path: &AbsPath) -> Result<Self> {
        if !system.exists(path) {
            debug!(%path, "no manifest yet");
            return Ok(Self::new());
        }

        let bytes = system.read_file(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::Manifest(format!("{path} is not UTF-8: {e}")))?;
        Self::from_toml_str(&text).map_err(|e| Error::Manifest(format!("{path}: {e}")))
    }

    /// Parse manifest text
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, String> {
        let manifest: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        if manifest.version != MANIFEST_VERSION {
            return Err(format!(
                "unsupported manifest version {} (expected {MANIFEST_VERSION})",
                manifest.version
            ));
        }
        Ok(manifest)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Entry for a logical name
    pub fn get(&self, logical_name: &RelPath) -> Option<&ManifestEntry> {
        self.files.get(&logical_name.to_slash())
    }

    /// Record a deployed file
    pub fn insert(&mut self, logical_name: &RelPath, entry: ManifestEntry) {
        self.files.insert(logical_name.to_slash(), entry);
    }

    /// Forget a logical name
    pub fn remove(&mut self, logical_name: &RelPath) -> Option<ManifestEntry> {
        self.files.remove(&logical_name.to_slash())
    }

    /// Entries in logical name order
    ///
    /// Keys that are not valid relative paths are skipped.
    pub fn entries(&self) -> impl Iterator<Item = (RelPath, &ManifestEntry)> {
        self.files
            .iter()
            .filter_map(|(name, entry)| RelPath::from_slash(name).ok().map(|rel| (rel, entry)))
    }

    /// Number of recorded files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::system::RealSystem;
    use tempfile::TempDir;

    fn entry(dest: &str, content: &[u8]) -> ManifestEntry {
        ManifestEntry {
            destination: AbsPath::new(dest.into()).unwrap(),
            sha256: Digest::of(content),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = AbsPath::new(temp.path().join("manifest.toml")).unwrap();
        let manifest = Manifest::load(&RealSystem, &path).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_toml_layout() {
        let mut manifest = Manifest::new();
        let name = RelPath::from_slash(".config/app.conf").unwrap();
        manifest.insert(&name, entry("/home/alice/.config/app.conf", b"test"));

        let text = manifest.to_toml_string().unwrap();
        assert!(text.contains("version = 1"));
        assert!(text.contains("[files.\".config/app.conf\"]"));
        assert!(text.contains(&Digest::of(b"test").to_hex()));

        let parsed = Manifest::from_toml_str(&text).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.get(&name).unwrap().sha256, Digest::of(b"test"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = Manifest::from_toml_str("version = 7\n").unwrap_err();
        assert!(err.contains("unsupported manifest version 7"));
    }

    #[test]
    fn test_rejects_bad_digest() {
        let text = "version = 1\n[files.a]\ndestination = \"/a\"\nsha256 = \"nothex\"\n";
        assert!(Manifest::from_toml_str(text).is_err());
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = AbsPath::new(temp.path().join("manifest.toml")).unwrap();
        std::fs::write(path.as_path(), "not toml [").unwrap();
        let err = Manifest::load(&RealSystem, &path).unwrap_err();
        assert!(err.to_string().contains("manifest.toml"));
    }

    #[test]
    fn test_remove() {
        let mut manifest = Manifest::new();
        let name = RelPath::from_slash("old.cfg").unwrap();
        manifest.insert(&name, entry("/home/alice/old.cfg", b"x"));
        assert!(manifest.remove(&name).is_some());
        assert!(manifest.is_empty());
    }
}
