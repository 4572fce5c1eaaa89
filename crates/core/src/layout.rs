//! Repository layout
//!
//! A hearth repository is a git directory whose work tree is usually the home
//! directory. Keeping both locations together lets every command agree on
//! where tracked paths resolve to.

use crate::path::{AbsPath, RelPath};

/// Location of a repository and its work tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    git_dir: AbsPath,
    work_tree: AbsPath,
}

impl RepoLayout {
    /// Create a layout from a git directory and a work tree
    pub fn new(git_dir: AbsPath, work_tree: AbsPath) -> Self {
        Self { git_dir, work_tree }
    }

    /// The git directory (bare or `.git`)
    pub fn git_dir(&self) -> &AbsPath {
        &self.git_dir
    }

    /// The directory tracked paths are materialized under
    pub fn work_tree(&self) -> &AbsPath {
        &self.work_tree
    }

    /// Absolute destination for a work tree relative path
    pub fn destination(&self, rel: &RelPath) -> AbsPath {
        self.work_tree.join(rel)
    }

    /// Path of the file used to serialize concurrent runs
    pub fn lock_path(&self) -> AbsPath {
        self.git_dir.child("hearth.lock")
    }
}
