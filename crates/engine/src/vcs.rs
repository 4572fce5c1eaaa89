//! Version control collaborator
//!
//! The engine only needs to list tracked paths and read their content. It
//! never commits, merges or pushes.
//!
//! Two sources are provided:
//! - [`Git2Vcs`] reads the index of a git repository via libgit2
//! - [`DirectorySource`] walks a plain directory

use crate::error::{Error, Result};
use crate::system::System;
use git2::Repository;
use hearth_core::path::{AbsPath, RelPath};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Git file mode of an executable blob
const MODE_EXECUTABLE: u32 = 0o100_755;
/// Git file mode of a submodule
const MODE_GITLINK: u32 = 0o160_000;

/// First line of the managed block in `info/exclude`
pub const EXCLUDE_BEGIN: &str = "# BEGIN hearth managed";
/// Last line of the managed block in `info/exclude`
pub const EXCLUDE_END: &str = "# END hearth managed";

/// One tracked entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrackedPath {
    /// Path relative to the repository root
    pub path: RelPath,
    /// Whether the entry is a directory (submodule) rather than a file
    pub is_directory: bool,
}

impl TrackedPath {
    /// A tracked file
    pub fn file(path: RelPath) -> Self {
        Self {
            path,
            is_directory: false,
        }
    }
}

/// Content of a tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw bytes
    pub data: Vec<u8>,
    /// Whether the file is tracked as executable
    pub executable: bool,
}

/// Current checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    /// Branch name, `None` when detached
    pub branch: Option<String>,
    /// Abbreviated commit id
    pub commit: String,
}

/// Source of tracked paths and their content
pub trait Vcs: Send + Sync {
    /// Every tracked path, sorted
    fn list_tracked_paths(&self) -> Result<Vec<TrackedPath>>;

    /// Content of one tracked file
    fn read_blob(&self, path: &RelPath) -> Result<Blob>;

    /// Current checkout, `None` when there is no commit yet
    fn head(&self) -> Result<Option<HeadInfo>>;

    /// Directory where tracked files are checked out, if any
    ///
    /// When this equals the work tree, an unmarked tracked file already sits
    /// at its destination.
    fn checkout_root(&self) -> Option<&AbsPath>;
}

/// libgit2-backed repository
pub struct Git2Vcs {
    repo: Mutex<Repository>,
    git_dir: AbsPath,
    work_tree: AbsPath,
}

impl std::fmt::Debug for Git2Vcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git2Vcs")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .finish_non_exhaustive()
    }
}

impl Git2Vcs {
    /// Open the repository at `git_dir` with `work_tree` as its checkout
    ///
    /// # Errors
    ///
    /// Returns an error if `git_dir` is not a git repository.
    pub fn open(git_dir: &AbsPath, work_tree: &AbsPath) -> Result<Self> {
        let repo = Repository::open(git_dir.as_path())
            .map_err(|e| Error::Vcs(format!("cannot open {git_dir}: {}", e.message())))?;

        if repo.is_bare() {
            repo.set_workdir(work_tree.as_path(), false)?;
        }

        debug!(%git_dir, %work_tree, "opened repository");
        Ok(Self {
            repo: Mutex::new(repo),
            git_dir: git_dir.clone(),
            work_tree: work_tree.clone(),
        })
    }

    /// Repository directory
    pub fn git_dir(&self) -> &AbsPath {
        &self.git_dir
    }

    fn with_repo<T>(&self, f: impl FnOnce(&Repository) -> Result<T>) -> Result<T> {
        let repo = self
            .repo
            .lock()
            .map_err(|_| Error::Vcs("repository lock poisoned".to_string()))?;
        f(&repo)
    }
}

impl Vcs for Git2Vcs {
    fn list_tracked_paths(&self) -> Result<Vec<TrackedPath>> {
        self.with_repo(|repo| {
            let index = repo.index()?;
            let mut paths = Vec::with_capacity(index.len());
            for entry in index.iter() {
                let Ok(name) = std::str::from_utf8(&entry.path) else {
                    warn!(path = %String::from_utf8_lossy(&entry.path), "skipping non UTF-8 path");
                    continue;
                };
                paths.push(TrackedPath {
                    path: RelPath::from_slash(name)?,
                    is_directory: entry.mode == MODE_GITLINK,
                });
            }
            paths.sort();
            paths.dedup();
            Ok(paths)
        })
    }

    fn read_blob(&self, path: &RelPath) -> Result<Blob> {
        self.with_repo(|repo| {
            let index = repo.index()?;
            let entry = index
                .get_path(Path::new(&path.to_slash()), 0)
                .ok_or_else(|| Error::Vcs(format!("{path} is not tracked")))?;
            let blob = repo.find_blob(entry.id)?;
            Ok(Blob {
                data: blob.content().to_vec(),
                executable: entry.mode == MODE_EXECUTABLE,
            })
        })
    }

    fn head(&self) -> Result<Option<HeadInfo>> {
        self.with_repo(|repo| {
            let head = match repo.head() {
                Ok(head) => head,
                Err(e)
                    if e.code() == git2::ErrorCode::UnbornBranch
                        || e.code() == git2::ErrorCode::NotFound =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            let branch = if head.is_branch() {
                head.shorthand().map(str::to_string)
            } else {
                None
            };
            let commit = head.peel_to_commit()?.id().to_string();
            Ok(Some(HeadInfo {
                branch,
                commit: commit.chars().take(12).collect(),
            }))
        })
    }

    fn checkout_root(&self) -> Option<&AbsPath> {
        Some(&self.work_tree)
    }
}

/// Replace the managed block of `<git_dir>/info/exclude` with `names`
///
/// Lines outside the block are preserved. Each name is anchored to the
/// repository root.
///
/// # Errors
///
/// Returns an error if the exclude file cannot be read or written.
pub fn update_exclude(system: &dyn System, git_dir: &AbsPath, names: &[RelPath]) -> Result<()> {
    let info_dir = git_dir.child("info");
    let exclude = info_dir.child("exclude");

    let existing = if system.exists(&exclude) {
        String::from_utf8_lossy(&system.read_file(&exclude)?).into_owned()
    } else {
        if !system.exists(&info_dir) {
            system.create_dir(&info_dir, None)?;
        }
        String::new()
    };

    let updated = replace_exclude_block(&existing, names);
    if updated != existing {
        system.write_file(&exclude, updated.as_bytes(), None)?;
        debug!(path = %exclude, entries = names.len(), "updated exclude block");
    }
    Ok(())
}

fn replace_exclude_block(existing: &str, names: &[RelPath]) -> String {
    let mut kept = Vec::new();
    let mut in_block = false;
    for line in existing.lines() {
        match line {
            EXCLUDE_BEGIN => in_block = true,
            EXCLUDE_END => in_block = false,
            _ if !in_block => kept.push(line),
            _ => {}
        }
    }

    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    let mut out = String::new();
    for line in kept {
        out.push_str(line);
        out.push('\n');
    }

    if !names.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(EXCLUDE_BEGIN);
        out.push('\n');
        for name in names {
            out.push('/');
            out.push_str(&name.to_slash());
            out.push('\n');
        }
        out.push_str(EXCLUDE_END);
        out.push('\n');
    }
    out
}

/// Plain directory treated as a repository
///
/// Every regular file below the root is tracked; `.git` is ignored.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: AbsPath,
}

impl DirectorySource {
    /// Use `root` as the repository
    pub fn new(root: AbsPath) -> Self {
        Self { root }
    }
}

impl Vcs for DirectorySource {
    fn list_tracked_paths(&self) -> Result<Vec<TrackedPath>> {
        let walker = WalkDir::new(self.root.as_path())
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| Error::Other {
                context: format!("Failed to walk {}", self.root),
                source: Box::new(e),
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            let abs = AbsPath::from_path(entry.path())?;
            paths.push(TrackedPath::file(abs.strip_prefix(&self.root)?));
        }
        paths.sort();
        Ok(paths)
    }

    fn read_blob(&self, path: &RelPath) -> Result<Blob> {
        let abs = self.root.join(path);
        let data = std::fs::read(abs.as_path()).map_err(|e| Error::FileRead {
            path: abs.clone(),
            source: e,
        })?;

        #[cfg(unix)]
        let executable = {
            use std::os::unix::fs::PermissionsExt;
            std::fs::metadata(abs.as_path())
                .map(|m| m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        };
        #[cfg(not(unix))]
        let executable = false;

        Ok(Blob { data, executable })
    }

    fn head(&self) -> Result<Option<HeadInfo>> {
        Ok(None)
    }

    fn checkout_root(&self) -> Option<&AbsPath> {
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::system::RealSystem;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<RelPath> {
        list.iter().map(|n| RelPath::from_slash(n).unwrap()).collect()
    }

    #[test]
    fn test_exclude_block_appended() {
        let out = replace_exclude_block("*.swp\n", &names(&[".config/app.conf"]));
        assert_eq!(
            out,
            "*.swp\n\n# BEGIN hearth managed\n/.config/app.conf\n# END hearth managed\n"
        );
    }

    #[test]
    fn test_exclude_block_replaced() {
        let existing = "*.swp\n\n# BEGIN hearth managed\n/old\n# END hearth managed\n*.tmp\n";
        let out = replace_exclude_block(existing, &names(&["new"]));
        assert_eq!(
            out,
            "*.swp\n\n*.tmp\n\n# BEGIN hearth managed\n/new\n# END hearth managed\n"
        );
    }

    #[test]
    fn test_exclude_block_removed_when_empty() {
        let existing = "*.swp\n\n# BEGIN hearth managed\n/old\n# END hearth managed\n";
        assert_eq!(replace_exclude_block(existing, &[]), "*.swp\n");
    }

    #[test]
    fn test_update_exclude_creates_info_dir() {
        let temp = TempDir::new().unwrap();
        let git_dir = AbsPath::new(temp.path().to_path_buf()).unwrap();
        update_exclude(&RealSystem, &git_dir, &names(&["a"])).unwrap();
        let text = std::fs::read_to_string(temp.path().join("info/exclude")).unwrap();
        assert!(text.contains("/a\n"));
    }

    #[test]
    fn test_directory_source_lists_files() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".config")).unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(temp.path().join(".config/app.conf##os.Linux"), "x").unwrap();
        std::fs::write(temp.path().join(".bashrc"), "y").unwrap();

        let source = DirectorySource::new(AbsPath::new(temp.path().to_path_buf()).unwrap());
        let listed: Vec<String> = source
            .list_tracked_paths()
            .unwrap()
            .into_iter()
            .map(|t| t.path.to_slash())
            .collect();
        assert_eq!(listed, vec![".bashrc", ".config/app.conf##os.Linux"]);
        assert_eq!(
            source
                .read_blob(&RelPath::from_slash(".bashrc").unwrap())
                .unwrap()
                .data,
            b"y"
        );
        assert!(source.checkout_root().is_none());
    }

    #[test]
    fn test_git2_lists_index() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        std::fs::write(temp.path().join(".vimrc##default"), "set nu\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(".vimrc##default")).unwrap();
        index.write().unwrap();

        let git_dir = AbsPath::new(temp.path().join(".git")).unwrap();
        let work_tree = AbsPath::new(temp.path().to_path_buf()).unwrap();
        let vcs = Git2Vcs::open(&git_dir, &work_tree).unwrap();

        let listed = vcs.list_tracked_paths().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path.to_slash(), ".vimrc##default");
        assert!(!listed[0].is_directory);

        let blob = vcs.read_blob(&listed[0].path).unwrap();
        assert_eq!(blob.data, b"set nu\n");
        assert!(!blob.executable);

        assert!(vcs.head().unwrap().is_none());
        assert_eq!(vcs.checkout_root(), Some(&work_tree));
    }
}
