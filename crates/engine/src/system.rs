//! System abstraction for filesystem operations
//!
//! Every filesystem mutation performed while syncing goes through [`System`],
//! so tests can inject faults at exact points of a transaction.

use crate::error::{Error, Result};
use hearth_core::path::AbsPath;
use std::fs;
use std::io::ErrorKind;

/// Kind of entry found at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Nothing exists at the path
    Missing,
    /// Regular file, or a symlink to one
    File,
    /// Directory, or a symlink to one
    Directory,
    /// Symlink whose target does not exist
    DanglingSymlink,
}

/// Abstraction over filesystem operations
///
/// Implementations must be usable from several worker threads at once.
pub trait System: Send + Sync {
    /// Read a file's contents
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>>;

    /// Create or truncate a file and write its contents with optional permissions
    ///
    /// A newly created file never has broader permissions than `mode`.
    fn write_file(&self, path: &AbsPath, content: &[u8], mode: Option<u32>) -> Result<()>;

    /// Create a single directory with optional permissions
    fn create_dir(&self, path: &AbsPath, mode: Option<u32>) -> Result<()>;

    /// Atomically rename within one filesystem, replacing `to`
    fn rename(&self, from: &AbsPath, to: &AbsPath) -> Result<()>;

    /// Remove a file
    fn remove_file(&self, path: &AbsPath) -> Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &AbsPath) -> Result<()>;

    /// What exists at a path
    fn entry_kind(&self, path: &AbsPath) -> Result<EntryKind>;

    /// Check if a path exists
    fn exists(&self, path: &AbsPath) -> bool {
        !matches!(self.entry_kind(path), Ok(EntryKind::Missing))
    }
}

/// Real filesystem implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSystem;

impl System for RealSystem {
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        fs::read(path.as_path()).map_err(|e| Error::FileRead {
            path: path.clone(),
            source: e,
        })
    }

    fn write_file(&self, path: &AbsPath, content: &[u8], mode: Option<u32>) -> Result<()> {
        let write_error = |e| Error::FileWrite {
            path: path.clone(),
            source: e,
        };

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            // Set permissions on creation so the content is never exposed
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(mode.unwrap_or(0o666))
                .open(path.as_path())
                .map_err(write_error)?;
            file.write_all(content).map_err(write_error)?;

            // The creation mode is masked by the umask and ignored for existing files
            if let Some(mode) = mode {
                file.set_permissions(fs::Permissions::from_mode(mode))
                    .map_err(write_error)?;
            }
        }

        #[cfg(not(unix))]
        {
            let _ = mode;
            fs::write(path.as_path(), content).map_err(write_error)?;
        }

        Ok(())
    }

    fn create_dir(&self, path: &AbsPath, mode: Option<u32>) -> Result<()> {
        let mut builder = fs::DirBuilder::new();

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }

        #[cfg(not(unix))]
        let _ = mode;

        builder
            .create(path.as_path())
            .map_err(|e| Error::DirectoryCreate {
                path: path.clone(),
                source: e,
            })
    }

    fn rename(&self, from: &AbsPath, to: &AbsPath) -> Result<()> {
        fs::rename(from.as_path(), to.as_path()).map_err(|e| Error::Rename {
            from: from.clone(),
            to: to.clone(),
            source: e,
        })
    }

    fn remove_file(&self, path: &AbsPath) -> Result<()> {
        fs::remove_file(path.as_path()).map_err(|e| Error::Remove {
            path: path.clone(),
            source: e,
        })
    }

    fn remove_dir(&self, path: &AbsPath) -> Result<()> {
        fs::remove_dir(path.as_path()).map_err(|e| Error::Remove {
            path: path.clone(),
            source: e,
        })
    }

    fn entry_kind(&self, path: &AbsPath) -> Result<EntryKind> {
        match fs::metadata(path.as_path()) {
            Ok(metadata) if metadata.is_dir() => Ok(EntryKind::Directory),
            Ok(_) => Ok(EntryKind::File),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // A dangling symlink still occupies the name
                if fs::symlink_metadata(path.as_path()).is_ok() {
                    Ok(EntryKind::DanglingSymlink)
                } else {
                    Ok(EntryKind::Missing)
                }
            }
            Err(e) => Err(Error::Metadata {
                path: path.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    fn abs(temp: &TempDir, name: &str) -> AbsPath {
        AbsPath::new(temp.path().join(name)).unwrap()
    }

    #[test]
    fn test_write_read_rename() {
        let temp = TempDir::new().unwrap();
        let staged = abs(&temp, ".a.staged");
        let dest = abs(&temp, "a");

        RealSystem.write_file(&staged, b"one", Some(0o600)).unwrap();
        RealSystem.rename(&staged, &dest).unwrap();

        assert_eq!(RealSystem.read_file(&dest).unwrap(), b"one");
        assert!(!RealSystem.exists(&staged));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.as_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_narrows_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let file = abs(&temp, "key");

        RealSystem.write_file(&file, b"", Some(0o644)).unwrap();
        RealSystem.write_file(&file, b"secret", Some(0o600)).unwrap();

        let mode = fs::metadata(file.as_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(RealSystem.read_file(&file).unwrap(), b"secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_create_dir_with_mode() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let dir = abs(&temp, ".ssh");

        RealSystem.create_dir(&dir, Some(0o700)).unwrap();
        let mode = fs::metadata(dir.as_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_entry_kind() {
        let temp = TempDir::new().unwrap();
        let dir = abs(&temp, "dir");
        let file = abs(&temp, "file");
        RealSystem.create_dir(&dir, None).unwrap();
        RealSystem.write_file(&file, b"", None).unwrap();

        assert_eq!(RealSystem.entry_kind(&dir).unwrap(), EntryKind::Directory);
        assert_eq!(RealSystem.entry_kind(&file).unwrap(), EntryKind::File);
        assert_eq!(
            RealSystem.entry_kind(&abs(&temp, "missing")).unwrap(),
            EntryKind::Missing
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_not_missing() {
        let temp = TempDir::new().unwrap();
        let link = abs(&temp, "link");
        std::os::unix::fs::symlink(temp.path().join("nowhere"), link.as_path()).unwrap();
        assert_eq!(
            RealSystem.entry_kind(&link).unwrap(),
            EntryKind::DanglingSymlink
        );
        assert!(RealSystem.exists(&link));
    }

    #[test]
    fn test_remove_dir_requires_empty() {
        let temp = TempDir::new().unwrap();
        let dir = abs(&temp, "dir");
        RealSystem.create_dir(&dir, None).unwrap();
        RealSystem
            .write_file(&abs(&temp, "dir/file"), b"x", None)
            .unwrap();

        assert!(RealSystem.remove_dir(&dir).is_err());
        RealSystem.remove_file(&abs(&temp, "dir/file")).unwrap();
        RealSystem.remove_dir(&dir).unwrap();
        assert!(!RealSystem.exists(&dir));
    }
}
