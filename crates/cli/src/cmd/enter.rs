//! Enter command implementation
//!
//! Runs a shell (or any command) with `GIT_DIR` and `GIT_WORK_TREE` pointing at
//! the hearth repository, so plain git commands operate on it.

use clap::Args;
use hearth_core::RepoLayout;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command as ProcessCommand, ExitStatus};
use tracing::debug;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};

const DEFAULT_SHELL: &str = "/bin/sh";

/// Start a shell, or run a command, inside the repository
#[derive(Debug, Default, Args)]
pub struct EnterCommand {
    /// Command to run instead of `$SHELL`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Command for EnterCommand {
    /// Exit code of the shell or command
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let (program, args) = match self.command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (resolve_shell(std::env::var_os("SHELL"))?, Vec::new()),
        };
        if !is_executable(&program) {
            return Err(CommandError::NotExecutable(program));
        }

        println!("Entering hearth repo");
        let status = spawn(&program, &args, &context.layout)?;
        println!("Leaving hearth repo");

        Ok(status.code().unwrap_or(1))
    }
}

/// The shell to start: `$SHELL`, or `/bin/sh` when it is unset
///
/// # Errors
///
/// Returns [`CommandError::NotExecutable`] when `$SHELL` is set but empty or
/// does not name an executable.
pub fn resolve_shell(shell: Option<OsString>) -> Result<String> {
    let Some(shell) = shell else {
        return Ok(DEFAULT_SHELL.to_string());
    };
    let shell = shell.to_string_lossy().into_owned();
    if shell.is_empty() || !is_executable(&shell) {
        return Err(CommandError::NotExecutable(shell));
    }
    Ok(shell)
}

/// Environment that points git at the repository
pub fn shell_environment(layout: &RepoLayout) -> Vec<(&'static str, String)> {
    let prompt = format!("hearth shell ({}) $ ", layout.git_dir());
    vec![
        ("GIT_DIR", layout.git_dir().to_string()),
        ("GIT_WORK_TREE", layout.work_tree().to_string()),
        ("PROMPT", prompt.clone()),
        ("PS1", prompt),
    ]
}

fn spawn(program: &str, args: &[String], layout: &RepoLayout) -> Result<ExitStatus> {
    debug!(program, ?args, "entering repository");
    let status = ProcessCommand::new(program)
        .args(args)
        .envs(shell_environment(layout))
        .current_dir(layout.work_tree().as_path())
        .status()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                CommandError::NotExecutable(program.to_string())
            }
            _ => CommandError::IoError(e),
        })?;
    Ok(status)
}

/// Whether `program` is an executable file, searching `PATH` for bare names
fn is_executable(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains('/') {
        return is_executable_file(Path::new(program));
    }
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| is_executable_file(&dir.join(program)))
    })
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use hearth_core::path::AbsPath;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn layout(temp: &TempDir) -> RepoLayout {
        let root = AbsPath::new(temp.path().to_path_buf()).unwrap();
        RepoLayout::new(root.child("repo.git"), root)
    }

    #[test]
    fn test_unset_shell_falls_back() {
        assert_eq!(resolve_shell(None).unwrap(), "/bin/sh");
    }

    #[test]
    fn test_empty_shell_is_rejected() {
        let err = resolve_shell(Some(OsString::new())).unwrap_err();
        assert_eq!(err.to_string(), "\"\" does not refer to an executable");
    }

    #[test]
    fn test_non_executable_shell_is_rejected() {
        let temp = TempDir::new().unwrap();
        let noexec = temp.path().join("noexec");
        fs::write(&noexec, "").unwrap();
        fs::set_permissions(&noexec, fs::Permissions::from_mode(0o664)).unwrap();

        let err = resolve_shell(Some(noexec.clone().into_os_string())).unwrap_err();
        assert!(matches!(err, CommandError::NotExecutable(ref s) if *s == noexec.to_string_lossy()));
    }

    #[test]
    fn test_environment_names_the_repository() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp);
        let env = shell_environment(&layout);

        let get = |key: &str| env.iter().find(|(k, _)| *k == key).unwrap().1.clone();
        assert_eq!(get("GIT_DIR"), layout.git_dir().to_string());
        assert_eq!(get("GIT_WORK_TREE"), layout.work_tree().to_string());
        assert!(get("PS1").starts_with("hearth shell"));
        assert!(get("PROMPT").starts_with("hearth shell"));
    }

    #[test]
    fn test_spawned_command_sees_the_environment() {
        let temp = TempDir::new().unwrap();
        let layout = layout(&temp);
        let script = format!(
            "test \"$GIT_DIR\" = '{}' && test \"$GIT_WORK_TREE\" = '{}'",
            layout.git_dir(),
            layout.work_tree()
        );

        let status = spawn("/bin/sh", &["-c".to_string(), script], &layout).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_bare_names_are_searched_on_path() {
        assert!(is_executable("sh"));
        assert!(!is_executable("hearth-no-such-program"));
    }
}
