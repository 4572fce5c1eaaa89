//! External command decryption backend
//!
//! Encrypted content is piped to the command's stdin and the plaintext is
//! read from its stdout, e.g. `gpg --batch --quiet --decrypt`.

use crate::content::Decryptor;
use std::time::Duration;
use thiserror::Error;

/// Error type for [`CommandDecryptor`]
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command line could not be split into words
    #[error("Failed to parse decryption command '{command}': {message}")]
    Parse { command: String, message: String },

    /// The command line is empty
    #[error("Decryption command is empty")]
    Empty,

    /// The process could not be started or waited on
    #[error("Decryption command '{program}' failed: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process did not finish in time
    #[error("Decryption command '{program}' timed out after {} seconds", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    /// The process exited unsuccessfully
    #[error("Decryption command '{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Decrypts by running an external command
#[derive(Debug, Clone)]
pub struct CommandDecryptor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDecryptor {
    /// Parse a command line such as `gpg --batch -d`
    ///
    /// Quoting follows POSIX shell rules; the command is never run through a
    /// shell.
    ///
    /// # Errors
    ///
    /// Returns an error if the command line cannot be parsed or is empty.
    pub fn new(command: &str, timeout: Duration) -> Result<Self, CommandError> {
        let mut parts = shell_words::split(command).map_err(|e| CommandError::Parse {
            command: command.to_string(),
            message: e.to_string(),
        })?;
        if parts.is_empty() {
            return Err(CommandError::Empty);
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
            timeout,
        })
    }

    /// Program that will be run
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Decryptor for CommandDecryptor {
    type Error = CommandError;

    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, Self::Error> {
        tracing::debug!(program = %self.program, args = ?self.args, "running decryption command");

        let io_error = |source| CommandError::Io {
            program: self.program.clone(),
            source,
        };

        let handle = duct::cmd(&self.program, &self.args)
            .stdin_bytes(encrypted.to_vec())
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .start()
            .map_err(io_error)?;

        if handle.wait_timeout(self.timeout).map_err(io_error)?.is_none() {
            if let Err(e) = handle.kill() {
                tracing::warn!(program = %self.program, error = %e, "failed to kill timed out command");
            }
            return Err(CommandError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            });
        }
        let output = handle.wait().map_err(io_error)?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout.clone())
    }
}

#[cfg(all(test, unix))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_parses_quoted_command() {
        let d = CommandDecryptor::new("gpg --batch --passphrase 'a b' -d", Duration::from_secs(1))
            .unwrap();
        assert_eq!(d.program(), "gpg");
        assert_eq!(d.args, vec!["--batch", "--passphrase", "a b", "-d"]);
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(
            CommandDecryptor::new("  ", Duration::from_secs(1)),
            Err(CommandError::Empty)
        ));
    }

    #[test]
    fn test_pipes_stdin_to_stdout() {
        let d = CommandDecryptor::new("cat", Duration::from_secs(10)).unwrap();
        assert_eq!(d.decrypt(b"plain").unwrap(), b"plain");
    }

    #[test]
    fn test_failure_reports_stderr() {
        let d = CommandDecryptor::new("sh -c 'echo bad key >&2; exit 2'", Duration::from_secs(10))
            .unwrap();
        let err = d.decrypt(b"x").unwrap_err();
        assert!(err.to_string().contains("bad key"), "{err}");
    }

    #[test]
    fn test_timeout() {
        let d = CommandDecryptor::new("sleep 5", Duration::from_millis(100)).unwrap();
        assert!(matches!(d.decrypt(b""), Err(CommandError::Timeout { .. })));
    }
}
