//! Host attribute detection
//!
//! Alternates are selected by comparing filename markers against the identity
//! of the machine running hearth. [`HostContext`] detects that identity once per
//! process and freezes it into an immutable [`HostAttributes`] value, which is
//! then threaded explicitly through classification, resolution and rendering.
//!
//! OS names follow `uname -s` conventions (`Linux`, `Darwin`, ...). Marker
//! matching on the OS is case-insensitive, so `##os.linux` and `##os.Linux`
//! are equivalent.

use serde::Serialize;
use std::env;
use std::fs;
use tracing::debug;

/// Identity of the current machine
///
/// Computed once per run and read-only afterwards. `os` is always present
/// but may be empty when it cannot be detected; every other field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostAttributes {
    /// Operating system name (`Linux`, `Darwin`, ...)
    pub os: String,
    /// Distribution identifier (`ubuntu`, `arch`, ...)
    pub distro: Option<String>,
    /// Short host name
    pub hostname: Option<String>,
    /// Login name of the current user
    pub user: Option<String>,
    /// User-chosen class label
    pub class: Option<String>,
}

impl HostAttributes {
    /// Attributes with only the OS set
    pub fn new(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            ..Self::default()
        }
    }

    /// Set the distribution
    #[must_use]
    pub fn with_distro(mut self, distro: impl Into<String>) -> Self {
        self.distro = Some(distro.into());
        self
    }

    /// Set the host name
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the user name
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the class label
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// The OS as an option, treating an empty string as unknown
    pub fn os(&self) -> Option<&str> {
        (!self.os.is_empty()).then_some(self.os.as_str())
    }
}

/// Detects [`HostAttributes`] for the running machine
#[derive(Debug, Default, Clone)]
pub struct HostContext {
    class: Option<String>,
}

impl HostContext {
    /// Create a detector with no class label
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given class label
    ///
    /// The class cannot be detected; it always comes from configuration or
    /// the command line.
    #[must_use]
    pub fn with_class(mut self, class: Option<String>) -> Self {
        self.class = class.filter(|c| !c.is_empty());
        self
    }

    /// Detect the attributes of the current machine
    pub fn detect(&self) -> HostAttributes {
        let attrs = HostAttributes {
            os: detect_os(),
            distro: detect_distro(),
            hostname: detect_hostname(),
            user: detect_user(),
            class: self.class.clone(),
        };
        debug!(?attrs, "detected host attributes");
        attrs
    }
}

fn detect_os() -> String {
    #[cfg(target_os = "linux")]
    return "Linux".to_string();

    #[cfg(target_os = "macos")]
    return "Darwin".to_string();

    #[cfg(target_os = "freebsd")]
    return "FreeBSD".to_string();

    #[cfg(target_os = "openbsd")]
    return "OpenBSD".to_string();

    #[cfg(target_os = "windows")]
    return "Windows".to_string();

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "windows"
    )))]
    return env::consts::OS.to_string();
}

fn detect_hostname() -> Option<String> {
    let full = hostname::get().ok()?.into_string().ok()?;
    // Markers use the short name, as `hostname -s` would print it
    let short = full.split('.').next().unwrap_or_default().to_string();
    (!short.is_empty()).then_some(short)
}

fn detect_user() -> Option<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

/// Distribution from os-release, falling back to `lsb_release -si`
fn detect_distro() -> Option<String> {
    if !cfg!(target_os = "linux") {
        return None;
    }

    let os_release = fs::read_to_string("/etc/os-release")
        .or_else(|_| fs::read_to_string("/usr/lib/os-release"))
        .unwrap_or_default();

    parse_os_release_id(&os_release).or_else(|| {
        duct::cmd!("lsb_release", "-si")
            .stderr_null()
            .read()
            .ok()
            .map(|out| out.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// Extract the `ID=` field of an os-release file
pub fn parse_os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| line.strip_prefix("ID="))
        .map(unquote)
        .filter(|id| !id.is_empty())
}

fn unquote(value: &str) -> String {
    value.trim_matches('"').trim_matches('\'').to_string()
}
