//! Path classification
//!
//! A tracked path's final segment may carry markers after a `##` delimiter:
//!
//! ```text
//! .config/app.conf##os.Linux,hostname.box
//! .gitconfig##class.work
//! .profile##template
//! .vimrc##default
//! ```
//!
//! Markers are parsed into [`Marker`] values as soon as a path is listed, so the
//! resolver never touches filename strings. Malformed marker lists are never an
//! error: the filename is taken literally and a [`ClassificationAnomaly`] is
//! recorded for the report.

use hearth_core::HostAttributes;
use hearth_core::path::RelPath;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Delimiter between the base name and the marker list
pub const MARKER_DELIMITER: &str = "##";

/// Kind of a filename marker
///
/// Variants are declared in canonical order; a marker list whose conditions
/// do not follow this order is classified but loses ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// Operating system (`uname -s`)
    Os,
    /// Distribution identifier
    Distro,
    /// Short host name
    Hostname,
    /// Login name
    User,
    /// Configured class label
    Class,
    /// Matches every host with the lowest priority
    Default,
    /// Content is a template; value names the processor
    Template,
}

impl MarkerKind {
    /// Every kind, in canonical order
    pub const ALL: [MarkerKind; 7] = [
        Self::Os,
        Self::Distro,
        Self::Hostname,
        Self::User,
        Self::Class,
        Self::Default,
        Self::Template,
    ];

    /// Parse a kind name or its alias
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "os" | "o" => Some(Self::Os),
            "distro" | "d" => Some(Self::Distro),
            "hostname" | "h" => Some(Self::Hostname),
            "user" | "u" => Some(Self::User),
            "class" | "c" => Some(Self::Class),
            "default" => Some(Self::Default),
            "template" | "t" => Some(Self::Template),
            _ => None,
        }
    }

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Self::Os => "os",
            Self::Distro => "distro",
            Self::Hostname => "hostname",
            Self::User => "user",
            Self::Class => "class",
            Self::Default => "default",
            Self::Template => "template",
        }
    }

    /// Short alias, if any
    pub fn alias(self) -> Option<&'static str> {
        match self {
            Self::Os => Some("o"),
            Self::Distro => Some("d"),
            Self::Hostname => Some("h"),
            Self::User => Some("u"),
            Self::Class => Some("c"),
            Self::Template => Some("t"),
            Self::Default => None,
        }
    }

    /// Position in canonical order; lower ranks first
    pub fn priority(self) -> u8 {
        self as u8
    }

    /// Whether the marker restricts which hosts the file applies to
    pub fn is_condition(self) -> bool {
        !matches!(self, Self::Template)
    }

    /// Whether a value is mandatory, optional or forbidden
    pub fn value_rule(self) -> ValueRule {
        match self {
            Self::Os | Self::Distro | Self::Hostname | Self::User | Self::Class => {
                ValueRule::Required
            }
            Self::Default => ValueRule::Forbidden,
            Self::Template => ValueRule::Optional,
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a marker kind takes a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// `kind.value` only
    Required,
    /// `kind` or `kind.value`
    Optional,
    /// `kind` only
    Forbidden,
}

/// One parsed filename marker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Marker {
    /// Marker kind
    pub kind: MarkerKind,
    /// Marker value, absent for `default` and a bare `template`
    pub value: Option<String>,
}

impl Marker {
    /// Create a marker
    pub fn new(kind: MarkerKind, value: Option<&str>) -> Self {
        Self {
            kind,
            value: value.map(str::to_string),
        }
    }

    /// Whether the marker holds for the given host
    ///
    /// OS, distro and hostname compare case-insensitively; user and class
    /// compare exactly. An unknown attribute never matches. Template markers
    /// are not conditions and always hold.
    pub fn matches(&self, host: &HostAttributes) -> bool {
        let value = self.value.as_deref().unwrap_or_default();
        match self.kind {
            MarkerKind::Os => host.os().is_some_and(|os| os.eq_ignore_ascii_case(value)),
            MarkerKind::Distro => host
                .distro
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(value)),
            MarkerKind::Hostname => host
                .hostname
                .as_deref()
                .is_some_and(|h| h.eq_ignore_ascii_case(value)),
            MarkerKind::User => host.user.as_deref() == Some(value),
            MarkerKind::Class => host.class.as_deref() == Some(value),
            MarkerKind::Default | MarkerKind::Template => true,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}.{value}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// How a managed path is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Plain tracked file
    Tracked,
    /// Plain file under a private directory
    Private,
    /// Carries at least one condition marker
    Alternate,
    /// Rendered from a template
    Template,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tracked => "tracked",
            Self::Private => "private",
            Self::Alternate => "alternate",
            Self::Template => "template",
        })
    }
}

/// A tracked path with its markers parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedPath {
    /// Path relative to the repository root
    pub repo_path: RelPath,
    /// `repo_path` with the marker list stripped
    pub logical_name: RelPath,
    /// Markers in written order
    pub suffixes: Vec<Marker>,
    /// Deployment category
    pub category: Category,
    /// Whether the entry is a directory (a submodule) rather than a file
    pub is_directory: bool,
    /// Template processor, when a template marker is present
    pub template: Option<String>,
    /// Whether the path lives under a private directory
    pub private: bool,
    /// Whether condition markers appear in canonical order
    pub canonical: bool,
}

impl ManagedPath {
    /// Condition markers (everything but `template`)
    pub fn conditions(&self) -> impl Iterator<Item = &Marker> {
        self.suffixes.iter().filter(|m| m.kind.is_condition())
    }

    /// Whether the path carries no marker at all
    pub fn is_unmarked(&self) -> bool {
        self.suffixes.is_empty()
    }
}

/// A path whose markers could not be used as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationAnomaly {
    /// Offending path
    pub repo_path: RelPath,
    /// What was wrong
    pub reason: String,
}

impl fmt::Display for ClassificationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.repo_path, self.reason)
    }
}

/// Result of classifying one path
#[derive(Debug, Clone)]
pub struct Classification {
    /// The classified path
    pub path: ManagedPath,
    /// Problem found while parsing its markers
    pub anomaly: Option<ClassificationAnomaly>,
}

/// Turns repository paths into [`ManagedPath`]s
#[derive(Debug, Clone)]
pub struct PathClassifier {
    private_dirs: Vec<String>,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(vec![".ssh".to_string(), ".gnupg".to_string()])
    }
}

impl PathClassifier {
    /// Create a classifier with the given top-level private directories
    pub fn new(private_dirs: Vec<String>) -> Self {
        Self { private_dirs }
    }

    /// Classify a file path
    pub fn classify(&self, repo_path: &RelPath) -> Classification {
        self.classify_entry(repo_path, false)
    }

    /// Classify a file or directory path
    pub fn classify_entry(&self, repo_path: &RelPath, is_directory: bool) -> Classification {
        let file_name = repo_path.file_name().unwrap_or_default();

        let (logical_name, suffixes, anomaly) = match parse_markers(file_name) {
            Parsed::Unmarked => (repo_path.clone(), Vec::new(), None),
            Parsed::Marked { base, markers } => {
                (repo_path.with_file_name(base), markers, None)
            }
            Parsed::Malformed { reason } => {
                debug!(path = %repo_path, %reason, "taking filename literally");
                (
                    repo_path.clone(),
                    Vec::new(),
                    Some(ClassificationAnomaly {
                        repo_path: repo_path.clone(),
                        reason,
                    }),
                )
            }
        };

        let canonical = is_canonical(&suffixes);
        let anomaly = anomaly.or_else(|| {
            (!canonical).then(|| ClassificationAnomaly {
                repo_path: repo_path.clone(),
                reason: "markers are not in canonical order (os, distro, hostname, user, class, default)"
                    .to_string(),
            })
        });

        let private = self
            .private_dirs
            .iter()
            .any(|dir| logical_name.starts_with_dir(dir));

        let template = suffixes
            .iter()
            .find(|m| m.kind == MarkerKind::Template)
            .map(|m| m.value.clone().unwrap_or_else(|| "default".to_string()));

        let category = if suffixes.iter().any(|m| m.kind.is_condition()) {
            Category::Alternate
        } else if template.is_some() {
            Category::Template
        } else if private {
            Category::Private
        } else {
            Category::Tracked
        };

        Classification {
            path: ManagedPath {
                repo_path: repo_path.clone(),
                logical_name,
                suffixes,
                category,
                is_directory,
                template,
                private,
                canonical,
            },
            anomaly,
        }
    }

    /// Classify every path, collecting anomalies
    pub fn classify_all<'a, I>(&self, paths: I) -> (Vec<ManagedPath>, Vec<ClassificationAnomaly>)
    where
        I: IntoIterator<Item = (&'a RelPath, bool)>,
    {
        let mut managed = Vec::new();
        let mut anomalies = Vec::new();
        for (path, is_directory) in paths {
            let classification = self.classify_entry(path, is_directory);
            managed.push(classification.path);
            anomalies.extend(classification.anomaly);
        }
        (managed, anomalies)
    }
}

enum Parsed<'a> {
    Unmarked,
    Marked { base: &'a str, markers: Vec<Marker> },
    Malformed { reason: String },
}

fn parse_markers(file_name: &str) -> Parsed<'_> {
    let Some((base, list)) = file_name.split_once(MARKER_DELIMITER) else {
        return Parsed::Unmarked;
    };

    if base.is_empty() {
        return Parsed::Malformed {
            reason: "empty base name before marker list".to_string(),
        };
    }
    if list.is_empty() {
        return Parsed::Malformed {
            reason: "empty marker list".to_string(),
        };
    }

    // Right to left, so the reported problem is the rightmost one
    let mut markers = Vec::new();
    for raw in list.rsplit(',') {
        match parse_marker(raw) {
            Ok(marker) => markers.push(marker),
            Err(reason) => return Parsed::Malformed { reason },
        }
    }
    markers.reverse();

    Parsed::Marked { base, markers }
}

fn parse_marker(raw: &str) -> Result<Marker, String> {
    if raw.is_empty() {
        return Err("empty marker".to_string());
    }

    let (name, value) = match raw.split_once('.') {
        Some((name, value)) => (name, Some(value)),
        None => (raw, None),
    };

    let kind = MarkerKind::parse(name).ok_or_else(|| format!("unknown marker kind '{name}'"))?;

    match (kind.value_rule(), value) {
        (ValueRule::Required, None | Some("")) => {
            Err(format!("marker '{kind}' requires a value"))
        }
        (ValueRule::Forbidden, Some(_)) => Err(format!("marker '{kind}' takes no value")),
        (ValueRule::Optional, Some("")) => Ok(Marker::new(kind, None)),
        (_, value) => Ok(Marker::new(kind, value)),
    }
}

/// Conditions strictly increase in canonical order and at most one template
/// marker is present
fn is_canonical(suffixes: &[Marker]) -> bool {
    let strictly_increasing = suffixes
        .iter()
        .filter(|m| m.kind.is_condition())
        .map(|m| m.kind.priority())
        .collect::<Vec<_>>()
        .windows(2)
        .all(|pair| pair[0] < pair[1]);

    let templates = suffixes
        .iter()
        .filter(|m| m.kind == MarkerKind::Template)
        .count();

    strictly_increasing && templates <= 1
}
