//! Alternate resolution
//!
//! Candidates sharing a logical name compete for its destination. A candidate
//! is eligible only when every condition it carries holds for the host. The
//! eligible candidates are then ranked by a total order:
//!
//! 1. specificity: matching conditions other than `default`, descending
//! 2. number of markers, descending
//! 3. canonical marker order before non-canonical
//! 4. kind priority (os, distro, hostname, user, class, default, template)
//! 5. repository path, ascending
//!
//! The order never depends on the order candidates are listed in.

use crate::classify::{ManagedPath, MarkerKind};
use hearth_core::HostAttributes;
use hearth_core::path::RelPath;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Every candidate for one logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantGroup {
    /// Shared logical name
    pub logical_name: RelPath,
    /// Competing paths
    pub candidates: Vec<ManagedPath>,
}

/// Group managed paths by logical name, in logical name order
///
/// Groups are rebuilt from the tracked listing on every pass.
pub fn group_variants(paths: impl IntoIterator<Item = ManagedPath>) -> Vec<VariantGroup> {
    let mut groups: BTreeMap<RelPath, Vec<ManagedPath>> = BTreeMap::new();
    for path in paths {
        groups
            .entry(path.logical_name.clone())
            .or_default()
            .push(path);
    }
    groups
        .into_iter()
        .map(|(logical_name, candidates)| VariantGroup {
            logical_name,
            candidates,
        })
        .collect()
}

/// No candidate of a group applies to this host
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no alternate of {logical_name} applies to this host ({candidates} candidates)")]
pub struct NotFound {
    /// Logical name of the group
    pub logical_name: RelPath,
    /// Number of candidates considered
    pub candidates: usize,
}

/// Whether every condition of `path` holds for `host`
pub fn is_eligible(path: &ManagedPath, host: &HostAttributes) -> bool {
    path.conditions().all(|marker| marker.matches(host))
}

/// Number of matching conditions other than `default`
pub fn specificity(path: &ManagedPath, host: &HostAttributes) -> usize {
    path.conditions()
        .filter(|marker| marker.kind != MarkerKind::Default && marker.matches(host))
        .count()
}

/// Selects the best candidate of a variant group for one host
#[derive(Debug, Clone, Copy)]
pub struct AlternateResolver<'a> {
    host: &'a HostAttributes,
}

impl<'a> AlternateResolver<'a> {
    /// Create a resolver for the given host
    pub fn new(host: &'a HostAttributes) -> Self {
        Self { host }
    }

    /// Pick the best eligible candidate
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] when every candidate has a mismatching condition.
    pub fn resolve<'g>(&self, group: &'g VariantGroup) -> Result<&'g ManagedPath, NotFound> {
        let winner = group
            .candidates
            .iter()
            .filter(|candidate| is_eligible(candidate, self.host))
            .min_by(|a, b| self.rank(a, b));

        match winner {
            Some(path) => {
                debug!(
                    logical_name = %group.logical_name,
                    source = %path.repo_path,
                    candidates = group.candidates.len(),
                    "resolved alternate"
                );
                Ok(path)
            }
            None => Err(NotFound {
                logical_name: group.logical_name.clone(),
                candidates: group.candidates.len(),
            }),
        }
    }

    /// Compare two eligible candidates; `Less` means `a` wins
    pub fn rank(&self, a: &ManagedPath, b: &ManagedPath) -> Ordering {
        specificity(b, self.host)
            .cmp(&specificity(a, self.host))
            .then_with(|| b.suffixes.len().cmp(&a.suffixes.len()))
            .then_with(|| b.canonical.cmp(&a.canonical))
            .then_with(|| kind_priorities(a).cmp(&kind_priorities(b)))
            .then_with(|| a.repo_path.cmp(&b.repo_path))
    }
}

/// Sorted kind priorities; a lexicographically smaller vector ranks first
fn kind_priorities(path: &ManagedPath) -> Vec<u8> {
    let mut priorities: Vec<u8> = path.suffixes.iter().map(|m| m.kind.priority()).collect();
    priorities.sort_unstable();
    priorities
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::classify::PathClassifier;

    fn group(paths: &[&str]) -> VariantGroup {
        let classifier = PathClassifier::default();
        let mut groups = group_variants(paths.iter().map(|p| {
            classifier
                .classify(&RelPath::from_slash(p).unwrap())
                .path
        }));
        assert_eq!(groups.len(), 1, "paths must share a logical name");
        groups.remove(0)
    }

    fn resolve(paths: &[&str], host: &HostAttributes) -> Result<String, NotFound> {
        let group = group(paths);
        AlternateResolver::new(host)
            .resolve(&group)
            .map(|p| p.repo_path.to_slash())
    }

    #[test]
    fn test_app_conf_examples() {
        let paths = ["app.conf##os.linux", "app.conf##os.darwin", "app.conf"];

        let linux = HostAttributes::new("Linux");
        assert_eq!(resolve(&paths, &linux).unwrap(), "app.conf##os.linux");

        let freebsd = HostAttributes::new("FreeBSD");
        assert_eq!(resolve(&paths, &freebsd).unwrap(), "app.conf");

        let unknown = HostAttributes::new("");
        let err = resolve(&paths[..2], &unknown).unwrap_err();
        assert_eq!(err.logical_name.to_slash(), "app.conf");
        assert_eq!(err.candidates, 2);
    }

    #[test]
    fn test_specificity_law() {
        let host = HostAttributes::new("Linux").with_hostname("box");
        let paths = ["cfg##os.Linux", "cfg##os.Linux,hostname.box"];
        assert_eq!(resolve(&paths, &host).unwrap(), "cfg##os.Linux,hostname.box");
    }

    #[test]
    fn test_disqualification_law() {
        let host = HostAttributes::new("Linux").with_hostname("box");
        let paths = ["cfg##os.Linux", "cfg##os.Linux,hostname.box,user.nobody"];
        assert_eq!(resolve(&paths, &host).unwrap(), "cfg##os.Linux");
    }

    #[test]
    fn test_default_beats_unmarked_and_loses_to_condition() {
        let host = HostAttributes::new("Linux");
        assert_eq!(resolve(&["cfg", "cfg##default"], &host).unwrap(), "cfg##default");
        assert_eq!(
            resolve(&["cfg##default", "cfg##os.Linux"], &host).unwrap(),
            "cfg##os.Linux"
        );
        assert_eq!(
            resolve(&["cfg##default", "cfg##os.Darwin"], &host).unwrap(),
            "cfg##default"
        );
    }

    #[test]
    fn test_template_beats_bare_file() {
        let host = HostAttributes::new("Linux");
        assert_eq!(resolve(&["cfg", "cfg##template"], &host).unwrap(), "cfg##template");
    }

    #[test]
    fn test_kind_priority_breaks_ties() {
        let host = HostAttributes::new("Linux").with_hostname("box");
        assert_eq!(
            resolve(&["cfg##hostname.box", "cfg##os.Linux"], &host).unwrap(),
            "cfg##os.Linux"
        );
    }

    #[test]
    fn test_canonical_beats_non_canonical() {
        let host = HostAttributes::new("Linux").with_hostname("box");
        let paths = ["cfg##hostname.box,os.Linux", "cfg##os.Linux,hostname.box"];
        assert_eq!(resolve(&paths, &host).unwrap(), "cfg##os.Linux,hostname.box");
    }

    #[test]
    fn test_path_order_is_final_tie_break() {
        let host = HostAttributes::new("Linux");
        let paths = ["cfg##o.Linux", "cfg##os.Linux"];
        assert_eq!(resolve(&paths, &host).unwrap(), "cfg##o.Linux");
    }

    #[test]
    fn test_resolution_ignores_input_order() {
        let host = HostAttributes::new("Linux")
            .with_distro("arch")
            .with_hostname("box")
            .with_user("alice")
            .with_class("work");
        let mut paths = vec![
            "cfg",
            "cfg##default",
            "cfg##os.Linux",
            "cfg##class.work",
            "cfg##user.alice",
            "cfg##hostname.box",
            "cfg##distro.arch",
            "cfg##os.Linux,class.work",
            "cfg##class.work,os.Linux",
            "cfg##hostname.box,user.alice",
            "cfg##os.Darwin,hostname.box,user.alice",
            "cfg##template",
        ];

        let expected = resolve(&paths, &host).unwrap();
        assert_eq!(expected, "cfg##os.Linux,class.work");

        for rotation in 1..paths.len() {
            paths.rotate_left(1);
            assert_eq!(resolve(&paths, &host).unwrap(), expected, "rotation {rotation}");
        }
        paths.reverse();
        assert_eq!(resolve(&paths, &host).unwrap(), expected);
    }

    #[test]
    fn test_group_variants_sorted_by_logical_name() {
        let classifier = PathClassifier::default();
        let groups = group_variants(
            ["b##os.Linux", "a", "b", "a##class.work"]
                .iter()
                .map(|p| classifier.classify(&RelPath::from_slash(p).unwrap()).path),
        );
        let names: Vec<_> = groups.iter().map(|g| g.logical_name.to_slash()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(groups[0].candidates.len(), 2);
    }
}
