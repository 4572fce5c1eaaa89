//! List command implementation
//!
//! Shows every tracked path as the classifier sees it, marking the alternate
//! chosen for this host.

use clap::Args;
use hearth_core::HostAttributes;
use hearth_engine::classify::{ManagedPath, PathClassifier};
use hearth_engine::resolve::{AlternateResolver, group_variants};
use hearth_engine::vcs::{TrackedPath, Vcs};
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// One classified path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Classified path
    pub path: ManagedPath,
    /// Whether this is the alternate deployed on this host
    pub selected: bool,
}

/// List tracked paths with their category and markers
#[derive(Debug, Default, Args)]
pub struct ListCommand {
    /// Only show the alternates chosen for this host
    #[arg(short, long)]
    pub selected: bool,
}

impl Command for ListCommand {
    type Output = Vec<ListEntry>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<ListEntry>> {
        let vcs = context.open_repo()?;
        let tracked = vcs.list_tracked_paths()?;
        let entries = classify_tracked(&context.classifier(), &context.host, &tracked);

        for entry in entries.iter().filter(|e| !self.selected || e.selected) {
            let marker = if entry.selected {
                "*".bright_green().to_string()
            } else {
                " ".to_string()
            };
            let markers: Vec<String> = entry.path.suffixes.iter().map(ToString::to_string).collect();
            println!(
                "{marker} {:<10} {} {}",
                entry.path.category.to_string().cyan(),
                entry.path.repo_path,
                markers.join(",").dimmed()
            );
        }
        Ok(entries)
    }
}

/// Classify tracked paths and mark the winner of each variant group
pub fn classify_tracked(
    classifier: &PathClassifier,
    host: &HostAttributes,
    tracked: &[TrackedPath],
) -> Vec<ListEntry> {
    let (managed, _anomalies) =
        classifier.classify_all(tracked.iter().map(|t| (&t.path, t.is_directory)));
    let resolver = AlternateResolver::new(host);

    let mut entries = Vec::with_capacity(managed.len());
    for group in group_variants(managed) {
        let winner = resolver.resolve(&group).ok().map(|w| w.repo_path.clone());
        entries.extend(group.candidates.into_iter().map(|path| ListEntry {
            selected: winner.as_ref() == Some(&path.repo_path),
            path,
        }));
    }
    entries
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use hearth_core::path::RelPath;
    use hearth_engine::classify::Category;

    fn tracked(paths: &[&str]) -> Vec<TrackedPath> {
        paths
            .iter()
            .map(|p| TrackedPath::file(RelPath::from_slash(p).unwrap()))
            .collect()
    }

    #[test]
    fn test_marks_one_winner_per_group() {
        let host = HostAttributes::new("Linux").with_hostname("box");
        let entries = classify_tracked(
            &PathClassifier::default(),
            &host,
            &tracked(&["app.conf", "app.conf##os.Linux", "app.conf##os.Darwin", ".bashrc"]),
        );

        let selected: Vec<String> = entries
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.path.repo_path.to_slash())
            .collect();
        assert_eq!(selected, vec![".bashrc", "app.conf##os.Linux"]);

        let darwin = entries
            .iter()
            .find(|e| e.path.repo_path.to_slash() == "app.conf##os.Darwin")
            .unwrap();
        assert_eq!(darwin.path.category, Category::Alternate);
        assert!(!darwin.selected);
    }

    #[test]
    fn test_no_winner_when_nothing_applies() {
        let host = HostAttributes::new("Linux");
        let entries = classify_tracked(
            &PathClassifier::default(),
            &host,
            &tracked(&["only##os.Darwin"]),
        );
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].selected);
    }
}
