//! Status command implementation
//!
//! Plans the overlay without touching the work tree and shows how each
//! destination differs from what `apply` would write.

use clap::Args;
use hearth_core::path::RelPath;
use hearth_engine::manifest::Manifest;
use hearth_engine::plan::{MaterializationPlan, Production};
use hearth_engine::system::{EntryKind, RealSystem, System};
use hearth_engine::vcs::Vcs;
use owo_colors::OwoColorize;

use crate::cmd::plan_overlay;
use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// How a destination compares to its planned content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Destination does not exist yet
    Missing,
    /// Destination differs from the planned content
    Modified,
    /// Destination already holds the planned content
    Current,
    /// Source is the destination itself
    InPlace,
    /// Deployed file no longer resolves and will be deleted
    Removed,
    /// No alternate applies to this host
    Skipped,
    /// Content could not be produced
    Failed,
}

impl FileStatus {
    fn symbol(self) -> &'static str {
        match self {
            Self::Missing => "A",
            Self::Modified => "M",
            Self::Current | Self::InPlace => " ",
            Self::Removed => "D",
            Self::Skipped => "-",
            Self::Failed => "!",
        }
    }

    /// Whether `apply` would leave this entry alone
    pub fn is_clean(self) -> bool {
        matches!(self, Self::Current | Self::InPlace | Self::Skipped)
    }
}

/// Status of one logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Name relative to the work tree
    pub logical_name: RelPath,
    /// Comparison result
    pub status: FileStatus,
    /// Chosen source, or the reason for a skip or failure
    pub detail: Option<String>,
}

/// Show pending changes
#[derive(Debug, Default, Args)]
pub struct StatusCommand {
    /// Also list entries that are already up to date
    #[arg(short, long)]
    pub all: bool,
}

impl Command for StatusCommand {
    type Output = Vec<StatusLine>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<StatusLine>> {
        let vcs = context.open_repo()?;
        let previous = Manifest::load(&RealSystem, &context.manifest_path()?)?;
        let plan = plan_overlay(context, &vcs, &previous)?;
        let lines = collect_status(&plan, &RealSystem);

        match vcs.head()? {
            Some(head) => println!(
                "On branch {} ({})",
                head.branch.as_deref().unwrap_or("HEAD").bold(),
                head.commit.dimmed()
            ),
            None => println!("No commits yet"),
        }
        println!("Work tree {}\n", context.layout.work_tree());

        print_status(&lines, self.all);
        print_anomalies(&plan);
        Ok(lines)
    }
}

/// Compare every planned entry against the filesystem
pub fn collect_status(plan: &MaterializationPlan, system: &dyn System) -> Vec<StatusLine> {
    let mut lines = Vec::with_capacity(plan.targets.len() + plan.removals.len());

    for target in &plan.targets {
        let (status, detail) = match &target.production {
            Production::InPlace => (FileStatus::InPlace, None),
            Production::Failed { reason } => (FileStatus::Failed, Some(reason.clone())),
            Production::Ready { digest, .. } => {
                let status = match system.entry_kind(&target.destination) {
                    Ok(EntryKind::Missing) => FileStatus::Missing,
                    Ok(EntryKind::File) => match system.read_file(&target.destination) {
                        Ok(current) if digest.matches(&current) => FileStatus::Current,
                        _ => FileStatus::Modified,
                    },
                    Ok(EntryKind::Directory | EntryKind::DanglingSymlink) | Err(_) => {
                        FileStatus::Modified
                    }
                };
                (status, Some(target.source.to_slash()))
            }
        };
        lines.push(StatusLine {
            logical_name: target.logical_name.clone(),
            status,
            detail,
        });
    }

    lines.extend(plan.removals.iter().map(|removal| StatusLine {
        logical_name: removal.logical_name.clone(),
        status: FileStatus::Removed,
        detail: None,
    }));
    lines.extend(plan.skipped.iter().map(|skipped| StatusLine {
        logical_name: skipped.logical_name.clone(),
        status: FileStatus::Skipped,
        detail: Some(skipped.reason.clone()),
    }));

    lines.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
    lines
}

/// Print status lines, hiding clean entries unless `all` is set
pub(crate) fn print_status(lines: &[StatusLine], all: bool) {
    let mut shown = 0;
    for line in lines.iter().filter(|l| all || !l.status.is_clean()) {
        shown += 1;
        let symbol = line.status.symbol();
        let symbol = match line.status {
            FileStatus::Missing => symbol.green().to_string(),
            FileStatus::Modified => symbol.yellow().to_string(),
            FileStatus::Removed | FileStatus::Failed => symbol.red().to_string(),
            _ => symbol.dimmed().to_string(),
        };
        match &line.detail {
            Some(detail) => println!("{symbol} {} {}", line.logical_name, detail.dimmed()),
            None => println!("{symbol} {}", line.logical_name),
        }
    }

    if shown == 0 {
        println!("{} Everything is up to date", "●".bright_green());
    }
}

pub(crate) fn print_anomalies(plan: &MaterializationPlan) {
    for anomaly in &plan.anomalies {
        println!("{}: {anomaly}", "Warning".yellow());
    }
}
