//! Apply command implementation
//!
//! Resolves alternates for this host and materializes them into the work tree
//! in one transaction.

use clap::Args;
use hearth_core::path::RelPath;
use hearth_engine::manifest::Manifest;
use hearth_engine::report::{Outcome, SyncReport};
use hearth_engine::sync::{SyncOptions, TransactionalSync};
use hearth_engine::system::RealSystem;
use hearth_engine::vcs::update_exclude;
use owo_colors::OwoColorize;
use tracing::{debug, warn};

use crate::cmd::plan_overlay;
use crate::cmd::status::{collect_status, print_anomalies, print_status};
use crate::command::Command;
use crate::common::{RepoLock, RuntimeContext};
use crate::error::{CommandError, Result};

/// Materialize the repository into the work tree
#[derive(Debug, Default, Args)]
pub struct ApplyCommand {
    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Overwrite files that were edited by hand or are not managed by hearth
    #[arg(short, long)]
    pub force: bool,
}

impl Command for ApplyCommand {
    /// `None` for a dry run
    type Output = Option<SyncReport>;

    fn execute(&self, context: &RuntimeContext) -> Result<Option<SyncReport>> {
        let vcs = context.open_repo()?;
        let manifest_path = context.manifest_path()?;

        if self.dry_run {
            let previous = Manifest::load(&RealSystem, &manifest_path)?;
            let plan = plan_overlay(context, &vcs, &previous)?;
            print_status(&collect_status(&plan, &RealSystem), false);
            print_anomalies(&plan);
            return Ok(None);
        }

        let _lock = RepoLock::acquire(&context.layout.lock_path())?;

        // Read the manifest under the lock so a concurrent run cannot change it
        let previous = Manifest::load(&RealSystem, &manifest_path)?;
        let plan = plan_overlay(context, &vcs, &previous)?;

        let options = SyncOptions::default()
            .with_force(self.force || context.config.sync.force)
            .with_jobs(context.config.jobs())
            .with_interrupt(context.interrupt.clone());
        let report = TransactionalSync::new(&RealSystem, manifest_path.clone(), options)
            .apply(&plan, &previous)?;

        print_report(&report);

        if report.abort.is_none() && context.config.sync.auto_exclude {
            let manifest = Manifest::load(&RealSystem, &manifest_path)?;
            let names: Vec<RelPath> = manifest.entries().map(|(name, _)| name).collect();
            if let Err(e) = update_exclude(&RealSystem, context.layout.git_dir(), &names) {
                warn!(error = %e, "failed to update info/exclude");
            } else {
                debug!(count = names.len(), "updated info/exclude");
            }
        }

        if let Some(abort) = &report.abort {
            return Err(CommandError::Aborted(abort.clone()));
        }

        let failed = report
            .entries
            .iter()
            .filter(|e| e.outcome.is_failure())
            .count();
        if failed > 0 {
            return Err(CommandError::ApplyFailed {
                failed,
                total: report.entries.len(),
            });
        }

        Ok(Some(report))
    }
}

/// Print changed and failed entries followed by a one line summary
pub(crate) fn print_report(report: &SyncReport) {
    for entry in &report.entries {
        match &entry.outcome {
            Outcome::Materialized => println!("{} {}", "✓".bright_green(), entry.logical_name),
            Outcome::Removed => println!("{} {}", "✗".bright_yellow(), entry.logical_name),
            Outcome::Failed { kind, reason } => println!(
                "{} {} {}",
                "!".bright_red(),
                entry.logical_name,
                format!("{kind}: {reason}").dimmed()
            ),
            Outcome::Skipped { reason } => {
                debug!(name = %entry.logical_name, %reason, "skipped");
            }
            Outcome::Unchanged | Outcome::InPlace => {}
        }
    }

    for anomaly in &report.anomalies {
        println!("{}: {anomaly}", "Warning".yellow());
    }

    if let Some(abort) = &report.abort {
        println!("{} {}", "●".bright_red(), abort.to_string().bright_red().bold());
        return;
    }

    let changed = report.count("materialized") + report.count("removed");
    let failed = report.count("failed");
    if failed > 0 {
        println!(
            "{} {} | {} {}",
            "●".bright_green(),
            changed.to_string().bright_green().bold(),
            "●".bright_red(),
            failed.to_string().bright_red().bold(),
        );
    } else if changed == 0 {
        println!("{} Everything is up to date", "●".bright_green());
    } else {
        println!(
            "{} {} applied",
            "●".bright_green(),
            changed.to_string().bright_green().bold()
        );
    }
}
