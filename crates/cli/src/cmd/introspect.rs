//! Introspect command implementation
//!
//! Prints what hearth knows about this machine and repository, one value per
//! line so scripts can consume it.

use clap::{Args, ValueEnum};
use hearth_engine::classify::{MarkerKind, ValueRule};

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// What to introspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Topic {
    /// Detected host attributes
    Host,
    /// Supported marker kinds
    Markers,
    /// Repository layout
    Repo,
}

/// Show host attributes, marker kinds or repository paths
#[derive(Debug, Args)]
pub struct IntrospectCommand {
    /// Topic to show
    #[arg(value_enum)]
    pub topic: Topic,
}

impl Command for IntrospectCommand {
    type Output = Vec<String>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<String>> {
        let lines = match self.topic {
            Topic::Host => host_lines(context),
            Topic::Markers => marker_lines(),
            Topic::Repo => repo_lines(context)?,
        };
        for line in &lines {
            println!("{line}");
        }
        Ok(lines)
    }
}

fn host_lines(context: &RuntimeContext) -> Vec<String> {
    let host = &context.host;
    let field = |value: Option<&str>| value.unwrap_or("").to_string();
    vec![
        format!("os={}", host.os),
        format!("distro={}", field(host.distro.as_deref())),
        format!("hostname={}", field(host.hostname.as_deref())),
        format!("user={}", field(host.user.as_deref())),
        format!("class={}", field(host.class.as_deref())),
    ]
}

fn marker_lines() -> Vec<String> {
    MarkerKind::ALL
        .iter()
        .map(|kind| {
            let mut line = kind.name().to_string();
            if let Some(alias) = kind.alias() {
                line.push_str(&format!(" ({alias})"));
            }
            match kind.value_rule() {
                ValueRule::Required => line.push_str(" <value>"),
                ValueRule::Optional => line.push_str(" [processor]"),
                ValueRule::Forbidden => {}
            }
            line
        })
        .collect()
}

fn repo_lines(context: &RuntimeContext) -> Result<Vec<String>> {
    Ok(vec![
        format!("repo={}", context.layout.git_dir()),
        format!("work-tree={}", context.layout.work_tree()),
        format!("manifest={}", context.manifest_path()?),
    ])
}
