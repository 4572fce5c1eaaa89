//! Per-entry results of a sync pass

use crate::classify::ClassificationAnomaly;
use hearth_core::path::RelPath;
use serde::Serialize;
use std::fmt;

/// Why an entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Markers could not be used as written
    ClassificationAnomaly,
    /// No alternate applies to this host
    ResolutionNotFound,
    /// Reading, decrypting or rendering the source failed
    ProductionFailure,
    /// The destination changed behind our back
    VerificationConflict,
    /// The whole transaction was rolled back
    TransactionAbort,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClassificationAnomaly => "classification anomaly",
            Self::ResolutionNotFound => "resolution not found",
            Self::ProductionFailure => "production failure",
            Self::VerificationConflict => "verification conflict",
            Self::TransactionAbort => "transaction abort",
        })
    }
}

/// What happened to one logical name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    /// New content was written to the destination
    Materialized,
    /// The destination already held the produced content
    Unchanged,
    /// A previously managed destination was deleted
    Removed,
    /// The source is the destination itself
    InPlace,
    /// Nothing was done
    Skipped {
        /// Why
        reason: String,
    },
    /// The entry could not be deployed
    Failed {
        /// Failure class
        kind: FailureKind,
        /// Human readable detail
        reason: String,
    },
}

impl Outcome {
    /// Failure with the given kind
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether this outcome is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Materialized => "materialized",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
            Self::InPlace => "in place",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { kind, reason } => write!(f, "failed ({kind}): {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome for one logical name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Logical name the outcome belongs to
    pub logical_name: RelPath,
    /// Repository path that was deployed, when one was chosen
    pub source: Option<RelPath>,
    /// What happened
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Phase a transaction reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Writing staged files next to their destinations
    Staging,
    /// Reading staged files back and checking for conflicts
    Verifying,
    /// Swapping staged files into place
    Committing,
    /// Every change is in place
    Done,
    /// Every change was undone
    RolledBack,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Staging => "staging",
            Self::Verifying => "verifying",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::RolledBack => "rolled back",
        })
    }
}

/// Fatal failure that rolled a transaction back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("transaction aborted while {phase}: {reason}")]
pub struct TransactionAbort {
    /// Phase in which the fault happened
    pub phase: Phase,
    /// What went wrong
    pub reason: String,
}

/// Result of one sync pass
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Transaction identifier used in scratch file names
    pub txid: String,
    /// Final phase, [`Phase::Done`] or [`Phase::RolledBack`]
    pub phase: Phase,
    /// Why the transaction was rolled back
    pub abort: Option<TransactionAbort>,
    /// One entry per logical name, in logical name order
    pub entries: Vec<ReportEntry>,
    /// Classification problems found while planning
    pub anomalies: Vec<ClassificationAnomaly>,
}

impl SyncReport {
    /// Whether the pass finished without abort or failed entry
    pub fn is_success(&self) -> bool {
        self.abort.is_none() && !self.entries.iter().any(|e| e.outcome.is_failure())
    }

    /// Outcome recorded for a logical name
    pub fn outcome(&self, logical_name: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|e| e.logical_name.to_slash() == logical_name)
            .map(|e| &e.outcome)
    }

    /// Number of entries with the given label
    pub fn count(&self, label: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.label() == label)
            .count()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn entry(name: &str, outcome: Outcome) -> ReportEntry {
        ReportEntry {
            logical_name: RelPath::from_slash(name).unwrap(),
            source: None,
            outcome,
        }
    }

    #[test]
    fn test_success_requires_no_failures() {
        let mut report = SyncReport {
            txid: "1-1".to_string(),
            phase: Phase::Done,
            abort: None,
            entries: vec![entry("a", Outcome::Materialized), entry("b", Outcome::Unchanged)],
            anomalies: Vec::new(),
        };
        assert!(report.is_success());
        assert_eq!(report.outcome("b"), Some(&Outcome::Unchanged));

        report.entries.push(entry(
            "c",
            Outcome::failed(FailureKind::ProductionFailure, "boom"),
        ));
        assert!(!report.is_success());
        assert_eq!(report.count("failed"), 1);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = Outcome::failed(FailureKind::VerificationConflict, "edited");
        assert_eq!(outcome.to_string(), "failed (verification conflict): edited");
        assert_eq!(
            Outcome::Skipped {
                reason: "directory".to_string()
            }
            .to_string(),
            "skipped: directory"
        );
    }

    #[test]
    fn test_abort_display() {
        let abort = TransactionAbort {
            phase: Phase::Committing,
            reason: "disk full".to_string(),
        };
        assert_eq!(
            abort.to_string(),
            "transaction aborted while committing: disk full"
        );
    }
}
