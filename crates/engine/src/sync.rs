//! Transactional materialization
//!
//! A plan is applied in three phases:
//!
//! 1. **Staging**: produced content is written to `.<name>.hearth-<txid>`
//!    next to its destination, creating missing parent directories.
//! 2. **Verifying**: staged files are read back and checked against their
//!    digest; destinations edited since the last sync are set aside.
//! 3. **Committing**: removals, then writes, then the manifest, one rename at
//!    a time. Every replaced file is first renamed to a backup.
//!
//! Any fault rolls back what was done, in reverse, so destinations are left
//! exactly as they were. Per-entry conflicts never abort the transaction.

use crate::error::{Error, Result};
use crate::hash::Digest;
use crate::manifest::{Manifest, ManifestEntry};
use crate::plan::{
    MODE_PRIVATE, MaterializationPlan, Production, Removal, ResolvedTarget, worker_pool,
};
use crate::report::{FailureKind, Outcome, Phase, ReportEntry, SyncReport, TransactionAbort};
use crate::system::{EntryKind, System};
use hearth_core::path::{AbsPath, RelPath};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, instrument, warn};

/// Mode of directories created for files under a private directory
const MODE_PRIVATE_DIR: u32 = 0o700;

/// Options for one sync
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Overwrite destinations that were edited or are not managed
    pub force: bool,
    /// Worker threads used for staging writes
    pub jobs: usize,
    /// Raised to cancel the transaction before it commits
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            jobs: std::thread::available_parallelism().map_or(1, std::num::NonZero::get),
            interrupt: None,
        }
    }
}

impl SyncOptions {
    /// Set the force flag
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the number of worker threads
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Set the interrupt flag
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

/// Step already taken during commit
#[derive(Debug)]
enum JournalStep {
    /// `original` was moved to `backup`
    Backup { original: AbsPath, backup: AbsPath },
    /// `staged` was moved to `destination`
    Placed {
        destination: AbsPath,
        staged: AbsPath,
    },
}

#[derive(Debug)]
struct Slot {
    source: Option<RelPath>,
    // `None` while the entry still depends on the commit
    outcome: Option<Outcome>,
}

struct PendingWrite<'p> {
    target: &'p ResolvedTarget,
    content: &'p [u8],
    digest: Digest,
    mode: u32,
    staged: AbsPath,
    existing: Option<Digest>,
}

struct Transaction<'p> {
    previous: &'p Manifest,
    manifest: Manifest,
    slots: BTreeMap<RelPath, Slot>,
    staged: Vec<AbsPath>,
    created_dirs: Vec<AbsPath>,
    journal: Vec<JournalStep>,
}

impl<'p> Transaction<'p> {
    fn new(previous: &'p Manifest) -> Self {
        Self {
            previous,
            manifest: previous.clone(),
            slots: BTreeMap::new(),
            staged: Vec::new(),
            created_dirs: Vec::new(),
            journal: Vec::new(),
        }
    }

    fn open(&mut self, logical_name: &RelPath, source: Option<&RelPath>, outcome: Option<Outcome>) {
        self.slots.insert(
            logical_name.clone(),
            Slot {
                source: source.cloned(),
                outcome,
            },
        );
    }

    fn settle(&mut self, logical_name: &RelPath, outcome: Outcome) {
        if let Some(slot) = self.slots.get_mut(logical_name) {
            slot.outcome = Some(outcome);
        }
    }

    fn conflict(&mut self, logical_name: &RelPath, reason: &str) {
        warn!(%logical_name, reason, "conflict");
        self.settle(
            logical_name,
            Outcome::failed(FailureKind::VerificationConflict, reason),
        );
    }
}

/// Applies a [`MaterializationPlan`] atomically
pub struct TransactionalSync<'a> {
    system: &'a dyn System,
    manifest_path: AbsPath,
    options: SyncOptions,
    txid: String,
}

impl<'a> TransactionalSync<'a> {
    /// Create a sync writing its manifest to `manifest_path`
    pub fn new(system: &'a dyn System, manifest_path: AbsPath, options: SyncOptions) -> Self {
        Self {
            system,
            manifest_path,
            options,
            txid: generate_txid(),
        }
    }

    /// Use a fixed transaction id
    #[must_use]
    pub fn with_txid(mut self, txid: impl Into<String>) -> Self {
        self.txid = txid.into();
        self
    }

    /// Transaction id used in scratch file names
    pub fn txid(&self) -> &str {
        &self.txid
    }

    /// Apply `plan` on top of what `previous` records
    ///
    /// Faults never surface as errors: they roll the transaction back and
    /// are described by [`SyncReport::abort`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool cannot be built.
    #[instrument(skip_all, fields(txid = %self.txid))]
    pub fn apply(&self, plan: &MaterializationPlan, previous: &Manifest) -> Result<SyncReport> {
        let pool = worker_pool(self.options.jobs)?;
        let mut tx = Transaction::new(previous);

        for skipped in &plan.skipped {
            tx.open(
                &skipped.logical_name,
                None,
                Some(Outcome::Skipped {
                    reason: skipped.reason.clone(),
                }),
            );
        }

        let mut writes = Vec::new();
        for target in &plan.targets {
            let outcome = match &target.production {
                Production::Ready {
                    content,
                    digest,
                    mode,
                } => {
                    writes.push(PendingWrite {
                        target,
                        content,
                        digest: *digest,
                        mode: *mode,
                        staged: self.scratch_path(&target.destination, ""),
                        existing: None,
                    });
                    None
                }
                Production::InPlace => {
                    tx.manifest.remove(&target.logical_name);
                    Some(Outcome::InPlace)
                }
                Production::Failed { reason } => Some(Outcome::failed(
                    FailureKind::ProductionFailure,
                    reason.clone(),
                )),
            };
            tx.open(&target.logical_name, Some(&target.source), outcome);
        }
        for removal in &plan.removals {
            tx.open(&removal.logical_name, None, None);
        }

        info!(phase = %Phase::Staging, writes = writes.len(), "staging");
        let writes = match self.stage(&pool, &mut tx, writes) {
            Ok(writes) => writes,
            Err(e) => return Ok(self.roll_back(tx, plan, Phase::Staging, &e)),
        };

        info!(phase = %Phase::Verifying, staged = writes.len(), "verifying");
        let (writes, removals) = match self.verify(&mut tx, writes, &plan.removals) {
            Ok(verified) => verified,
            Err(e) => return Ok(self.roll_back(tx, plan, Phase::Verifying, &e)),
        };

        if self
            .options
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            warn!("interrupted before commit");
            let e = Error::Other {
                context: "Interrupted".to_string(),
                source: "cancelled before commit".into(),
            };
            return Ok(self.roll_back(tx, plan, Phase::Verifying, &e));
        }

        info!(
            phase = %Phase::Committing,
            writes = writes.len(),
            removals = removals.len(),
            "committing"
        );
        if let Err(e) = self.commit(&mut tx, &writes, &removals) {
            return Ok(self.roll_back(tx, plan, Phase::Committing, &e));
        }

        for write in &writes {
            tx.settle(&write.target.logical_name, Outcome::Materialized);
        }
        for removal in &removals {
            tx.settle(&removal.logical_name, Outcome::Removed);
        }
        self.discard_backups(&tx);

        info!(phase = %Phase::Done, "sync complete");
        Ok(self.report(tx, plan, Phase::Done, None))
    }

    /// Decide what must be staged and write it
    fn stage<'p>(
        &self,
        pool: &rayon::ThreadPool,
        tx: &mut Transaction<'_>,
        writes: Vec<PendingWrite<'p>>,
    ) -> Result<Vec<PendingWrite<'p>>> {
        let mut to_stage = Vec::new();
        for mut write in writes {
            let target = write.target;
            match self.system.entry_kind(&target.destination)? {
                EntryKind::Directory => {
                    tx.conflict(&target.logical_name, "destination is a directory");
                }
                EntryKind::DanglingSymlink if !self.options.force => {
                    tx.conflict(&target.logical_name, "destination is a dangling symlink");
                }
                EntryKind::DanglingSymlink => {
                    debug!(logical_name = %target.logical_name, "replacing dangling symlink");
                    write.existing = Some(Digest::of(&[]));
                    to_stage.push(write);
                }
                EntryKind::File => {
                    let Some(current) = self.read_existing(&target.destination)? else {
                        tx.conflict(&target.logical_name, "destination vanished while reading");
                        continue;
                    };
                    if write.digest.matches(&current) {
                        debug!(logical_name = %target.logical_name, "unchanged");
                        tx.manifest.insert(
                            &target.logical_name,
                            ManifestEntry {
                                destination: target.destination.clone(),
                                sha256: write.digest,
                            },
                        );
                        tx.settle(&target.logical_name, Outcome::Unchanged);
                    } else {
                        write.existing = Some(Digest::of(&current));
                        to_stage.push(write);
                    }
                }
                EntryKind::Missing => to_stage.push(write),
            }
        }

        for write in &to_stage {
            if let Some(parent) = write.target.destination.parent() {
                let mode = (write.mode == MODE_PRIVATE).then_some(MODE_PRIVATE_DIR);
                self.ensure_dir(tx, &parent, mode)?;
            }
        }

        tx.staged.extend(to_stage.iter().map(|w| w.staged.clone()));
        let results: Vec<Result<()>> = pool.install(|| {
            to_stage
                .par_iter()
                .map(|w| self.system.write_file(&w.staged, w.content, Some(w.mode)))
                .collect()
        });
        results.into_iter().collect::<Result<Vec<()>>>()?;

        Ok(to_stage)
    }

    /// Check staged content and look for conflicting destinations
    fn verify<'p>(
        &self,
        tx: &mut Transaction<'_>,
        writes: Vec<PendingWrite<'p>>,
        removals: &'p [Removal],
    ) -> Result<(Vec<PendingWrite<'p>>, Vec<&'p Removal>)> {
        let mut verified = Vec::with_capacity(writes.len());
        for write in writes {
            let staged = self.system.read_file(&write.staged)?;
            if !write.digest.matches(&staged) {
                return Err(Error::StagedMismatch {
                    path: write.staged.clone(),
                });
            }

            let target = write.target;
            let logical_name = &target.logical_name;
            let recorded = tx.previous.get(logical_name).map(|e| e.sha256);
            let conflict = match (write.existing, recorded) {
                (Some(current), Some(recorded)) if current != recorded => {
                    Some("destination was modified since the last sync")
                }
                (Some(_), None) => Some("destination exists and is not managed by hearth"),
                _ => None,
            };

            match conflict {
                Some(reason) if !self.options.force => {
                    self.system.remove_file(&write.staged)?;
                    tx.conflict(logical_name, reason);
                }
                Some(reason) => {
                    debug!(%logical_name, reason, "overwriting because of force");
                    verified.push(write);
                }
                None => verified.push(write),
            }
        }

        let mut pending = Vec::with_capacity(removals.len());
        for removal in removals {
            let logical_name = &removal.logical_name;
            match self.system.entry_kind(&removal.destination)? {
                EntryKind::Missing => {
                    debug!(%logical_name, "already absent");
                    tx.manifest.remove(logical_name);
                    tx.settle(logical_name, Outcome::Removed);
                }
                EntryKind::Directory => tx.conflict(logical_name, "destination is a directory"),
                EntryKind::DanglingSymlink => {
                    tx.conflict(logical_name, "destination is a dangling symlink");
                }
                EntryKind::File => match self.read_existing(&removal.destination)? {
                    Some(current) if removal.recorded_digest.matches(&current) => {
                        pending.push(removal);
                    }
                    Some(_) => {
                        tx.conflict(logical_name, "destination was modified since the last sync");
                    }
                    None => {
                        debug!(%logical_name, "vanished before removal");
                        tx.manifest.remove(logical_name);
                        tx.settle(logical_name, Outcome::Removed);
                    }
                },
            }
        }

        Ok((verified, pending))
    }

    /// Swap everything into place, one rename at a time
    fn commit(
        &self,
        tx: &mut Transaction<'_>,
        writes: &[PendingWrite<'_>],
        removals: &[&Removal],
    ) -> Result<()> {
        for removal in removals {
            let backup = self.scratch_path(&removal.destination, ".bak");
            self.system.rename(&removal.destination, &backup)?;
            tx.journal.push(JournalStep::Backup {
                original: removal.destination.clone(),
                backup,
            });
            tx.manifest.remove(&removal.logical_name);
            debug!(logical_name = %removal.logical_name, "removed");
        }

        for write in writes {
            let destination = &write.target.destination;
            if write.existing.is_some() {
                let backup = self.scratch_path(destination, ".bak");
                self.system.rename(destination, &backup)?;
                tx.journal.push(JournalStep::Backup {
                    original: destination.clone(),
                    backup,
                });
            }
            self.system.rename(&write.staged, destination)?;
            tx.journal.push(JournalStep::Placed {
                destination: destination.clone(),
                staged: write.staged.clone(),
            });
            tx.manifest.insert(
                &write.target.logical_name,
                ManifestEntry {
                    destination: destination.clone(),
                    sha256: write.digest,
                },
            );
            debug!(logical_name = %write.target.logical_name, "placed");
        }

        if tx.manifest != *tx.previous {
            self.write_manifest(tx)?;
        }
        Ok(())
    }

    fn write_manifest(&self, tx: &mut Transaction<'_>) -> Result<()> {
        let text = tx.manifest.to_toml_string()?;
        if let Some(parent) = self.manifest_path.parent() {
            self.ensure_dir(tx, &parent, None)?;
        }
        let staged = self.scratch_path(&self.manifest_path, "");
        tx.staged.push(staged.clone());
        self.system.write_file(&staged, text.as_bytes(), None)?;
        self.system.rename(&staged, &self.manifest_path)?;
        debug!(path = %self.manifest_path, entries = tx.manifest.len(), "wrote manifest");
        Ok(())
    }

    /// Content of an existing destination, `None` if it disappeared
    fn read_existing(&self, path: &AbsPath) -> Result<Option<Vec<u8>>> {
        match self.system.read_file(path) {
            Ok(content) => Ok(Some(content)),
            Err(Error::FileRead { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create `dir` and any missing ancestors, remembering each for rollback
    fn ensure_dir(&self, tx: &mut Transaction<'_>, dir: &AbsPath, mode: Option<u32>) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir.clone());
        while let Some(path) = current {
            if self.system.exists(&path) {
                break;
            }
            current = path.parent();
            missing.push(path);
        }

        for path in missing.into_iter().rev() {
            self.system.create_dir(&path, mode)?;
            debug!(%path, ?mode, "created directory");
            tx.created_dirs.push(path);
        }
        Ok(())
    }

    /// Undo every step taken and report the abort
    fn roll_back(
        &self,
        mut tx: Transaction<'_>,
        plan: &MaterializationPlan,
        phase: Phase,
        cause: &Error,
    ) -> SyncReport {
        error!(%phase, error = %cause, "rolling back");

        for step in tx.journal.drain(..).rev() {
            let (from, to) = match step {
                JournalStep::Placed {
                    destination,
                    staged,
                } => (destination, staged),
                JournalStep::Backup { original, backup } => (backup, original),
            };
            if let Err(e) = self.system.rename(&from, &to) {
                error!(%from, %to, error = %e, "failed to undo step");
            }
        }

        for staged in &tx.staged {
            if self.system.exists(staged)
                && let Err(e) = self.system.remove_file(staged)
            {
                warn!(path = %staged, error = %e, "failed to remove staged file");
            }
        }

        for dir in tx.created_dirs.iter().rev() {
            if let Err(e) = self.system.remove_dir(dir) {
                debug!(path = %dir, error = %e, "left created directory in place");
            }
        }

        let abort = TransactionAbort {
            phase,
            reason: cause.to_string(),
        };
        for slot in tx.slots.values_mut() {
            if slot.outcome.is_none() {
                slot.outcome = Some(Outcome::failed(
                    FailureKind::TransactionAbort,
                    abort.reason.clone(),
                ));
            }
        }

        self.report(tx, plan, Phase::RolledBack, Some(abort))
    }

    fn discard_backups(&self, tx: &Transaction<'_>) {
        for step in &tx.journal {
            if let JournalStep::Backup { backup, .. } = step
                && let Err(e) = self.system.remove_file(backup)
            {
                warn!(path = %backup, error = %e, "failed to delete backup");
            }
        }
    }

    fn report(
        &self,
        tx: Transaction<'_>,
        plan: &MaterializationPlan,
        phase: Phase,
        abort: Option<TransactionAbort>,
    ) -> SyncReport {
        let entries = tx
            .slots
            .into_iter()
            .map(|(logical_name, slot)| ReportEntry {
                logical_name,
                source: slot.source,
                outcome: slot.outcome.unwrap_or_else(|| {
                    Outcome::failed(FailureKind::TransactionAbort, "not committed")
                }),
            })
            .collect();

        SyncReport {
            txid: self.txid.clone(),
            phase,
            abort,
            entries,
            anomalies: plan.anomalies.clone(),
        }
    }

    /// `.<name>.hearth-<txid><suffix>` next to `path`
    fn scratch_path(&self, path: &AbsPath, suffix: &str) -> AbsPath {
        let name = path.file_name().unwrap_or("hearth");
        path.with_file_name(&format!(".{name}.hearth-{}{suffix}", self.txid))
    }
}

/// Transaction id from the process id and the current time
fn generate_txid() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    format!("{}-{nanos:x}", std::process::id())
}
