//! Overlay planning
//!
//! Turns the tracked listing into a [`MaterializationPlan`]: one resolved
//! target per logical name with its content already produced, plus the
//! previously deployed files that must go away.
//!
//! Producing content (reading, decrypting, rendering) runs on a bounded
//! worker pool. A failure only marks its own target.

use crate::classify::{ClassificationAnomaly, ManagedPath, PathClassifier};
use crate::content::{Decryptor, TemplateContext, TemplateRenderer, is_encrypted};
use crate::error::{Error, Result};
use crate::hash::Digest;
use crate::manifest::Manifest;
use crate::processor::ContentProcessor;
use crate::resolve::{AlternateResolver, group_variants};
use crate::vcs::Vcs;
use hearth_core::HostAttributes;
use hearth_core::path::{AbsPath, RelPath};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// Mode of files under a private directory
pub const MODE_PRIVATE: u32 = 0o600;
/// Mode of executable files
pub const MODE_EXECUTABLE: u32 = 0o755;
/// Mode of every other file
pub const MODE_REGULAR: u32 = 0o644;

/// Build a worker pool with `jobs` threads
///
/// # Errors
///
/// Returns an error if the pool cannot be created.
pub fn worker_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("hearth-worker-{i}"))
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))
}

/// Produced content of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Production {
    /// Content ready to be written
    Ready {
        /// Bytes to write
        content: Vec<u8>,
        /// Digest of `content`
        digest: Digest,
        /// Permissions of the destination
        mode: u32,
    },
    /// The source is the destination file itself
    InPlace,
    /// Content could not be produced
    Failed {
        /// What went wrong
        reason: String,
    },
}

/// A logical name with its chosen source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Name relative to the work tree
    pub logical_name: RelPath,
    /// Chosen repository path
    pub source: RelPath,
    /// Where the content goes
    pub destination: AbsPath,
    /// Whether the source was encrypted
    pub needs_decryption: bool,
    /// Whether the source is a template
    pub needs_render: bool,
    /// Produced content
    pub production: Production,
}

/// A previously deployed file whose logical name is no longer tracked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Logical name recorded in the manifest
    pub logical_name: RelPath,
    /// File to delete
    pub destination: AbsPath,
    /// Digest written by the last sync
    pub recorded_digest: Digest,
}

/// A logical name that produced no target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Logical name
    pub logical_name: RelPath,
    /// Why it was skipped
    pub reason: String,
}

/// Everything one sync pass will do
#[derive(Debug, Clone, Default)]
pub struct MaterializationPlan {
    /// Targets in logical name order
    pub targets: Vec<ResolvedTarget>,
    /// Manifest entries to delete
    pub removals: Vec<Removal>,
    /// Logical names without a target
    pub skipped: Vec<Skipped>,
    /// Classification problems
    pub anomalies: Vec<ClassificationAnomaly>,
}

impl MaterializationPlan {
    /// Target for a logical name
    pub fn target(&self, logical_name: &str) -> Option<&ResolvedTarget> {
        self.targets
            .iter()
            .find(|t| t.logical_name.to_slash() == logical_name)
    }
}

/// Builds materialization plans for one host and work tree
pub struct OverlayMaterializer<'a, D, R>
where
    D: Decryptor,
    R: TemplateRenderer,
{
    host: &'a HostAttributes,
    work_tree: &'a AbsPath,
    classifier: &'a PathClassifier,
    processor: &'a ContentProcessor<D, R>,
    jobs: usize,
}

impl<'a, D, R> OverlayMaterializer<'a, D, R>
where
    D: Decryptor,
    R: TemplateRenderer,
{
    /// Create a materializer
    pub fn new(
        host: &'a HostAttributes,
        work_tree: &'a AbsPath,
        classifier: &'a PathClassifier,
        processor: &'a ContentProcessor<D, R>,
    ) -> Self {
        Self {
            host,
            work_tree,
            classifier,
            processor,
            jobs: std::thread::available_parallelism().map_or(1, std::num::NonZero::get),
        }
    }

    /// Limit production to `jobs` worker threads
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Plan the overlay of everything `vcs` tracks
    ///
    /// `manifest` is the record of the previous sync; entries whose logical
    /// name is no longer tracked become removals.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracked listing cannot be read or the worker
    /// pool cannot be built. Per-target problems are recorded in the plan.
    #[instrument(skip_all, fields(work_tree = %self.work_tree))]
    pub fn plan(&self, vcs: &dyn Vcs, manifest: &Manifest) -> Result<MaterializationPlan> {
        let tracked = vcs.list_tracked_paths()?;
        let (managed, anomalies) = self
            .classifier
            .classify_all(tracked.iter().map(|t| (&t.path, t.is_directory)));
        for anomaly in &anomalies {
            warn!(path = %anomaly.repo_path, reason = %anomaly.reason, "classification anomaly");
        }

        let resolver = AlternateResolver::new(self.host);
        let mut chosen: Vec<&ManagedPath> = Vec::new();
        let mut skipped = Vec::new();
        let groups = group_variants(managed);
        for group in &groups {
            match resolver.resolve(group) {
                Ok(path) if path.is_directory => {
                    debug!(logical_name = %group.logical_name, "skipping directory entry");
                    skipped.push(Skipped {
                        logical_name: group.logical_name.clone(),
                        reason: "directory entries are not materialized".to_string(),
                    });
                }
                Ok(path) => chosen.push(path),
                Err(not_found) => {
                    warn!(logical_name = %not_found.logical_name, "{not_found}");
                    skipped.push(Skipped {
                        logical_name: not_found.logical_name.clone(),
                        reason: not_found.to_string(),
                    });
                }
            }
        }

        let pool = worker_pool(self.jobs)?;
        let targets: Vec<ResolvedTarget> =
            pool.install(|| chosen.par_iter().map(|path| self.produce(vcs, path)).collect());

        // Names still tracked keep their deployed file even without a target
        let live: BTreeSet<&RelPath> = groups.iter().map(|g| &g.logical_name).collect();
        let removals: Vec<Removal> = manifest
            .entries()
            .filter(|(name, _)| !live.contains(name))
            .map(|(logical_name, entry)| Removal {
                logical_name,
                destination: entry.destination.clone(),
                recorded_digest: entry.sha256,
            })
            .collect();

        info!(
            targets = targets.len(),
            removals = removals.len(),
            skipped = skipped.len(),
            anomalies = anomalies.len(),
            "planned overlay"
        );

        Ok(MaterializationPlan {
            targets,
            removals,
            skipped,
            anomalies,
        })
    }

    fn produce(&self, vcs: &dyn Vcs, path: &ManagedPath) -> ResolvedTarget {
        let destination = self.work_tree.join(&path.logical_name);
        let mut target = ResolvedTarget {
            logical_name: path.logical_name.clone(),
            source: path.repo_path.clone(),
            destination,
            needs_decryption: false,
            needs_render: path.template.is_some(),
            production: Production::InPlace,
        };

        let blob = match vcs.read_blob(&path.repo_path) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(source = %path.repo_path, error = %e, "cannot read source");
                target.production = Production::Failed {
                    reason: e.to_string(),
                };
                return target;
            }
        };
        target.needs_decryption = is_encrypted(&blob.data);

        let checked_out_in_place = vcs.checkout_root() == Some(self.work_tree);
        if checked_out_in_place && path.is_unmarked() && !target.needs_decryption {
            debug!(logical_name = %path.logical_name, "already in place");
            return target;
        }

        let context = TemplateContext {
            host: self.host,
            source: &path.repo_path,
        };
        target.production = match self.processor.process_content(
            blob.data,
            target.needs_decryption,
            path.template.as_deref(),
            &context,
        ) {
            Ok(content) => {
                let mode = if path.private {
                    MODE_PRIVATE
                } else if blob.executable {
                    MODE_EXECUTABLE
                } else {
                    MODE_REGULAR
                };
                debug!(
                    logical_name = %path.logical_name,
                    source = %path.repo_path,
                    bytes = content.len(),
                    "produced content"
                );
                Production::Ready {
                    digest: Digest::of(&content),
                    content,
                    mode,
                }
            }
            Err(e) => {
                warn!(source = %path.repo_path, error = %e, "production failed");
                Production::Failed {
                    reason: e.to_string(),
                }
            }
        };
        target
    }
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::testing::MemoryVcs;
    use super::*;
    use crate::content::NoOpDecryptor;
    use crate::manifest::ManifestEntry;
    use crate::processor::NoOpProcessor;
    use crate::render::BuiltinRenderer;

    fn home() -> AbsPath {
        AbsPath::new("/home/alice".into()).unwrap()
    }

    fn linux() -> HostAttributes {
        HostAttributes::new("Linux")
            .with_hostname("box")
            .with_user("alice")
    }

    fn plan_with(vcs: &MemoryVcs, host: &HostAttributes, manifest: &Manifest) -> MaterializationPlan {
        let work_tree = home();
        let classifier = PathClassifier::default();
        let processor = ContentProcessor::new(NoOpDecryptor, BuiltinRenderer);
        OverlayMaterializer::new(host, &work_tree, &classifier, &processor)
            .with_jobs(2)
            .plan(vcs, manifest)
            .unwrap()
    }

    #[test]
    fn test_resolves_and_produces() {
        let vcs = MemoryVcs::with(&[
            ("app.conf##os.Linux", "linux"),
            ("app.conf##os.Darwin", "mac"),
            ("app.conf", "plain"),
            (".profile##template", "user={{ hearth.user }}"),
        ]);
        let plan = plan_with(&vcs, &linux(), &Manifest::new());

        let app = plan.target("app.conf").unwrap();
        assert_eq!(app.source.to_slash(), "app.conf##os.Linux");
        assert_eq!(app.destination.as_path().to_str(), Some("/home/alice/app.conf"));
        match &app.production {
            Production::Ready { content, digest, mode } => {
                assert_eq!(content, b"linux");
                assert!(digest.matches(b"linux"));
                assert_eq!(*mode, MODE_REGULAR);
            }
            other => panic!("unexpected {other:?}"),
        }

        let profile = plan.target(".profile").unwrap();
        assert!(profile.needs_render);
        assert!(matches!(
            &profile.production,
            Production::Ready { content, .. } if content == b"user=alice"
        ));
    }

    #[test]
    fn test_not_found_is_skipped() {
        let vcs = MemoryVcs::with(&[("only-mac##os.Darwin", "x"), ("a", "a")]);
        let plan = plan_with(&vcs, &linux(), &Manifest::new());
        assert!(plan.target("only-mac").is_none());
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].logical_name.to_slash(), "only-mac");
        assert!(plan.target("a").is_some());
    }

    #[test]
    fn test_private_mode_and_executable_mode() {
        let mut vcs = MemoryVcs::with(&[(".ssh/config", "Host *"), ("bin/run", "#!/bin/sh")]);
        vcs.files.get_mut("bin/run").unwrap().1 = true;
        let plan = plan_with(&vcs, &linux(), &Manifest::new());

        let mode = |name: &str| match plan.target(name).unwrap().production {
            Production::Ready { mode, .. } => mode,
            ref other => panic!("unexpected {other:?}"),
        };
        assert_eq!(mode(".ssh/config"), MODE_PRIVATE);
        assert_eq!(mode("bin/run"), MODE_EXECUTABLE);
    }

    #[test]
    fn test_encrypted_without_backend_fails_only_that_target() {
        let vcs = MemoryVcs::with(&[
            ("secret", "-----BEGIN AGE ENCRYPTED FILE-----\nabc\n"),
            ("plain", "ok"),
        ]);
        let plan = plan_with(&vcs, &linux(), &Manifest::new());
        let secret = plan.target("secret").unwrap();
        assert!(secret.needs_decryption);
        assert!(matches!(secret.production, Production::Failed { .. }));
        assert!(matches!(
            plan.target("plain").unwrap().production,
            Production::Ready { .. }
        ));
    }

    #[test]
    fn test_in_place_when_checked_out_into_work_tree() {
        let mut vcs = MemoryVcs::with(&[(".bashrc", "x"), (".vimrc##default", "y")]);
        vcs.checkout_root = Some(home());
        let plan = plan_with(&vcs, &linux(), &Manifest::new());
        assert_eq!(plan.target(".bashrc").unwrap().production, Production::InPlace);
        assert!(matches!(
            plan.target(".vimrc").unwrap().production,
            Production::Ready { .. }
        ));
    }

    #[test]
    fn test_removals_from_manifest() {
        let vcs = MemoryVcs::with(&[("new.cfg", "n")]);
        let mut manifest = Manifest::new();
        manifest.insert(
            &RelPath::from_slash("old.cfg").unwrap(),
            ManifestEntry {
                destination: home().join(&RelPath::from_slash("old.cfg").unwrap()),
                sha256: Digest::of(b"o"),
            },
        );
        manifest.insert(
            &RelPath::from_slash("new.cfg").unwrap(),
            ManifestEntry {
                destination: home().join(&RelPath::from_slash("new.cfg").unwrap()),
                sha256: Digest::of(b"n"),
            },
        );

        let plan = plan_with(&vcs, &linux(), &manifest);
        assert_eq!(plan.removals.len(), 1);
        assert_eq!(plan.removals[0].logical_name.to_slash(), "old.cfg");
        assert_eq!(plan.removals[0].recorded_digest, Digest::of(b"o"));
    }

    #[test]
    fn test_still_tracked_name_is_not_removed() {
        let vcs = MemoryVcs::with(&[("cfg##class.work", "w")]);
        let mut manifest = Manifest::new();
        manifest.insert(
            &RelPath::from_slash("cfg").unwrap(),
            ManifestEntry {
                destination: home().join(&RelPath::from_slash("cfg").unwrap()),
                sha256: Digest::of(b"w"),
            },
        );

        let plan = plan_with(&vcs, &linux().with_class("home"), &manifest);
        assert!(plan.removals.is_empty());
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].logical_name.to_slash(), "cfg");
    }

    #[test]
    fn test_anomalies_are_collected() {
        let vcs = MemoryVcs::with(&[("weird##bogus.x", "w")]);
        let plan = plan_with(&vcs, &linux(), &Manifest::new());
        assert_eq!(plan.anomalies.len(), 1);
        assert!(plan.target("weird##bogus.x").is_some());
    }

    #[test]
    fn test_noop_processor_plans_plain_files() {
        let vcs = MemoryVcs::with(&[("a", "a")]);
        let host = linux();
        let work_tree = home();
        let classifier = PathClassifier::default();
        let processor = NoOpProcessor::default();
        let plan = OverlayMaterializer::new(&host, &work_tree, &classifier, &processor)
            .plan(&vcs, &Manifest::new())
            .unwrap();
        assert_eq!(plan.targets.len(), 1);
    }
}
