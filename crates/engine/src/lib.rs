//! # Hearth Engine
//!
//! Alternate resolution and transactional overlay engine for the hearth
//! dotfile manager.
//!
//! Data flows one way through the pipeline:
//!
//! - **Classification** ([`classify`]): parse `##` markers of tracked paths
//! - **Resolution** ([`resolve`]): pick the best alternate for this host
//! - **Planning** ([`plan`]): read, decrypt and render each chosen source
//! - **Sync** ([`sync`]): stage, verify and commit the result atomically
//!
//! Collaborators sit behind narrow traits: [`vcs::Vcs`] for the repository,
//! [`content::Decryptor`] for encryption backends and [`system::System`] for
//! the filesystem.

pub mod adapters;
pub mod classify;
pub mod content;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod plan;
pub mod processor;
pub mod render;
pub mod report;
pub mod resolve;
pub mod sync;
pub mod system;
pub mod vcs;

// Re-export path types from core
pub use hearth_core::path::{AbsPath, RelPath};

pub use error::{Error, Result};

// Re-export commonly used types
pub use classify::{Category, ManagedPath, Marker, MarkerKind, PathClassifier};
pub use manifest::Manifest;
pub use plan::{MaterializationPlan, OverlayMaterializer, Production, ResolvedTarget};
pub use report::{FailureKind, Outcome, Phase, SyncReport};
pub use resolve::AlternateResolver;
pub use sync::{SyncOptions, TransactionalSync};
pub use vcs::{DirectorySource, Git2Vcs, Vcs};
