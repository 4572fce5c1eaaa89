//! Core types and utilities for hearth
//!
//! This is the foundation crate that all other hearth crates depend on.
//! It provides:
//! - Path types (`AbsPath`, `RelPath`)
//! - Base error types
//! - Host attribute detection
//! - The repository layout shared by the engine and the CLI
//!
//! This crate has no dependencies on other hearth crates.

pub mod error;
pub mod host;
pub mod layout;
pub mod path;

pub use error::{Error, Result};
pub use host::{HostAttributes, HostContext};
pub use layout::RepoLayout;
