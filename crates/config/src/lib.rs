//! Configuration management for hearth
//!
//! This crate handles:
//! - Configuration loading and path resolution
//! - XDG directory management
//! - Logging initialization

pub mod config;
pub mod dirs;
pub mod logging;

// Re-export error types from core
pub use hearth_core::{Error, Result};

pub use config::{Config, EncryptionBackend, EncryptionConfig, GeneralConfig, SyncConfig};
pub use dirs::{config_dir, data_dir, state_dir};
