//! Adapter implementations for engine traits
//!
//! This module provides the concrete decryption backends and the helper that
//! wires one of them into a [`ContentProcessor`].

pub mod command;
pub mod crypto;

pub use self::command::{CommandDecryptor, CommandError};
pub use self::crypto::AgeDecryptor;

use crate::content::{Decryptor, NoOpDecryptor};
use crate::processor::ContentProcessor;
use crate::render::BuiltinRenderer;
use thiserror::Error;

/// Error type for [`BackendDecryptor`]
#[derive(Error, Debug)]
pub enum BackendError {
    /// In-process age decryption failed
    #[error(transparent)]
    Age(#[from] hearth_crypto::Error),

    /// External decryption command failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// No backend configured
    #[error(transparent)]
    Unavailable(#[from] std::io::Error),
}

/// Decryption backend chosen at runtime
pub enum BackendDecryptor {
    /// In-process age
    Age(AgeDecryptor),
    /// External command
    Command(CommandDecryptor),
    /// Refuse encrypted content
    None(NoOpDecryptor),
}

impl Decryptor for BackendDecryptor {
    type Error = BackendError;

    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, Self::Error> {
        match self {
            Self::Age(d) => Ok(d.decrypt(encrypted)?),
            Self::Command(d) => Ok(d.decrypt(encrypted)?),
            Self::None(d) => Ok(d.decrypt(encrypted)?),
        }
    }
}

/// Processor used for a real sync
pub type BackendProcessor = ContentProcessor<BackendDecryptor, BuiltinRenderer>;

/// Create a [`ContentProcessor`] with the given decryption backend and the
/// built-in placeholder renderer
pub fn create_processor(decryptor: BackendDecryptor) -> BackendProcessor {
    ContentProcessor::new(decryptor, BuiltinRenderer)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::content::TemplateContext;
    use hearth_core::HostAttributes;
    use hearth_core::path::RelPath;
    use hearth_crypto::Identity;

    #[test]
    fn test_age_backend_processor() {
        let identity = Identity::generate();
        let recipient = identity.to_public().unwrap();
        let encrypted = hearth_crypto::encrypt(b"os={{ hearth.os }}", &[recipient]).unwrap();

        let processor = create_processor(BackendDecryptor::Age(AgeDecryptor::new(vec![identity])));
        let host = HostAttributes::new("Linux");
        let source = RelPath::from_slash(".env##template").unwrap();
        let context = TemplateContext {
            host: &host,
            source: &source,
        };
        let out = processor
            .process_content(encrypted, true, Some("default"), &context)
            .unwrap();
        assert_eq!(out, b"os=Linux");
    }

    #[test]
    fn test_none_backend_refuses() {
        let err = BackendDecryptor::None(NoOpDecryptor)
            .decrypt(b"age-encryption.org/v1")
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
