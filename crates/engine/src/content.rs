//! Content processing traits
//!
//! This module defines the traits for content decryption and template
//! rendering. The engine uses these traits without depending on specific
//! implementations; see [`crate::adapters`] for the concrete backends.
//!
//! Whether content is encrypted is decided from its first bytes, never from
//! the file name.

use hearth_core::HostAttributes;
use hearth_core::path::RelPath;

/// Prefixes that identify an encrypted envelope
pub const ENVELOPE_PREFIXES: [&[u8]; 3] = [
    b"age-encryption.org/v1",
    b"-----BEGIN AGE ENCRYPTED FILE-----",
    b"-----BEGIN PGP MESSAGE-----",
];

/// Whether content starts with a recognized encryption envelope
///
/// Leading ASCII whitespace is ignored so armored files with a stray blank
/// line are still recognized.
///
/// ```
/// use hearth_engine::content::is_encrypted;
///
/// assert!(is_encrypted(b"-----BEGIN AGE ENCRYPTED FILE-----\nYWdl"));
/// assert!(!is_encrypted(b"[user]\nname = me\n"));
/// ```
pub fn is_encrypted(content: &[u8]) -> bool {
    let start = content
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(content.len());
    let content = &content[start..];
    ENVELOPE_PREFIXES
        .iter()
        .any(|prefix| content.starts_with(prefix))
}

/// Trait for content decryption
pub trait Decryptor: Send + Sync {
    /// Error type for decryption operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decrypt encrypted content
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails (e.g., invalid format, wrong key,
    /// corrupted data, external command timed out)
    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Values available to templates
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Attributes of the host being deployed to
    pub host: &'a HostAttributes,
    /// Repository path of the template
    pub source: &'a RelPath,
}

/// Trait for template rendering
pub trait TemplateRenderer: Send + Sync {
    /// Error type for rendering operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Render a template with the given context
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be rendered
    fn render(&self, template: &str, context: &TemplateContext<'_>) -> Result<String, Self::Error>;
}

/// Decryptor used when no backend is configured
///
/// Encrypted content is refused rather than deployed as ciphertext.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDecryptor;

impl Decryptor for NoOpDecryptor {
    type Error = std::io::Error;

    fn decrypt(&self, _encrypted: &[u8]) -> Result<Vec<u8>, Self::Error> {
        Err(std::io::Error::other(
            "content is encrypted but no decryption backend is configured",
        ))
    }
}

/// No-op renderer for testing or when templating is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRenderer;

impl TemplateRenderer for NoOpRenderer {
    type Error = std::io::Error;

    fn render(&self, template: &str, _context: &TemplateContext<'_>) -> Result<String, Self::Error> {
        Ok(template.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_envelope_detection() {
        assert!(is_encrypted(b"age-encryption.org/v1\n-> X25519 abc\n"));
        assert!(is_encrypted(b"-----BEGIN AGE ENCRYPTED FILE-----\n"));
        assert!(is_encrypted(b"\n  -----BEGIN PGP MESSAGE-----\n"));
        assert!(!is_encrypted(b"# -----BEGIN PGP MESSAGE-----"));
        assert!(!is_encrypted(b""));
        assert!(!is_encrypted(b"\x00\x01binary"));
    }

    #[test]
    fn test_noop_decryptor_refuses() {
        let err = NoOpDecryptor.decrypt(b"age-encryption.org/v1").unwrap_err();
        assert!(err.to_string().contains("no decryption backend"));
    }

    #[test]
    fn test_noop_renderer_returns_template() {
        let host = HostAttributes::new("Linux");
        let source = RelPath::from_slash("cfg##template").unwrap();
        let context = TemplateContext {
            host: &host,
            source: &source,
        };
        assert_eq!(
            NoOpRenderer.render("{{ hearth.os }}", &context).unwrap(),
            "{{ hearth.os }}"
        );
    }
}
