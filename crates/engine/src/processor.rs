//! Content processing for decryption and template rendering
//!
//! The pipeline for a resolved source:
//! 1. Decrypt if the content starts with an encryption envelope
//! 2. Render if the source carries a template marker
//!
//! The order matters: an encrypted template is decrypted first, then rendered.

use crate::content::{Decryptor, NoOpDecryptor, NoOpRenderer, TemplateContext, TemplateRenderer};
use crate::error::{Error, Result};
use crate::render;

/// Content processor with pluggable decryption and rendering
pub struct ContentProcessor<D, R>
where
    D: Decryptor,
    R: TemplateRenderer,
{
    decryptor: D,
    renderer: R,
}

impl<D, R> ContentProcessor<D, R>
where
    D: Decryptor,
    R: TemplateRenderer,
{
    /// Create a new content processor
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_engine::content::NoOpDecryptor;
    /// use hearth_engine::processor::ContentProcessor;
    /// use hearth_engine::render::BuiltinRenderer;
    ///
    /// let processor = ContentProcessor::new(NoOpDecryptor, BuiltinRenderer);
    /// ```
    pub fn new(decryptor: D, renderer: R) -> Self {
        Self {
            decryptor,
            renderer,
        }
    }

    /// Process content already read from the repository
    ///
    /// `template` is the processor named by the source's template marker.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Decryption fails
    /// - The template processor is unknown
    /// - Template content is not valid UTF-8
    /// - Rendering fails
    pub fn process_content(
        &self,
        mut content: Vec<u8>,
        needs_decryption: bool,
        template: Option<&str>,
        context: &TemplateContext<'_>,
    ) -> Result<Vec<u8>> {
        let path_for_errors = context.source.to_slash();

        if needs_decryption {
            content = self
                .decryptor
                .decrypt(&content)
                .map_err(|e| Error::Decryption {
                    path: path_for_errors.clone(),
                    message: e.to_string(),
                })?;
        }

        if let Some(processor) = template {
            if !render::is_supported_processor(processor) {
                return Err(Error::TemplateRender {
                    path: path_for_errors,
                    message: format!("unsupported template processor '{processor}'"),
                });
            }

            let text = String::from_utf8(content).map_err(|e| Error::InvalidUtf8 {
                path: path_for_errors.clone(),
                source: e,
            })?;

            let rendered =
                self.renderer
                    .render(&text, context)
                    .map_err(|e| Error::TemplateRender {
                        path: path_for_errors,
                        message: e.to_string(),
                    })?;

            content = rendered.into_bytes();
        }

        Ok(content)
    }
}

/// Processor that refuses encrypted content and leaves templates untouched
pub type NoOpProcessor = ContentProcessor<NoOpDecryptor, NoOpRenderer>;

impl Default for NoOpProcessor {
    fn default() -> Self {
        Self::new(NoOpDecryptor, NoOpRenderer)
    }
}
