//! Built-in placeholder renderer
//!
//! Substitutes a fixed set of host values into template content:
//!
//! | Placeholder            | Value                      |
//! |------------------------|----------------------------|
//! | `{{ hearth.os }}`      | operating system           |
//! | `{{ hearth.distro }}`  | distribution               |
//! | `{{ hearth.hostname }}`| short host name            |
//! | `{{ hearth.user }}`    | login name                 |
//! | `{{ hearth.class }}`   | class label                |
//! | `{{ hearth.source }}`  | repository path of the file|
//!
//! Whitespace inside the braces is optional. Unset values render empty and
//! anything else between braces is left verbatim.

use crate::content::{TemplateContext, TemplateRenderer};
use regex::{Captures, Regex};
use std::convert::Infallible;
use std::sync::LazyLock;

/// Cached placeholder pattern
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*hearth\.([a-z]+)\s*\}\}")
        .expect("Failed to compile placeholder pattern")
});

/// Template processors handled by [`BuiltinRenderer`]
pub const PROCESSORS: [&str; 2] = ["default", "builtin"];

/// Whether the named template processor is available
pub fn is_supported_processor(name: &str) -> bool {
    PROCESSORS.contains(&name)
}

/// Placeholder substitution renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRenderer;

impl TemplateRenderer for BuiltinRenderer {
    type Error = Infallible;

    fn render(&self, template: &str, context: &TemplateContext<'_>) -> Result<String, Self::Error> {
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            let host = context.host;
            let value = match &caps[1] {
                "os" => Some(host.os.clone()),
                "distro" => Some(host.distro.clone().unwrap_or_default()),
                "hostname" => Some(host.hostname.clone().unwrap_or_default()),
                "user" => Some(host.user.clone().unwrap_or_default()),
                "class" => Some(host.class.clone().unwrap_or_default()),
                "source" => Some(context.source.to_slash()),
                _ => None,
            };
            value.unwrap_or_else(|| caps[0].to_string())
        });

        Ok(rendered.into_owned())
    }
}
