//! # Prompt Template Modules
//!
//! Templates are plain constants; `assembler` turns them into completion requests.

pub mod assembler;
pub mod core;
pub mod tasks;

pub use assembler::{CompletionRequest, ConversationTurn, PromptAssembler};

use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid template placeholder regex"));

/// Fills `{name}` placeholders in one pass. Substituted text is never rescanned,
/// so a placeholder-like string inside a value stays as written. Unknown
/// placeholders are left untouched.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}
