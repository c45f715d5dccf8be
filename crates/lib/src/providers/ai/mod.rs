pub mod gemini;
pub mod local;

use crate::errors::PromptError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A trait for interacting with a text completion service.
///
/// The service is a black box: it receives a system prompt and a user prompt and
/// answers with free-form text. Pulling SQL out of that text is the caller's job.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    ///
    /// Transport, authentication and quota problems are reported as errors;
    /// an answer without any text is `PromptError::EmptyCompletion`.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, PromptError>;
}

dyn_clone::clone_trait_object!(AiProvider);
