//! # AI Provider Factory
//!
//! Creates the configured completion provider. Any consumer (cli, tests) goes
//! through here so the same configuration always yields the same provider.

use crate::{
    config::AiConfig,
    errors::PromptError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider},
};
use tracing::info;

/// Creates an AI provider from the `ai` configuration section.
///
/// - `gemini` requires an API key; the endpoint is derived from the model when
///   `api_url` is unset.
/// - `local` requires `api_url` and sends the model name with each request.
pub fn create_provider(config: &AiConfig) -> Result<Box<dyn AiProvider>, PromptError> {
    match config.provider.to_lowercase().as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                PromptError::MissingAiProvider(
                    "an API key is required for Gemini; set AI_API_KEY or ai.api_key".to_string(),
                )
            })?;
            let api_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| GeminiProvider::endpoint_for(&config.model));
            info!("Configuring Gemini provider with URL: {}", api_url);
            Ok(Box::new(GeminiProvider::new(api_url, api_key)?))
        }
        "local" => {
            let api_url = config.api_url.clone().ok_or_else(|| {
                PromptError::MissingAiProvider(
                    "ai.api_url is required for the local provider".to_string(),
                )
            })?;
            info!("Configuring Local AI provider with URL: {}", api_url);
            Ok(Box::new(LocalAiProvider::new(
                api_url,
                config.api_key.clone(),
                Some(config.model.clone()),
            )?))
        }
        other => Err(PromptError::MissingAiProvider(format!(
            "unknown provider '{other}'; expected 'gemini' or 'local'"
        ))),
    }
}
