use crate::generator::GenerationAttempt;
use crate::sql::Rejection;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the AI and storage providers and the client plumbing around them.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI API: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI API response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI API returned an error: {0}")]
    AiApi(String),
    #[error("AI API returned an empty completion")]
    EmptyCompletion,
    #[error("AI provider is not configured: {0}")]
    MissingAiProvider(String),
    #[error("Storage provider is not configured")]
    MissingStorageProvider,
    #[error("Storage query failed: {0}")]
    StorageQueryFailed(String),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Query generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// The ways a text-to-SQL generation run can end without an accepted query.
///
/// Validation and extraction failures never surface directly: the retry loop
/// absorbs them and only reports them through `RetryBudgetExhausted`.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("completion service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("completion service did not answer within {0:?}")]
    CompletionTimeout(Duration),
    #[error("no valid query after {} attempt(s); last rejection: {last_reason}", .attempts.len())]
    RetryBudgetExhausted {
        last_reason: Rejection,
        attempts: Vec<GenerationAttempt>,
    },
    #[error("query generation was cancelled")]
    Cancelled,
}

impl GenerationError {
    /// True when the retry budget ran out, as opposed to an immediate abort.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::RetryBudgetExhausted { .. })
    }
}

/// Why an optional matcher signal could not be computed for a column pair.
///
/// This is never fatal: the signal is dropped from the weighted average.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalUnavailable {
    #[error("no value sample was supplied")]
    NoSample,
    #[error("the value sample was empty")]
    EmptySample,
    #[error("value sampling timed out after {0:?}")]
    Timeout(Duration),
    #[error("value sampling failed: {0}")]
    Fetch(String),
}
