//! # Text-to-SQL Generation
//!
//! Drives one question through a bounded loop of completion, extraction and
//! validation. Every rejected attempt is recorded, and the next prompt is built
//! from the recorded attempts so the model sees why its last answer failed.
//!
//! ```text
//! Idle -> Prompting -> AwaitingCompletion -> Extracting -> Validating
//!                                                            |-> DryRunning -> Done
//!                                                            |-> Retrying -> Prompting
//!                                                            `-> Exhausted
//! ```
//!
//! With a dry-run hook, a candidate the validator accepted is also checked on
//! the warehouse. A dry-run failure is recorded as a rejection and retried like
//! any other.

use crate::config::GenerationConfig;
use crate::errors::{GenerationError, PromptError};
use crate::prompts::{CompletionRequest, ConversationTurn, PromptAssembler};
use crate::providers::ai::AiProvider;
use crate::providers::db::Storage;
use crate::sql::{ExtractionPipeline, Rejection, RejectionKind, SqlValidator, ValidationOutcome};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything the generator needs to answer one question.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub question: String,
    /// Pre-rendered schema text, usually from `SchemaContextBuilder`.
    pub schema_context: String,
    pub history: Vec<ConversationTurn>,
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>, schema_context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            schema_context: schema_context.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

/// The record of one round trip to the completion service.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    /// 1-based.
    pub index: usize,
    pub prompt: CompletionRequest,
    pub completion: String,
    pub extracted_sql: Option<String>,
    /// Name of the extraction strategy that matched, if any.
    pub extraction_strategy: Option<&'static str>,
    pub outcome: ValidationOutcome,
}

/// A successful generation: the accepted SQL and the trail that led to it.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub sql: String,
    pub attempts: Vec<GenerationAttempt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Prompting,
    AwaitingCompletion,
    Extracting,
    Validating,
    DryRunning,
    Retrying,
    Done,
    Exhausted,
    Aborted,
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Prompting => "prompting",
            Self::AwaitingCompletion => "awaiting-completion",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::DryRunning => "dry-running",
            Self::Retrying => "retrying",
            Self::Done => "done",
            Self::Exhausted => "exhausted",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

// Tracks and logs the state of a single run.
struct Run {
    id: Uuid,
    state: GenerationState,
}

impl Run {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: GenerationState::Idle,
        }
    }

    fn enter(&mut self, next: GenerationState, attempt: usize) {
        debug!(
            run_id = %self.id,
            attempt,
            from = %self.state,
            to = %next,
            "[generator] state transition"
        );
        self.state = next;
    }
}

/// Turns a question into a validated, read-only SQL statement.
#[derive(Debug)]
pub struct SqlGenerator {
    ai_provider: Box<dyn AiProvider>,
    assembler: PromptAssembler,
    validator: SqlValidator,
    extractor: ExtractionPipeline,
    dry_run: Option<Box<dyn Storage>>,
    max_attempts: usize,
    completion_timeout: Duration,
}

impl SqlGenerator {
    pub fn new(
        ai_provider: Box<dyn AiProvider>,
        assembler: PromptAssembler,
        validator: SqlValidator,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            ai_provider,
            assembler,
            validator,
            extractor: ExtractionPipeline::default(),
            dry_run: None,
            max_attempts: config.max_attempts.max(1),
            completion_timeout: config.completion_timeout(),
        }
    }

    /// Dry-runs every accepted candidate on `storage` before returning it.
    pub fn with_dry_run(mut self, storage: Box<dyn Storage>) -> Self {
        self.dry_run = Some(storage);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn validator(&self) -> &SqlValidator {
        &self.validator
    }

    /// Runs the retry loop until a candidate is accepted, the budget is spent,
    /// the completion service fails, or `cancel` fires.
    ///
    /// Completion-service errors and timeouts end the run immediately; only
    /// extraction and validation failures are retried.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation, GenerationError> {
        let mut run = Run::start();
        let mut attempts: Vec<GenerationAttempt> = Vec::with_capacity(self.max_attempts);
        info!(
            run_id = %run.id,
            max_attempts = self.max_attempts,
            "[generator] received question: {:?}",
            request.question
        );

        loop {
            let index = attempts.len() + 1;
            if cancel.is_cancelled() {
                run.enter(GenerationState::Aborted, index);
                info!(run_id = %run.id, "[generator] cancelled before attempt {index}");
                return Err(GenerationError::Cancelled);
            }

            run.enter(GenerationState::Prompting, index);
            let prompt = self.assembler.request_for(request, &attempts);

            run.enter(GenerationState::AwaitingCompletion, index);
            let completion = match self.complete(&prompt, cancel).await {
                Ok(completion) => completion,
                Err(e) => {
                    run.enter(GenerationState::Aborted, index);
                    warn!(run_id = %run.id, "[generator] attempt {index} aborted: {e}");
                    return Err(e);
                }
            };
            debug!(run_id = %run.id, "<-- Completion: {completion}");

            run.enter(GenerationState::Extracting, index);
            let extracted = self.extractor.extract(&completion);

            run.enter(GenerationState::Validating, index);
            let mut outcome = match &extracted {
                Some(found) => self.validator.validate(&found.sql),
                None => ValidationOutcome::Rejected(Rejection::no_sql_found()),
            };

            let dry_run = match (outcome.sql(), &self.dry_run) {
                (Some(sql), Some(storage)) => Some((sql.to_string(), storage)),
                _ => None,
            };
            if let Some((sql, storage)) = dry_run {
                run.enter(GenerationState::DryRunning, index);
                let checked = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = storage.dry_run(&sql) => Some(result),
                };
                let failure = match checked {
                    None => {
                        run.enter(GenerationState::Aborted, index);
                        info!(run_id = %run.id, "[generator] cancelled during dry run {index}");
                        return Err(GenerationError::Cancelled);
                    }
                    Some(result) => result.err(),
                };
                if let Some(e) = failure {
                    outcome = ValidationOutcome::Rejected(Rejection::new(
                        RejectionKind::DryRunFailed,
                        format!("the warehouse rejected the query: {e}"),
                    ));
                }
            }

            attempts.push(GenerationAttempt {
                index,
                prompt,
                completion,
                extracted_sql: extracted.as_ref().map(|found| found.sql.clone()),
                extraction_strategy: extracted.as_ref().map(|found| found.strategy),
                outcome: outcome.clone(),
            });

            match outcome {
                ValidationOutcome::Accepted(sql) => {
                    run.enter(GenerationState::Done, index);
                    info!(run_id = %run.id, "[generator] accepted on attempt {index}");
                    return Ok(Generation { sql, attempts });
                }
                ValidationOutcome::Rejected(rejection) => {
                    warn!(run_id = %run.id, "[generator] attempt {index} rejected: {rejection}");
                    if attempts.len() >= self.max_attempts {
                        run.enter(GenerationState::Exhausted, index);
                        return Err(GenerationError::RetryBudgetExhausted {
                            last_reason: rejection,
                            attempts,
                        });
                    }
                    run.enter(GenerationState::Retrying, index);
                }
            }
        }
    }

    // One completion call, bounded by the timeout and raced against cancellation.
    // An empty completion counts as text with no SQL in it.
    async fn complete(
        &self,
        prompt: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let call = self
            .ai_provider
            .generate(&prompt.system_prompt, &prompt.user_prompt);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = tokio::time::timeout(self.completion_timeout, call) => match result {
                Err(_) => Err(GenerationError::CompletionTimeout(self.completion_timeout)),
                Ok(Err(PromptError::EmptyCompletion)) => Ok(String::new()),
                Ok(Err(e)) => Err(GenerationError::ServiceUnavailable(e.to_string())),
                Ok(Ok(text)) => Ok(text),
            },
        }
    }
}
