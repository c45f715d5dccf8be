//! # Prompt Assembly
//!
//! Builds the completion request for every generation attempt. The request for
//! attempt `n + 1` depends only on the original `GenerationRequest` and the
//! attempts recorded so far, so the same inputs always produce the same prompt.

use super::core::{
    MAX_EARLIER_REJECTIONS, SQL_RETRY_USER_PROMPT, SQL_SYSTEM_PROMPT, SQL_USER_PROMPT,
};
use super::fill_template;
use crate::constants::DEFAULT_HISTORY_WINDOW;
use crate::generator::{GenerationAttempt, GenerationRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One earlier exchange in the same conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    #[serde(default)]
    pub sql: Option<String>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, sql: Option<String>) -> Self {
        Self {
            question: question.into(),
            sql,
        }
    }
}

/// The pair of prompts sent to the completion service for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    language: String,
    db_name: String,
    history_window: usize,
    today: DateTime<Utc>,
}

impl PromptAssembler {
    pub fn new(language: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            db_name: db_name.into(),
            history_window: DEFAULT_HISTORY_WINDOW,
            today: Utc::now(),
        }
    }

    /// Number of most recent conversation turns to include.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Pins the date reported in the `# TODAY` section.
    pub fn with_today(mut self, today: DateTime<Utc>) -> Self {
        self.today = today;
        self
    }

    /// The request for the next attempt given the attempts made so far.
    pub fn request_for(
        &self,
        request: &GenerationRequest,
        attempts: &[GenerationAttempt],
    ) -> CompletionRequest {
        if attempts.is_empty() {
            self.initial_request(request)
        } else {
            self.retry_request(request, attempts)
        }
    }

    pub fn initial_request(&self, request: &GenerationRequest) -> CompletionRequest {
        let history = self.history_section(request);
        let today = self.today.to_rfc2822();
        let user_prompt = fill_template(
            SQL_USER_PROMPT,
            &[
                ("context", request.schema_context.trim()),
                ("history", history.as_str()),
                ("today", today.as_str()),
                ("language", self.language.as_str()),
                ("prompt", request.question.trim()),
            ],
        );

        CompletionRequest {
            system_prompt: self.system_prompt(),
            user_prompt,
        }
    }

    /// Builds a prompt that carries the last rejected candidate and the reason it
    /// was rejected, plus a short list of earlier rejections.
    ///
    /// Falls back to the initial request when `attempts` is empty.
    pub fn retry_request(
        &self,
        request: &GenerationRequest,
        attempts: &[GenerationAttempt],
    ) -> CompletionRequest {
        let Some((last, earlier)) = attempts.split_last() else {
            return self.initial_request(request);
        };

        let failed_sql = match &last.extracted_sql {
            Some(sql) => format!("```sql\n{sql}\n```"),
            None => "(no SQL statement could be found in the previous answer)".to_string(),
        };
        let reason = last
            .outcome
            .rejection()
            .map(ToString::to_string)
            .unwrap_or_else(|| "the previous answer was not accepted".to_string());

        let today = self.today.to_rfc2822();
        let earlier = earlier_rejections(earlier);
        let user_prompt = fill_template(
            SQL_RETRY_USER_PROMPT,
            &[
                ("context", request.schema_context.trim()),
                ("today", today.as_str()),
                ("failed_sql", failed_sql.as_str()),
                ("reason", reason.as_str()),
                ("earlier", earlier.as_str()),
                ("language", self.language.as_str()),
                ("prompt", request.question.trim()),
            ],
        );

        CompletionRequest {
            system_prompt: self.system_prompt(),
            user_prompt,
        }
    }

    fn system_prompt(&self) -> String {
        fill_template(
            SQL_SYSTEM_PROMPT,
            &[("language", self.language.as_str()), ("db_name", self.db_name.as_str())],
        )
    }

    fn history_section(&self, request: &GenerationRequest) -> String {
        if request.history.is_empty() || self.history_window == 0 {
            return String::new();
        }
        let start = request.history.len().saturating_sub(self.history_window);
        let mut section = String::from("\n# Conversation History\n");
        for turn in &request.history[start..] {
            let _ = writeln!(section, "User: {}", turn.question.trim());
            if let Some(sql) = &turn.sql {
                let _ = writeln!(section, "SQL: {}", sql.trim());
            }
        }
        section
    }
}

fn earlier_rejections(earlier: &[GenerationAttempt]) -> String {
    let reasons: Vec<String> = earlier
        .iter()
        .rev()
        .take(MAX_EARLIER_REJECTIONS)
        .rev()
        .filter_map(|attempt| {
            attempt
                .outcome
                .rejection()
                .map(|r| format!("- attempt {}: {r}", attempt.index))
        })
        .collect();

    if reasons.is_empty() {
        return String::new();
    }
    format!("\n# Earlier Rejections\n{}\n", reasons.join("\n"))
}
