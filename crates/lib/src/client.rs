//! # Query Client
//!
//! Wires a completion provider, a storage provider and the configuration into
//! the full question-to-rows pipeline, plus the smaller helper tasks.

use crate::config::AppConfig;
use crate::context::{relevant_tables, SchemaContextBuilder};
use crate::errors::PromptError;
use crate::generator::{Generation, GenerationAttempt, GenerationRequest, SqlGenerator};
use crate::prompts::tasks::{
    EXPLAIN_SQL_SYSTEM_PROMPT, EXPLAIN_SQL_USER_PROMPT, SUGGEST_QUESTIONS_SYSTEM_PROMPT,
    SUGGEST_QUESTIONS_USER_PROMPT,
};
use crate::prompts::{fill_template, ConversationTurn, PromptAssembler};
use crate::providers::ai::AiProvider;
use crate::providers::db::Storage;
use crate::relationships::{RelationshipDetector, RelationshipGraph};
use crate::sql::{SqlValidator, ValidationOutcome};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+?)\s*$").expect("valid numbered-line regex"));

/// Options for a single question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AskOptions {
    pub question: String,
    /// Restrict the schema context to these tables.
    pub tables: Option<Vec<String>>,
    pub history: Vec<ConversationTurn>,
    /// Narrow the context to tables the question mentions by name.
    pub focus_relevant_tables: bool,
}

impl AskOptions {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }
}

/// Rows returned for an accepted query, with the trail that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub sql: String,
    pub rows: Value,
    pub row_count: usize,
    pub attempts: Vec<GenerationAttempt>,
}

/// A client that turns questions into validated SQL and runs it.
pub struct QueryClient {
    pub(crate) ai_provider: Box<dyn AiProvider>,
    pub(crate) storage_provider: Box<dyn Storage>,
    pub(crate) config: AppConfig,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("storage_provider", &self.storage_provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A builder for creating `QueryClient` instances.
#[derive(Default)]
pub struct QueryClientBuilder {
    ai_provider: Option<Box<dyn AiProvider>>,
    storage_provider: Option<Box<dyn Storage>>,
    config: AppConfig,
}

impl QueryClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ai_provider(mut self, ai_provider: Box<dyn AiProvider>) -> Self {
        self.ai_provider = Some(ai_provider);
        self
    }

    pub fn storage_provider(mut self, storage_provider: Box<dyn Storage>) -> Self {
        self.storage_provider = Some(storage_provider);
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails when either provider is missing.
    pub fn build(self) -> Result<QueryClient, PromptError> {
        let ai_provider = self.ai_provider.ok_or_else(|| {
            PromptError::MissingAiProvider("no AI provider was given to the builder".to_string())
        })?;
        let storage_provider = self
            .storage_provider
            .ok_or(PromptError::MissingStorageProvider)?;
        Ok(QueryClient {
            ai_provider,
            storage_provider,
            config: self.config,
        })
    }
}

impl QueryClient {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The validator every generated or hand-written query goes through.
    pub fn validator(&self) -> SqlValidator {
        SqlValidator::new(&self.config.validation)
    }

    pub fn validate(&self, sql: &str) -> ValidationOutcome {
        self.validator().validate(sql)
    }

    fn generator(&self) -> SqlGenerator {
        let assembler = PromptAssembler::new(
            self.storage_provider.language(),
            self.storage_provider.name(),
        )
        .with_history_window(self.config.generation.history_window);
        let generator = SqlGenerator::new(
            dyn_clone::clone_box(&*self.ai_provider),
            assembler,
            self.validator(),
            &self.config.generation,
        );
        if self.config.generation.dry_run {
            generator.with_dry_run(dyn_clone::clone_box(&*self.storage_provider))
        } else {
            generator
        }
    }

    /// Renders the schema context for a question.
    pub async fn schema_context(&self, options: &AskOptions) -> Result<String, PromptError> {
        let mut schema = self
            .storage_provider
            .get_schema(options.tables.as_deref())
            .await?;
        if options.focus_relevant_tables {
            let relevant = relevant_tables(&options.question, &schema);
            schema = schema.subset(&relevant);
        }
        Ok(SchemaContextBuilder::new(&self.config.context).build(&schema))
    }

    /// Generates an accepted query without executing it.
    pub async fn generate_sql(
        &self,
        options: &AskOptions,
        cancel: &CancellationToken,
    ) -> Result<Generation, PromptError> {
        info!("[generate_sql] received question: {:?}", options.question);
        let context = self.schema_context(options).await?;
        let request = GenerationRequest::new(options.question.clone(), context)
            .with_history(options.history.clone());
        Ok(self.generator().generate(&request, cancel).await?)
    }

    /// Generates a query, executes it and returns the rows.
    ///
    /// Only SQL the validator accepted ever reaches the storage provider.
    pub async fn ask(
        &self,
        options: &AskOptions,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, PromptError> {
        let Generation { sql, attempts } = self.generate_sql(options, cancel).await?;

        let raw = self.storage_provider.execute_sql(&sql).await;
        if let Err(e) = &raw {
            error!("[ask] Query execution error: {e:?}");
        }
        let rows: Value = serde_json::from_str(&raw?)?;
        let row_count = match &rows {
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        };
        info!(row_count, attempts = attempts.len(), "[ask] query executed");

        Ok(QueryResult {
            sql,
            rows,
            row_count,
            attempts,
        })
    }

    /// Explains a query in plain language.
    pub async fn explain_sql(&self, question: &str, sql: &str) -> Result<String, PromptError> {
        let user_prompt =
            fill_template(EXPLAIN_SQL_USER_PROMPT, &[("prompt", question), ("sql", sql)]);
        debug!(user_prompt = %user_prompt, "--> Sending explanation prompt to AI Provider");
        self.ai_provider
            .generate(EXPLAIN_SQL_SYSTEM_PROMPT, &user_prompt)
            .await
    }

    /// Asks the model for up to `count` questions worth asking of the schema.
    pub async fn suggest_questions(&self, count: usize) -> Result<Vec<String>, PromptError> {
        let schema = self.storage_provider.get_schema(None).await?;
        let context = SchemaContextBuilder::new(&self.config.context).build(&schema);
        let count_text = count.to_string();
        let user_prompt = fill_template(
            SUGGEST_QUESTIONS_USER_PROMPT,
            &[("context", context.as_str()), ("count", count_text.as_str())],
        );

        let response = self
            .ai_provider
            .generate(SUGGEST_QUESTIONS_SYSTEM_PROMPT, &user_prompt)
            .await?;
        Ok(parse_numbered_list(&response, count))
    }

    /// Detects relationships between the given tables (or all tables), sampling
    /// column values from the storage provider.
    pub async fn detect_relationships(
        &self,
        tables: Option<&[String]>,
    ) -> Result<RelationshipGraph, PromptError> {
        let schema = self.storage_provider.get_schema(tables).await?;
        let detector = RelationshipDetector::new(&self.config.relationships);
        Ok(detector
            .detect_with_samples(&schema, self.storage_provider.as_ref())
            .await)
    }
}

/// Items of a numbered list (`1. ...` or `1) ...`), at most `limit` of them.
pub fn parse_numbered_list(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .filter_map(|line| NUMBERED_LINE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .take(limit)
        .collect()
}
