use anyquery::errors::PromptError;
use anyquery::providers::ai::AiProvider;
use anyquery::providers::db::Storage;
use anyquery::relationships::ColumnSamples;
use anyquery::schema::{ForeignKey, SchemaDescriptor};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Mock AI Provider ---

/// A scripted completion service.
///
/// Lookup order for each call: keyed responses (matched as a substring of the
/// system prompt), then the response queue, then the `always` fallback.
#[derive(Clone, Debug, Default)]
pub struct MockAiProvider {
    keyed: Arc<Mutex<HashMap<String, String>>>,
    queue: Arc<Mutex<VecDeque<String>>>,
    fallback: Arc<Mutex<Option<String>>>,
    failure: Arc<Mutex<Option<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that answers with `responses` in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    /// A provider that answers every call with the same text.
    pub fn always(response: impl Into<String>) -> Self {
        let provider = Self::new();
        *provider.fallback.lock().unwrap() = Some(response.into());
        provider
    }

    /// A provider whose every call fails with `PromptError::AiApi`.
    pub fn failing(message: impl Into<String>) -> Self {
        let provider = Self::new();
        *provider.failure.lock().unwrap() = Some(message.into());
        provider
    }

    /// Queues the next response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.queue.lock().unwrap().push_back(response.into());
    }

    /// Pre-programs a response for a specific prompt.
    /// The key should be a unique substring of the system prompt.
    pub fn add_response(&self, key: &str, response: &str) {
        self.keyed
            .lock()
            .unwrap()
            .insert(key.to_string(), response.to_string());
    }

    /// Sleeps this long before answering each call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Retrieves the recorded `(system, user)` prompt pairs for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PromptError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(PromptError::AiApi(message));
        }

        let keyed = self
            .keyed
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| system_prompt.contains(key.as_str()))
            .map(|(_, response)| response.clone());
        if let Some(response) = keyed {
            return Ok(response);
        }

        if let Some(response) = self.queue.lock().unwrap().pop_front() {
            return Ok(response);
        }

        self.fallback.lock().unwrap().clone().ok_or_else(|| {
            PromptError::AiApi(format!(
                "MockAiProvider: No response programmed for system prompt. Got: '{system_prompt}'"
            ))
        })
    }
}

// --- Mock Storage ---

/// An in-memory warehouse: a fixed schema, fixed column samples and canned rows.
#[derive(Clone, Debug, Default)]
pub struct MockStorage {
    schema: SchemaDescriptor,
    foreign_keys: Vec<ForeignKey>,
    samples: ColumnSamples,
    rows: Value,
    sample_delays: HashMap<(String, String), Duration>,
    failing_samples: HashSet<(String, String)>,
    dry_run_failures: Arc<Mutex<VecDeque<String>>>,
    dry_runs: Arc<Mutex<Vec<String>>>,
    executed: Arc<Mutex<Vec<String>>>,
    sampled: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockStorage {
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self {
            schema,
            rows: Value::Array(Vec::new()),
            ..Default::default()
        }
    }

    pub fn with_samples(mut self, samples: ColumnSamples) -> Self {
        self.samples = samples;
        self
    }

    /// Foreign keys reported by the catalog.
    pub fn with_foreign_keys(mut self, foreign_keys: Vec<ForeignKey>) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    /// The next dry runs fail with these messages, in order; later ones pass.
    pub fn with_dry_run_failures<I, S>(self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dry_run_failures
            .lock()
            .unwrap()
            .extend(messages.into_iter().map(Into::into));
        self
    }

    /// Rows returned by every `execute_sql` call.
    pub fn with_rows(mut self, rows: Value) -> Self {
        self.rows = rows;
        self
    }

    /// Delays sampling of one column.
    pub fn with_sample_delay(mut self, table: &str, column: &str, delay: Duration) -> Self {
        self.sample_delays
            .insert((table.to_string(), column.to_string()), delay);
        self
    }

    /// Makes sampling of one column fail.
    pub fn with_failing_sample(mut self, table: &str, column: &str) -> Self {
        self.failing_samples
            .insert((table.to_string(), column.to_string()));
        self
    }

    /// Every SQL statement passed to `dry_run`, in order.
    pub fn dry_runs(&self) -> Vec<String> {
        self.dry_runs.lock().unwrap().clone()
    }

    /// Every SQL statement passed to `execute_sql`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Every `(table, column)` sampled, in call order.
    pub fn sampled(&self) -> Vec<(String, String)> {
        self.sampled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    fn name(&self) -> &str {
        "MockStorage"
    }

    async fn get_schema(
        &self,
        tables: Option<&[String]>,
    ) -> Result<SchemaDescriptor, PromptError> {
        Ok(match tables {
            Some(names) => self.schema.subset(names),
            None => self.schema.clone(),
        })
    }

    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>, PromptError> {
        let key = (table.to_string(), column.to_string());
        self.sampled.lock().unwrap().push(key.clone());

        if let Some(delay) = self.sample_delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_samples.contains(&key) {
            return Err(PromptError::StorageQueryFailed(format!(
                "sampling {table}.{column} failed"
            )));
        }

        Ok(self
            .samples
            .get(table, column)
            .map(|values| values.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn foreign_keys(
        &self,
        tables: Option<&[String]>,
    ) -> Result<Vec<ForeignKey>, PromptError> {
        let wanted = |name: &str| {
            tables.map_or(true, |names| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
        };
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| wanted(&fk.source_table) && wanted(&fk.target_table))
            .cloned()
            .collect())
    }

    async fn dry_run(&self, sql: &str) -> Result<(), PromptError> {
        self.dry_runs.lock().unwrap().push(sql.to_string());
        match self.dry_run_failures.lock().unwrap().pop_front() {
            Some(message) => Err(PromptError::StorageQueryFailed(message)),
            None => Ok(()),
        }
    }

    async fn execute_sql(&self, sql: &str) -> Result<String, PromptError> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(serde_json::to_string(&self.rows)?)
    }
}
