//! # Application Configuration
//!
//! Every tunable the core consumes lives in `AppConfig`. Values are layered:
//! programmatic defaults, then an optional YAML file (with `${VAR}` substitution),
//! then `ANYQUERY__SECTION__KEY` environment variables.

use crate::constants::*;
use crate::relationships::scoring::SignalWeights;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").expect("valid placeholder regex"));

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(#[from] config::ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// The root configuration structure, mapping directly to `anyquery.yml`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
    pub relationships: RelationshipConfig,
    pub context: ContextConfig,
}

/// Which completion service to talk to.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AiConfig {
    /// The type of provider ("gemini" or "local").
    pub provider: String,
    /// Derived from `model` for Gemini when unset.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_url: None,
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_attempts: usize,
    pub completion_timeout_ms: u64,
    pub history_window: usize,
    /// Dry-run accepted candidates on the warehouse before returning them.
    pub dry_run: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            completion_timeout_ms: DEFAULT_COMPLETION_TIMEOUT_MS,
            history_window: DEFAULT_HISTORY_WINDOW,
            dry_run: true,
        }
    }
}

impl GenerationConfig {
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_sql_bytes: usize,
    pub blocked_keywords: Vec<String>,
    pub blocked_namespaces: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_sql_bytes: DEFAULT_MAX_SQL_BYTES,
            blocked_keywords: DEFAULT_BLOCKED_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            blocked_namespaces: DEFAULT_BLOCKED_NAMESPACES
                .iter()
                .map(|n| n.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelationshipConfig {
    pub min_confidence: f64,
    pub candidate_floor: f64,
    pub weights: SignalWeights,
    pub sample_size: usize,
    pub sample_timeout_ms: u64,
    pub sample_concurrency: usize,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            candidate_floor: DEFAULT_CANDIDATE_FLOOR,
            weights: SignalWeights::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            sample_timeout_ms: DEFAULT_SAMPLE_TIMEOUT_MS,
            sample_concurrency: DEFAULT_SAMPLE_CONCURRENCY,
        }
    }
}

impl RelationshipConfig {
    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    pub max_chars: usize,
    pub include_row_counts: bool,
    pub include_descriptions: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
            include_row_counts: true,
            include_descriptions: true,
        }
    }
}

// Reads a file and substitutes `${VAR}` placeholders from the environment.
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    let expanded = ENV_PLACEHOLDER.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.into_owned()))
}

/// Loads the configuration from a YAML file and environment variables.
///
/// - With `config_path_override`, that file must exist.
/// - Without it, `anyquery.yml` in the working directory is used when present.
/// - Nested keys are overridden by `ANYQUERY__...` variables
///   (e.g. `ANYQUERY__GENERATION__MAX_ATTEMPTS=5`).
/// - `AI_API_KEY` fills `ai.api_key` when nothing else set it.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let mut builder = ConfigBuilder::builder();

    match config_path_override {
        Some(path) => {
            let content = read_and_substitute(path)?.ok_or_else(|| {
                ConfigError::NotFound(format!("Config file not found at '{path}'."))
            })?;
            info!("Loading configuration from '{path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None => {
            if let Some(content) = read_and_substitute(DEFAULT_CONFIG_FILE)? {
                info!("Loading configuration from '{DEFAULT_CONFIG_FILE}'.");
                builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
            }
        }
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("ANYQUERY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("validation.blocked_keywords")
                .with_list_parse_key("validation.blocked_namespaces"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    if config.ai.api_key.is_none() {
        if let Ok(key) = env::var("AI_API_KEY") {
            if !key.is_empty() {
                config.ai.api_key = Some(key);
            }
        }
    }

    Ok(config)
}
