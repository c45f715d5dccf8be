//! # Configuration Loading Tests
//!
//! Checks the layering of defaults, YAML files with `${VAR}` placeholders and
//! `ANYQUERY__...` environment overrides.
//!
//! The environment is process-wide, so every test here holds `ENV_LOCK`.

mod common;

use anyhow::Result;
use anyquery::config::{get_config, AppConfig, ConfigError};
use anyquery::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_CONFIDENCE};
use common::setup_tracing;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const YAML: &str = r#"
ai:
  provider: local
  api_url: ${ANYQUERY_TEST_API_URL}
  model: llama3
generation:
  max_attempts: 5
  completion_timeout_ms: 1500
relationships:
  min_confidence: 0.7
  weights:
    name: 0.5
    type: 0.2
    overlap: 0.3
"#;

fn write_config(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

fn path_of(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

/// Keys missing from the file fall back to the built-in defaults.
#[test]
fn test_defaults_fill_missing_keys() -> Result<()> {
    setup_tracing();
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let file = write_config("ai:\n  model: gemini-2.5-pro\n")?;
    let config = get_config(Some(&path_of(&file)))?;
    let defaults = AppConfig::default();

    assert_eq!(config.ai.model, "gemini-2.5-pro");
    assert_eq!(config.ai.provider, "gemini");
    assert_eq!(config.generation.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert!(config.generation.dry_run);
    assert_eq!(config.relationships.min_confidence, DEFAULT_MIN_CONFIDENCE);
    assert_eq!(
        config.validation.blocked_keywords,
        defaults.validation.blocked_keywords
    );
    assert_eq!(config.context.max_chars, defaults.context.max_chars);
    Ok(())
}

/// YAML values are read and `${VAR}` placeholders are substituted.
#[test]
fn test_yaml_with_placeholders() -> Result<()> {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var(
        "ANYQUERY_TEST_API_URL",
        "http://localhost:1234/v1/chat/completions",
    );

    let file = write_config(YAML)?;
    let config = get_config(Some(&path_of(&file)))?;
    std::env::remove_var("ANYQUERY_TEST_API_URL");

    assert_eq!(config.ai.provider, "local");
    assert_eq!(
        config.ai.api_url.as_deref(),
        Some("http://localhost:1234/v1/chat/completions")
    );
    assert_eq!(config.generation.max_attempts, 5);
    assert_eq!(
        config.generation.completion_timeout(),
        std::time::Duration::from_millis(1500)
    );
    assert_eq!(config.relationships.min_confidence, 0.7);
    assert_eq!(config.relationships.weights.name, 0.5);
    assert_eq!(config.relationships.weights.type_compat, 0.2);
    Ok(())
}

/// Environment variables override file values, including list values.
#[test]
fn test_environment_overrides() -> Result<()> {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("ANYQUERY__GENERATION__MAX_ATTEMPTS", "7");
    std::env::set_var("ANYQUERY__VALIDATION__BLOCKED_KEYWORDS", "DROP,DELETE");

    let file = write_config(YAML)?;
    let loaded = get_config(Some(&path_of(&file)));
    std::env::remove_var("ANYQUERY__GENERATION__MAX_ATTEMPTS");
    std::env::remove_var("ANYQUERY__VALIDATION__BLOCKED_KEYWORDS");
    let config = loaded?;

    assert_eq!(config.generation.max_attempts, 7);
    assert_eq!(
        config.validation.blocked_keywords,
        vec!["DROP".to_string(), "DELETE".to_string()]
    );
    assert_eq!(config.ai.model, "llama3");
    Ok(())
}

/// An explicit path that does not exist is an error, not a silent default.
#[test]
fn test_missing_explicit_path() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let result = get_config(Some("/definitely/not/here/anyquery.yml"));
    match result {
        Err(ConfigError::NotFound(message)) => {
            assert!(message.contains("/definitely/not/here/anyquery.yml"))
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}
