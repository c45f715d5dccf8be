//! # Query Client Tests
//!
//! The full question-to-rows pipeline against a scripted completion service and
//! an in-memory warehouse, plus the helper tasks built on the same providers.

mod common;

use anyhow::Result;
use anyquery::client::parse_numbered_list;
use anyquery::config::{AppConfig, GenerationConfig};
use anyquery::prompts::tasks::{EXPLAIN_SQL_SYSTEM_PROMPT, SUGGEST_QUESTIONS_SYSTEM_PROMPT};
use anyquery::{
    AskOptions, CancellationToken, GenerationError, PromptError, QueryClientBuilder,
};
use anyquery_test_utils::{MockAiProvider, MockStorage};
use common::{schema_with_isolated_table, setup_tracing, TOTAL_PER_CUSTOMER_COMPLETION};
use serde_json::json;

fn storage() -> MockStorage {
    MockStorage::new(schema_with_isolated_table()).with_rows(json!([
        {"name": "Ada", "total": 120.5},
        {"name": "Grace", "total": 80.0}
    ]))
}

/// An accepted query is executed and its rows returned.
#[tokio::test]
async fn test_ask_executes_accepted_sql() -> Result<()> {
    // --- Arrange ---
    setup_tracing();
    let ai = MockAiProvider::with_responses([
        "```sql\nDROP TABLE orders\n```",
        TOTAL_PER_CUSTOMER_COMPLETION,
    ]);
    let storage = storage();
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(ai.clone()))
        .storage_provider(Box::new(storage.clone()))
        .build()?;

    // --- Act ---
    let result = client
        .ask(
            &AskOptions::new("show total orders per customer last month"),
            &CancellationToken::new(),
        )
        .await?;

    // --- Assert ---
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0]["name"], "Ada");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(storage.executed(), vec![result.sql.clone()]);
    assert!(!storage.executed()[0].contains("DROP"));

    let (system_prompt, user_prompt) = &ai.get_calls()[0];
    assert!(system_prompt.contains("GoogleSQL expert for MockStorage"));
    assert!(user_prompt.contains("### Table: audit_log"));
    Ok(())
}

/// The client dry-runs accepted candidates on its storage provider unless the
/// configuration turns that off.
#[tokio::test]
async fn test_ask_dry_runs_before_executing() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::with_responses([
        "```sql\nSELECT totl FROM orders\n```",
        TOTAL_PER_CUSTOMER_COMPLETION,
    ]);
    let storage = storage().with_dry_run_failures(["Unrecognized name: totl"]);
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(ai.clone()))
        .storage_provider(Box::new(storage.clone()))
        .build()?;

    let result = client
        .ask(&AskOptions::new("total per customer"), &CancellationToken::new())
        .await?;
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(storage.dry_runs().len(), 2);
    assert_eq!(storage.executed(), vec![result.sql.clone()]);

    let unchecked = crate::storage().with_dry_run_failures(["never consulted"]);
    let config = AppConfig {
        generation: GenerationConfig {
            dry_run: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(MockAiProvider::always(TOTAL_PER_CUSTOMER_COMPLETION)))
        .storage_provider(Box::new(unchecked.clone()))
        .config(config)
        .build()?;
    let result = client
        .ask(&AskOptions::new("total per customer"), &CancellationToken::new())
        .await?;
    assert_eq!(result.attempts.len(), 1);
    assert!(unchecked.dry_runs().is_empty());
    Ok(())
}

/// When every attempt is rejected nothing is executed.
#[tokio::test]
async fn test_exhausted_question_executes_nothing() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::always("```sql\nDELETE FROM orders\n```");
    let storage = storage();
    let config = AppConfig {
        generation: GenerationConfig {
            max_attempts: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(ai.clone()))
        .storage_provider(Box::new(storage.clone()))
        .config(config)
        .build()?;

    let error = client
        .ask(&AskOptions::new("remove old orders"), &CancellationToken::new())
        .await
        .unwrap_err();

    match error {
        PromptError::Generation(GenerationError::RetryBudgetExhausted { attempts, .. }) => {
            assert_eq!(attempts.len(), 2)
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert!(storage.executed().is_empty());
    assert_eq!(ai.call_count(), 2);
    Ok(())
}

/// Table restriction and relevance focus narrow the schema context.
#[tokio::test]
async fn test_schema_context_narrowing() -> Result<()> {
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(MockAiProvider::new()))
        .storage_provider(Box::new(storage()))
        .build()?;

    let restricted = AskOptions {
        tables: Some(vec!["customers".to_string()]),
        ..AskOptions::new("list customers")
    };
    let context = client.schema_context(&restricted).await?;
    assert!(context.contains("### Table: customers"));
    assert!(!context.contains("### Table: orders"));

    let focused = AskOptions {
        focus_relevant_tables: true,
        ..AskOptions::new("how many orders were placed?")
    };
    let context = client.schema_context(&focused).await?;
    assert!(context.contains("### Table: orders"));
    assert!(!context.contains("### Table: audit_log"));
    Ok(())
}

/// Hand-written SQL goes through the same validator.
#[tokio::test]
async fn test_validate() -> Result<()> {
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(MockAiProvider::new()))
        .storage_provider(Box::new(storage()))
        .build()?;
    assert!(client.validate("SELECT id FROM customers").is_accepted());
    assert!(!client.validate("DROP TABLE customers").is_accepted());
    Ok(())
}

/// The explanation and suggestion tasks use their own prompts.
#[tokio::test]
async fn test_explain_and_suggest() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.add_response(
        EXPLAIN_SQL_SYSTEM_PROMPT,
        "It adds up order amounts for each customer.",
    );
    ai.add_response(
        SUGGEST_QUESTIONS_SYSTEM_PROMPT,
        "Here are some ideas:\n1. Who are the top customers?\n2) How many orders per day?\n3. What is the average order amount?",
    );
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(ai.clone()))
        .storage_provider(Box::new(storage()))
        .build()?;

    let explanation = client
        .explain_sql("total per customer", "SELECT 1")
        .await?;
    assert_eq!(explanation, "It adds up order amounts for each customer.");
    assert!(ai.get_calls()[0].1.contains("```sql\nSELECT 1\n```"));

    let questions = client.suggest_questions(2).await?;
    assert_eq!(
        questions,
        vec![
            "Who are the top customers?".to_string(),
            "How many orders per day?".to_string()
        ]
    );
    assert!(ai.get_calls()[1].1.contains("suggest 2 interesting questions"));
    Ok(())
}

/// Relationship detection runs over the storage provider's schema.
#[tokio::test]
async fn test_detect_relationships() -> Result<()> {
    let client = QueryClientBuilder::new()
        .ai_provider(Box::new(MockAiProvider::new()))
        .storage_provider(Box::new(storage()))
        .build()?;

    let graph = client.detect_relationships(None).await?;
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.summary().isolated_tables, vec!["audit_log".to_string()]);

    let only_orders = vec!["orders".to_string()];
    let graph = client.detect_relationships(Some(&only_orders)).await?;
    assert!(graph.edges().is_empty());
    assert_eq!(graph.nodes(), &["orders".to_string()]);
    Ok(())
}

/// The builder refuses to build without both providers.
#[test]
fn test_builder_requires_providers() {
    let missing_ai = QueryClientBuilder::new()
        .storage_provider(Box::new(storage()))
        .build();
    assert!(matches!(missing_ai, Err(PromptError::MissingAiProvider(_))));

    let missing_storage = QueryClientBuilder::new()
        .ai_provider(Box::new(MockAiProvider::new()))
        .build();
    assert!(matches!(
        missing_storage,
        Err(PromptError::MissingStorageProvider)
    ));
}

/// Numbered list parsing accepts both `1.` and `1)` and ignores other lines.
#[test]
fn test_parse_numbered_list() {
    let text = "Intro\n1. First\n  2) Second  \nnot a number\n3. Third";
    assert_eq!(parse_numbered_list(text, 10), vec!["First", "Second", "Third"]);
    assert_eq!(parse_numbered_list(text, 1), vec!["First"]);
    assert!(parse_numbered_list("", 3).is_empty());
}
