use anyhow::{bail, Context, Result};
use anyquery::providers::factory::create_provider;
use anyquery::relationships::ColumnSamples;
use anyquery::{
    AppConfig, CancellationToken, ConversationTurn, ForeignKey, GenerationError, GenerationRequest,
    PromptAssembler, RelationshipDetector, SchemaContextBuilder, SchemaDescriptor, SqlGenerator,
    SqlValidator, ValidationOutcome,
};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fs;
use tracing::info;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// The SQL statement to check
    #[arg(required_unless_present = "file")]
    sql: Option<String>,
    /// Read the statement from a file instead
    #[arg(long, conflicts_with = "sql")]
    file: Option<String>,
}

#[derive(Parser, Debug)]
pub struct AskArgs {
    /// The question to answer
    #[arg(required = true)]
    question: String,
    /// JSON file describing the schema (tables, columns, types)
    #[arg(long)]
    schema: String,
    /// JSON file with earlier turns: [{"question": ..., "sql": ...}]
    #[arg(long)]
    history: Option<String>,
    /// SQL dialect named in the prompt
    #[arg(long, default_value = "GoogleSQL")]
    language: String,
    /// Warehouse named in the prompt
    #[arg(long, default_value = "BigQuery")]
    db_name: String,
    /// Print the whole attempt trail as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
pub struct RelationshipsArgs {
    /// JSON file describing the schema (tables, columns, types)
    #[arg(long)]
    schema: String,
    /// JSON file with sampled values: {"table": {"column": ["v1", "v2"]}}
    #[arg(long)]
    samples: Option<String>,
    /// JSON file with declared foreign keys:
    /// [{"source_table", "source_column", "target_table", "target_column"}]
    #[arg(long)]
    foreign_keys: Option<String>,
    /// Override the minimum edge confidence
    #[arg(long)]
    min_confidence: Option<f64>,
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse '{path}'"))
}

pub fn handle_validate(args: &ValidateArgs, config: &AppConfig) -> Result<()> {
    let sql = match (&args.sql, &args.file) {
        (Some(sql), _) => sql.clone(),
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))?
        }
        (None, None) => bail!("either a SQL statement or --file is required"),
    };

    let validator = SqlValidator::new(&config.validation);
    match validator.validate(&sql) {
        ValidationOutcome::Accepted(sql) => {
            let tables = validator.referenced_tables(&sql).unwrap_or_default();
            println!("✅ Accepted");
            println!("{sql}");
            if !tables.is_empty() {
                println!("-- tables: {}", tables.join(", "));
            }
            Ok(())
        }
        ValidationOutcome::Rejected(rejection) => bail!("❌ Rejected: {rejection}"),
    }
}

pub async fn handle_ask(args: &AskArgs, config: &AppConfig) -> Result<()> {
    let schema: SchemaDescriptor = read_json(&args.schema)?;
    let history: Vec<ConversationTurn> = match &args.history {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    info!("Asking over {} table(s): {:?}", schema.tables.len(), args.question);

    let context = SchemaContextBuilder::new(&config.context).build(&schema);
    let request = GenerationRequest::new(args.question.clone(), context).with_history(history);
    let generator = SqlGenerator::new(
        create_provider(&config.ai)?,
        PromptAssembler::new(&args.language, &args.db_name)
            .with_history_window(config.generation.history_window),
        SqlValidator::new(&config.validation),
        &config.generation,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match generator.generate(&request, &cancel).await {
        Ok(generation) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&generation)?);
            } else {
                println!("{}", generation.sql);
                eprintln!("-- accepted after {} attempt(s)", generation.attempts.len());
            }
            Ok(())
        }
        Err(GenerationError::RetryBudgetExhausted {
            last_reason,
            attempts,
        }) => {
            for attempt in &attempts {
                let reason = attempt
                    .outcome
                    .rejection()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                eprintln!("-- attempt {}: {reason}", attempt.index);
            }
            bail!(
                "no valid query after {} attempt(s): {last_reason}",
                attempts.len()
            )
        }
        Err(e) => Err(e.into()),
    }
}

pub fn handle_relationships(args: &RelationshipsArgs, config: &AppConfig) -> Result<()> {
    let schema: SchemaDescriptor = read_json(&args.schema)?;
    let samples: ColumnSamples = match &args.samples {
        Some(path) => read_json(path)?,
        None => ColumnSamples::new(),
    };
    let declared: Vec<ForeignKey> = match &args.foreign_keys {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let mut relationship_config = config.relationships.clone();
    if let Some(min_confidence) = args.min_confidence {
        relationship_config.min_confidence = min_confidence;
    }

    let graph = RelationshipDetector::new(&relationship_config)
        .detect_with_foreign_keys(&schema, &declared, &samples);
    let output = json!({
        "summary": graph.summary(),
        "nodes": graph.nodes_info(),
        "edges": graph.edges(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
