//! # anyquery-cli: A CLI for `anyquery`
//!
//! This is the main entry point for the `anyquery` command-line interface.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{AskArgs, RelationshipsArgs, ValidateArgs};
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a YAML config file (defaults to ./anyquery.yml when present)
    #[arg(long, global = true, env = "ANYQUERY_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a SQL statement against the read-only policy
    Validate(ValidateArgs),
    /// Generate a validated query for a question over a schema file
    Ask(AskArgs),
    /// Infer relationships between the tables of a schema file
    Relationships(RelationshipsArgs),
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = anyquery::get_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Validate(args) => commands::handle_validate(args, &config),
        Commands::Ask(args) => commands::handle_ask(args, &config).await,
        Commands::Relationships(args) => commands::handle_relationships(args, &config),
    }
}
