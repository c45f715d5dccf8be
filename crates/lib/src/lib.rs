//! # Natural Language to Query
//!
//! This crate turns natural-language questions into validated, read-only SQL and
//! infers relationships between warehouse tables.
//!
//! - [`generator`] runs the bounded, informed retry loop around a completion service.
//! - [`sql`] extracts candidate SQL from free-form text and validates it.
//! - [`relationships`] scores column pairs and builds a relationship graph.
//! - [`client`] wires providers and configuration into a single entry point.

pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod generator;
pub mod prompts;
pub mod providers;
pub mod relationships;
pub mod schema;
pub mod sql;

pub use client::{AskOptions, QueryClient, QueryClientBuilder, QueryResult};
pub use config::{get_config, AppConfig};
pub use context::SchemaContextBuilder;
pub use errors::{GenerationError, PromptError, SignalUnavailable};
pub use generator::{Generation, GenerationAttempt, GenerationRequest, SqlGenerator};
pub use prompts::{CompletionRequest, ConversationTurn, PromptAssembler};
pub use relationships::{RelationshipCandidate, RelationshipDetector, RelationshipGraph};
pub use schema::{ColumnDescriptor, ForeignKey, SchemaDescriptor, TableDescriptor};
pub use sql::{Rejection, RejectionKind, SqlValidator, ValidationOutcome};
pub use tokio_util::sync::CancellationToken;
