use crate::errors::PromptError;
use crate::schema::{ForeignKey, SchemaDescriptor};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A trait for interacting with a warehouse backend.
///
/// The query pipeline only ever passes SQL that the validator accepted to
/// `execute_sql`. Schema introspection and sampling are read-only by contract.
#[async_trait]
pub trait Storage: Send + Sync + DynClone + Debug {
    /// Returns the name of the storage provider (e.g., "BigQuery").
    fn name(&self) -> &str;

    /// The SQL dialect the provider speaks, used in prompts.
    fn language(&self) -> &str {
        "GoogleSQL"
    }

    /// Describes the given tables, or every table when `tables` is `None`.
    async fn get_schema(&self, tables: Option<&[String]>) -> Result<SchemaDescriptor, PromptError>;

    /// Returns up to `limit` distinct, non-null values of a column, rendered as strings.
    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>, PromptError>;

    /// Foreign keys declared in the catalog for the given tables (or all tables).
    /// Warehouses without constraint metadata declare none.
    async fn foreign_keys(
        &self,
        _tables: Option<&[String]>,
    ) -> Result<Vec<ForeignKey>, PromptError> {
        Ok(Vec::new())
    }

    /// Checks a query against the warehouse without running it, catching unknown
    /// columns or bad joins. Providers without a dry-run facility accept everything.
    async fn dry_run(&self, _sql: &str) -> Result<(), PromptError> {
        Ok(())
    }

    /// Executes a SQL query against the storage provider.
    ///
    /// The result should be a JSON formatted string holding an array of row objects.
    async fn execute_sql(&self, sql: &str) -> Result<String, PromptError>;
}

dyn_clone::clone_trait_object!(Storage);
