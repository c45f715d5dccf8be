//! # Schema Context
//!
//! Renders a `SchemaDescriptor` as the grounding text placed in front of the model.
//! The output is bounded: whole table blocks are emitted until the next one would
//! overflow `max_chars`, then a single note lists how many tables were left out.

use crate::config::ContextConfig;
use crate::schema::{SchemaDescriptor, TableDescriptor};
use std::fmt::Write;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SchemaContextBuilder {
    max_chars: usize,
    include_row_counts: bool,
    include_descriptions: bool,
}

impl Default for SchemaContextBuilder {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

impl SchemaContextBuilder {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            include_row_counts: config.include_row_counts,
            include_descriptions: config.include_descriptions,
        }
    }

    /// Full rendering: one block per table with typed columns.
    pub fn build(&self, schema: &SchemaDescriptor) -> String {
        let mut out = String::new();
        if let Some(dataset) = &schema.dataset {
            let _ = writeln!(out, "Dataset: {dataset}\n");
        }

        let mut omitted = 0;
        for table in &schema.tables {
            let block = self.table_block(table);
            if omitted > 0 || out.len() + block.len() > self.max_chars {
                omitted += 1;
                continue;
            }
            out.push_str(&block);
        }

        if omitted > 0 {
            debug!(omitted, "[schema_context] context truncated");
            let _ = writeln!(out, "-- {omitted} more table(s) omitted for length");
        }
        out.trim_end().to_string()
    }

    /// Names-only rendering: `orders: `id`, `customer_id``.
    pub fn build_minimal(&self, schema: &SchemaDescriptor) -> String {
        schema
            .tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| format!("`{}`", c.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {columns}", table.name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn table_block(&self, table: &TableDescriptor) -> String {
        let mut block = format!("### Table: {}\n", table.name);
        if self.include_descriptions {
            if let Some(description) = &table.description {
                let _ = writeln!(block, "Description: {description}");
            }
        }
        if self.include_row_counts {
            if let Some(rows) = table.row_count {
                let _ = writeln!(block, "Row count: {}", group_thousands(rows));
            }
        }
        block.push_str("Columns:\n");
        for column in &table.columns {
            let _ = write!(block, "  - `{}` ({}", column.name, column.data_type);
            if !column.nullable {
                block.push_str(", NOT NULL");
            }
            block.push(')');
            if self.include_descriptions {
                if let Some(description) = &column.description {
                    let _ = write!(block, " - {description}");
                }
            }
            block.push('\n');
        }
        block.push('\n');
        block
    }
}

/// Picks the tables a question mentions by name (singular or plural).
/// Falls back to every table when none is mentioned.
pub fn relevant_tables(question: &str, schema: &SchemaDescriptor) -> Vec<String> {
    let question = question.to_lowercase();
    let relevant: Vec<String> = schema
        .tables
        .iter()
        .filter(|table| {
            let name = table.short_name().to_lowercase();
            question.contains(&name)
                || name
                    .strip_suffix('s')
                    .is_some_and(|singular| !singular.is_empty() && question.contains(singular))
                || question.contains(&format!("{name}s"))
        })
        .map(|table| table.name.clone())
        .collect();

    if relevant.is_empty() {
        schema.table_names()
    } else {
        relevant
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
