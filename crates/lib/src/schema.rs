//! # Schema Metadata
//!
//! Plain snapshots of warehouse metadata. A `SchemaDescriptor` is built once per
//! request (or taken from a cache the caller owns) and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// An ordered set of table descriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// An optional dataset or database label shown in the prompt context.
    #[serde(default)]
    pub dataset: Option<String>,
    pub tables: Vec<TableDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(alias = "type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// A foreign key constraint declared in the warehouse catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

impl ForeignKey {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        }
    }
}

fn default_nullable() -> bool {
    true
}

impl SchemaDescriptor {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self {
            dataset: None,
            tables,
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Looks a table up by name, ignoring case.
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Returns a copy restricted to the named tables, keeping the original order.
    pub fn subset(&self, names: &[String]) -> Self {
        Self {
            dataset: self.dataset.clone(),
            tables: self
                .tables
                .iter()
                .filter(|t| names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            description: None,
            row_count: None,
            columns,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The last dotted segment of the table name (`project.dataset.orders` -> `orders`).
    pub fn short_name(&self) -> &str {
        short_table_name(&self.name)
    }
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            description: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

pub fn short_table_name(name: &str) -> &str {
    name.trim_matches('`')
        .rsplit('.')
        .next()
        .unwrap_or(name)
}

/// Comparability classes for declared column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    Integer,
    Decimal,
    String,
    Boolean,
    Temporal,
    Bytes,
    Other,
}

impl TypeClass {
    /// Classifies a declared type such as `INT64`, `VARCHAR(255)` or `NUMERIC(10, 2)`.
    pub fn of(declared: &str) -> Self {
        let base = base_type(declared);
        match base.as_str() {
            "INT" | "INT2" | "INT4" | "INT8" | "INT16" | "INT32" | "INT64" | "INTEGER"
            | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" | "SERIAL" | "BIGSERIAL" => {
                Self::Integer
            }
            "NUMERIC" | "BIGNUMERIC" | "DECIMAL" | "BIGDECIMAL" | "FLOAT" | "FLOAT32"
            | "FLOAT64" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" => Self::Decimal,
            "STRING" | "VARCHAR" | "CHAR" | "TEXT" | "NVARCHAR" | "NCHAR" | "CHARACTER"
            | "CHARACTER VARYING" | "UUID" => Self::String,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "DATE" | "DATETIME" | "TIMESTAMP" | "TIMESTAMPTZ" | "TIME" => Self::Temporal,
            "BYTES" | "BLOB" | "BINARY" | "VARBINARY" | "BYTEA" => Self::Bytes,
            _ => Self::Other,
        }
    }

    /// Integers and decimals share the numeric comparability class.
    /// `Other` never matches by class; callers compare declared types for it.
    pub fn comparable_with(self, other: Self) -> bool {
        match (self, other) {
            (Self::Other, _) | (_, Self::Other) => false,
            (Self::Integer | Self::Decimal, Self::Integer | Self::Decimal) => true,
            (a, b) => a == b,
        }
    }
}

/// Upper-cased declared type with any `(...)` or `<...>` parameters removed.
pub fn base_type(declared: &str) -> String {
    let end = declared
        .find(['(', '<'])
        .unwrap_or(declared.len());
    declared[..end]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameterised_types_are_classified() {
        assert_eq!(TypeClass::of("VARCHAR(255)"), TypeClass::String);
        assert_eq!(TypeClass::of("numeric(10, 2)"), TypeClass::Decimal);
        assert_eq!(TypeClass::of("ARRAY<INT64>"), TypeClass::Other);
        assert_eq!(TypeClass::of("double precision"), TypeClass::Decimal);
    }

    #[test]
    fn numeric_types_share_a_class() {
        assert!(TypeClass::Integer.comparable_with(TypeClass::Decimal));
        assert!(TypeClass::Temporal.comparable_with(TypeClass::Temporal));
        assert!(!TypeClass::String.comparable_with(TypeClass::Integer));
        assert!(!TypeClass::Other.comparable_with(TypeClass::Other));
    }

    #[test]
    fn short_name_strips_qualifiers() {
        assert_eq!(short_table_name("`proj.ds.orders`"), "orders");
        assert_eq!(short_table_name("orders"), "orders");
    }
}
