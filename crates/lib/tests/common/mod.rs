#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the integration tests: tracing, a fixed clock and the
//! small warehouse schemas most tests run against.

use anyquery::schema::{ColumnDescriptor, SchemaDescriptor, TableDescriptor};
use chrono::{DateTime, TimeZone, Utc};
use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fixed "today" so prompts are reproducible.
pub fn fixed_today() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0)
        .single()
        .expect("valid fixed date")
}

/// `orders(customer_id, order_date, amount)` and `customers(id, name)`.
pub fn orders_customers_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(vec![
        TableDescriptor::new(
            "orders",
            vec![
                ColumnDescriptor::new("customer_id", "INT64").not_null(),
                ColumnDescriptor::new("order_date", "DATE"),
                ColumnDescriptor::new("amount", "NUMERIC"),
            ],
        ),
        TableDescriptor::new(
            "customers",
            vec![
                ColumnDescriptor::new("id", "INT64").not_null(),
                ColumnDescriptor::new("name", "STRING"),
            ],
        ),
    ])
}

/// The orders/customers schema plus a table nothing references.
pub fn schema_with_isolated_table() -> SchemaDescriptor {
    let mut schema = orders_customers_schema();
    schema.tables.push(TableDescriptor::new(
        "audit_log",
        vec![
            ColumnDescriptor::new("event", "STRING"),
            ColumnDescriptor::new("logged_at", "TIMESTAMP"),
        ],
    ));
    schema
}

/// The completion from the end-to-end scenario: prose around a fenced query.
pub const TOTAL_PER_CUSTOMER_COMPLETION: &str = "Here is the query you asked for:\n\n```sql\nSELECT c.name, SUM(o.amount) AS total\nFROM orders o\nJOIN customers c ON o.customer_id = c.id\nWHERE o.order_date >= '2024-05-01'\nGROUP BY c.name\n```\n\nIt sums last month's order amounts per customer.";
