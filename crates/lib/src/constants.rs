//! # Shared Constants
//!
//! Defaults for the configuration surface. `config::AppConfig` falls back to these
//! values when a key is absent from both the config file and the environment.

/// The number of generation attempts before a question is reported as exhausted.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// How long a single completion call may take, in milliseconds.
pub const DEFAULT_COMPLETION_TIMEOUT_MS: u64 = 30_000;

/// How many previous conversation turns are replayed into a prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// The largest candidate query, in bytes, the validator will look at.
pub const DEFAULT_MAX_SQL_BYTES: usize = 20_000;

/// Keywords that may not appear as bare words anywhere in a candidate query.
pub const DEFAULT_BLOCKED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "MERGE", "CREATE", "GRANT",
    "REVOKE", "EXECUTE", "EXEC", "CALL", "INTO",
];

/// System and administrative namespaces a query may not reference.
pub const DEFAULT_BLOCKED_NAMESPACES: &[&str] =
    &["information_schema", "pg_catalog", "mysql", "sys"];

/// Edges below this confidence are left out of the relationship graph.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Pairs scoring below this floor never become candidates at all.
pub const DEFAULT_CANDIDATE_FLOOR: f64 = 0.3;

pub const DEFAULT_NAME_PATTERN_WEIGHT: f64 = 0.6;
pub const DEFAULT_TYPE_COMPATIBILITY_WEIGHT: f64 = 0.1;
pub const DEFAULT_VALUE_OVERLAP_WEIGHT: f64 = 0.3;

/// Distinct values fetched per column for the value-overlap signal.
pub const DEFAULT_SAMPLE_SIZE: usize = 1_000;

/// How long a single value-sample fetch may take, in milliseconds.
pub const DEFAULT_SAMPLE_TIMEOUT_MS: u64 = 10_000;

/// How many value-sample fetches run at once.
pub const DEFAULT_SAMPLE_CONCURRENCY: usize = 4;

/// Upper bound, in characters, for the rendered schema context.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// The default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "anyquery.yml";
