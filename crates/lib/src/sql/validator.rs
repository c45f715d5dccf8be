//! # SQL Validator
//!
//! The security gate every candidate query passes before it may be executed.
//! A candidate is accepted only if it is a single read-only query, under the byte
//! limit, free of blocked keywords at any depth, and clear of blocked namespaces.
//!
//! The keyword scan runs on the token stream rather than the raw text, so comments
//! and string literals never trigger it, while a keyword smuggled into a subquery,
//! a CTE or a second statement always does.
//!
//! Parsing uses sqlparser's BigQuery dialect, which does not know every GoogleSQL
//! form. Null treatment inside an aggregate, as in `ARRAY_AGG(x IGNORE NULLS)`,
//! fails to parse and is rejected as unparsable, so the model is asked to rewrite
//! it (for example with a `WHERE x IS NOT NULL` filter).

use crate::config::ValidationConfig;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{visit_relations, visit_statements, Query, SetExpr, Statement};
use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

/// The verdict for one candidate query. Never partially valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Accepted(String),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The normalized query, if accepted.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Accepted(sql) => Some(sql),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Empty,
    TooLarge,
    Unparsable,
    StatementCount,
    NotReadOnly,
    BlockedKeyword,
    BlockedNamespace,
    NoSqlFound,
    /// Passed the validator but the warehouse refused it on a dry run.
    DryRunFailed,
}

/// Why a candidate was turned away, and the token or clause responsible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
    pub offending: Option<String>,
}

impl Rejection {
    pub fn new(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            offending: None,
        }
    }

    pub fn with_offending(mut self, offending: impl Into<String>) -> Self {
        self.offending = Some(offending.into());
        self
    }

    /// The rejection recorded when no statement could be recovered from a completion.
    pub fn no_sql_found() -> Self {
        Self::new(RejectionKind::NoSqlFound, "no SQL found in the completion")
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.offending {
            Some(offending) => write!(f, "{} (offending: {offending})", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// A pure, deterministic read-only policy check.
#[derive(Debug, Clone)]
pub struct SqlValidator {
    max_bytes: usize,
    blocked_keywords: HashSet<String>,
    blocked_namespaces: HashSet<String>,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl SqlValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_bytes: config.max_sql_bytes,
            blocked_keywords: config
                .blocked_keywords
                .iter()
                .map(|k| k.trim().to_uppercase())
                .collect(),
            blocked_namespaces: config
                .blocked_namespaces
                .iter()
                .map(|n| n.trim().to_lowercase())
                .collect(),
        }
    }

    /// Validates a candidate query.
    ///
    /// The accepted form is the trimmed input without trailing semicolons, so
    /// validating an accepted query again yields the same outcome.
    pub fn validate(&self, candidate: &str) -> ValidationOutcome {
        match self.check(candidate) {
            Ok(sql) => ValidationOutcome::Accepted(sql),
            Err(rejection) => ValidationOutcome::Rejected(rejection),
        }
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        self.validate(candidate).is_accepted()
    }

    fn check(&self, candidate: &str) -> Result<String, Rejection> {
        if candidate.len() > self.max_bytes {
            return Err(Rejection::new(
                RejectionKind::TooLarge,
                format!(
                    "query is {} bytes, larger than the {}-byte limit",
                    candidate.len(),
                    self.max_bytes
                ),
            ));
        }

        let sql = normalize(candidate);
        if sql.is_empty() {
            return Err(Rejection::new(RejectionKind::Empty, "empty SQL query"));
        }

        self.scan_keywords(sql)?;

        let statements = Parser::parse_sql(&BigQueryDialect {}, sql).map_err(|e| {
            Rejection::new(RejectionKind::Unparsable, format!("failed to parse SQL: {e}"))
        })?;

        let statement = match statements.as_slice() {
            [statement] => statement,
            _ => {
                return Err(Rejection::new(
                    RejectionKind::StatementCount,
                    format!(
                        "exactly one statement is allowed, found {}",
                        statements.len()
                    ),
                ))
            }
        };

        ensure_read_only(statement)?;
        self.check_namespaces(statement)?;

        Ok(sql.to_string())
    }

    fn scan_keywords(&self, sql: &str) -> Result<(), Rejection> {
        let tokens = Tokenizer::new(&BigQueryDialect {}, sql)
            .tokenize()
            .map_err(|e| {
                Rejection::new(
                    RejectionKind::Unparsable,
                    format!("failed to tokenize SQL: {e}"),
                )
            })?;

        for token in tokens {
            if let Token::Word(word) = token {
                if word.quote_style.is_some() {
                    continue;
                }
                let upper = word.value.to_uppercase();
                if self.blocked_keywords.contains(&upper) {
                    return Err(Rejection::new(
                        RejectionKind::BlockedKeyword,
                        format!("only read-only queries are allowed; found {upper}"),
                    )
                    .with_offending(upper));
                }
            }
        }
        Ok(())
    }

    fn check_namespaces(&self, statement: &Statement) -> Result<(), Rejection> {
        let blocked = visit_relations(statement, |name| {
            let rendered = name.to_string();
            match name_parts(&rendered)
                .into_iter()
                .find(|part| self.blocked_namespaces.contains(&part.to_lowercase()))
            {
                Some(_) => ControlFlow::Break(rendered),
                None => ControlFlow::Continue(()),
            }
        });

        match blocked {
            ControlFlow::Break(relation) => Err(Rejection::new(
                RejectionKind::BlockedNamespace,
                "query references a blocked system namespace",
            )
            .with_offending(relation)),
            ControlFlow::Continue(()) => Ok(()),
        }
    }

    /// The relations a query reads from, in order of first appearance.
    /// CTE names are not reported.
    pub fn referenced_tables(&self, sql: &str) -> Result<Vec<String>, Rejection> {
        let statements = Parser::parse_sql(&BigQueryDialect {}, normalize(sql)).map_err(|e| {
            Rejection::new(RejectionKind::Unparsable, format!("failed to parse SQL: {e}"))
        })?;

        let mut cte_names = HashSet::new();
        for statement in &statements {
            if let Statement::Query(query) = statement {
                collect_cte_names(query, &mut cte_names);
            }
        }

        let mut tables: Vec<String> = Vec::new();
        for statement in &statements {
            let _ = visit_relations(statement, |name| {
                let table = name_parts(&name.to_string()).join(".");
                if !cte_names.contains(&table.to_lowercase()) && !tables.contains(&table) {
                    tables.push(table);
                }
                ControlFlow::<()>::Continue(())
            });
        }
        Ok(tables)
    }
}

fn normalize(candidate: &str) -> &str {
    candidate.trim().trim_end_matches([';', ' ', '\t', '\r', '\n'])
}

/// Splits a rendered object name into its dotted parts, dropping identifier quotes.
/// `` `proj.ds.INFORMATION_SCHEMA.TABLES` `` yields four parts.
fn name_parts(rendered: &str) -> Vec<String> {
    rendered
        .split('.')
        .map(|part| part.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']')))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn ensure_read_only(statement: &Statement) -> Result<(), Rejection> {
    let query = match statement {
        Statement::Query(query) => query,
        other => {
            return Err(not_read_only(&other.to_string()));
        }
    };
    check_query(query).map_err(|clause| not_read_only(&clause))?;

    // Nested statements (e.g. inside set-expression branches) must be queries too.
    let nested = visit_statements(statement, |nested| match nested {
        Statement::Query(_) => ControlFlow::Continue(()),
        other => ControlFlow::Break(other.to_string()),
    });
    match nested {
        ControlFlow::Break(clause) => Err(not_read_only(&clause)),
        ControlFlow::Continue(()) => Ok(()),
    }
}

fn not_read_only(clause: &str) -> Rejection {
    let leading = leading_words(clause);
    Rejection::new(
        RejectionKind::NotReadOnly,
        format!("only read-only queries are allowed; found {leading}"),
    )
    .with_offending(leading)
}

fn leading_words(clause: &str) -> String {
    clause
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn check_query(query: &Query) -> Result<(), String> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(expr: &SetExpr) -> Result<(), String> {
    match expr {
        SetExpr::Select(select) => match &select.into {
            Some(_) => Err("SELECT INTO".to_string()),
            None => Ok(()),
        },
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Values(_) => Ok(()),
        other => Err(other.to_string()),
    }
}

fn collect_cte_names(query: &Query, names: &mut HashSet<String>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            names.insert(cte.alias.name.value.to_lowercase());
            collect_cte_names(&cte.query, names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_semicolons() {
        assert_eq!(normalize("  SELECT 1 ;\n"), "SELECT 1");
        assert_eq!(normalize("SELECT 1;;"), "SELECT 1");
    }

    #[test]
    fn name_parts_unquotes_backticked_paths() {
        assert_eq!(
            name_parts("`proj.ds.INFORMATION_SCHEMA.TABLES`"),
            vec!["proj", "ds", "INFORMATION_SCHEMA", "TABLES"]
        );
        assert_eq!(name_parts("ds.orders"), vec!["ds", "orders"]);
    }
}
