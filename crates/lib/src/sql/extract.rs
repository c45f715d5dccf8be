//! # SQL Extraction
//!
//! Completions arrive as free text: a fenced code block, a "SQL:" marker, or a bare
//! statement surrounded by prose. Each shape is handled by one `SqlExtractor`;
//! an `ExtractionPipeline` tries them in order and the first match wins.

use regex::Regex;
use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::Parser;
use std::fmt::Debug;
use std::sync::LazyLock;

static FENCED_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```[ \t]*(?:sql|bigquery|googlesql)\b[ \t]*\r?\n?(.*?)```")
        .expect("valid fenced sql regex")
});

static FENCED_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("valid fenced block regex")
});

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(?:sql|query)\s*:\s*((?:select|with)\b.*?)(?:;|\n\s*\n|\z)")
        .expect("valid marker regex")
});

/// One way of locating a statement inside completion text.
pub trait SqlExtractor: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Returns the candidate statement, or `None` if this shape is absent.
    fn extract(&self, completion: &str) -> Option<String>;
}

/// A candidate statement and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub sql: String,
    pub strategy: &'static str,
}

/// A ```` ```sql ```` fenced block.
#[derive(Debug, Default)]
pub struct FencedSqlBlock;

impl SqlExtractor for FencedSqlBlock {
    fn name(&self) -> &'static str {
        "fenced-sql-block"
    }

    fn extract(&self, completion: &str) -> Option<String> {
        FENCED_SQL
            .captures_iter(completion)
            .filter_map(|caps| caps.get(1).and_then(|m| clean(m.as_str())))
            .next()
    }
}

/// Any fenced block whose body starts like a query.
#[derive(Debug, Default)]
pub struct FencedQueryBlock;

impl SqlExtractor for FencedQueryBlock {
    fn name(&self) -> &'static str {
        "fenced-query-block"
    }

    fn extract(&self, completion: &str) -> Option<String> {
        FENCED_ANY
            .captures_iter(completion)
            .filter_map(|caps| caps.get(1).and_then(|m| clean(m.as_str())))
            .find(|body| starts_like_query(body))
    }
}

/// A `SQL:` or `Query:` marker followed by the statement.
#[derive(Debug, Default)]
pub struct MarkerLine;

impl SqlExtractor for MarkerLine {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn extract(&self, completion: &str) -> Option<String> {
        MARKER
            .captures(completion)
            .and_then(|caps| caps.get(1))
            .and_then(|m| clean(m.as_str()))
    }
}

/// A bare statement: from a line starting with SELECT or WITH up to the next
/// line ending in a semicolon, or the end of the text.
///
/// Prose such as "With the schema above..." also starts that way, so every such
/// line is tried and the first span that parses wins. If none parses, the first
/// span is returned and left for the validator to reject.
#[derive(Debug, Default)]
pub struct BareStatement;

impl BareStatement {
    fn span_from(lines: &[&str]) -> Option<String> {
        let end = lines
            .iter()
            .position(|line| line.trim().ends_with(';'))
            .map_or(lines.len(), |i| i + 1);
        clean(&lines[..end].join("\n"))
    }
}

impl SqlExtractor for BareStatement {
    fn name(&self) -> &'static str {
        "bare-statement"
    }

    fn extract(&self, completion: &str) -> Option<String> {
        let lines: Vec<&str> = completion.lines().collect();
        let mut spans = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| starts_like_query(line.trim()))
            .filter_map(|(start, _)| Self::span_from(&lines[start..]));

        let first = spans.next()?;
        if parses(&first) {
            return Some(first);
        }
        spans.find(|span| parses(span)).or(Some(first))
    }
}

/// Ordered extraction strategies; first match wins.
#[derive(Debug)]
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn SqlExtractor>>,
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FencedSqlBlock),
            Box::new(FencedQueryBlock),
            Box::new(MarkerLine),
            Box::new(BareStatement),
        ])
    }
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn SqlExtractor>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, completion: &str) -> Option<Extracted> {
        self.strategies.iter().find_map(|strategy| {
            strategy.extract(completion).map(|sql| Extracted {
                sql,
                strategy: strategy.name(),
            })
        })
    }
}

fn starts_like_query(text: &str) -> bool {
    let first_word = text
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    first_word.eq_ignore_ascii_case("select") || first_word.eq_ignore_ascii_case("with")
}

fn parses(sql: &str) -> bool {
    Parser::parse_sql(&BigQueryDialect {}, sql).is_ok()
}

fn clean(raw: &str) -> Option<String> {
    let sql = raw.trim().trim_end_matches(';').trim_end();
    (!sql.is_empty()).then(|| sql.to_string())
}
