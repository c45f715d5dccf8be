//! # Column Matcher
//!
//! Scores how likely it is that one column references another. Three signals
//! are gathered independently and combined by `scoring::weighted_average`:
//!
//! - **name pattern**: key-naming conventions such as `customer_id` -> `customers.id`
//! - **type compatibility**: a veto when the declared types cannot be compared
//! - **value overlap**: share of sampled source values found in the target sample

use super::graph::RelationshipCandidate;
use super::scoring::{weighted_average, Evidence, Signal, SignalKind, SignalWeights};
use crate::config::RelationshipConfig;
use crate::constants::DEFAULT_CANDIDATE_FLOOR;
use crate::errors::SignalUnavailable;
use crate::schema::{base_type, short_table_name, ColumnDescriptor, TypeClass};
use std::collections::HashSet;
use tracing::debug;

const FOREIGN_KEY_SCORE: f64 = 0.9;
const IDENTICAL_NAME_SCORE: f64 = 0.85;
const TABLE_PREFIXED_SCORE: f64 = 0.75;
const EXACT_TYPE_SCORE: f64 = 1.0;
const CLASS_TYPE_SCORE: f64 = 0.8;

/// A column together with the table it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRef<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub data_type: &'a str,
}

impl<'a> ColumnRef<'a> {
    pub fn new(table: &'a str, column: &'a str, data_type: &'a str) -> Self {
        Self {
            table,
            column,
            data_type,
        }
    }

    pub fn of(table: &'a str, descriptor: &'a ColumnDescriptor) -> Self {
        Self::new(table, &descriptor.name, &descriptor.data_type)
    }
}

/// Sampled values for the source and target side of a pair.
#[derive(Debug, Clone, Copy)]
pub struct SamplePair<'a> {
    pub source: &'a [String],
    pub target: &'a [String],
}

impl<'a> SamplePair<'a> {
    pub fn new(source: &'a [String], target: &'a [String]) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMatcher {
    weights: SignalWeights,
    floor: f64,
}

impl Default for ColumnMatcher {
    fn default() -> Self {
        Self::new(SignalWeights::default(), DEFAULT_CANDIDATE_FLOOR)
    }
}

impl ColumnMatcher {
    pub fn new(weights: SignalWeights, floor: f64) -> Self {
        Self { weights, floor }
    }

    pub fn from_config(config: &RelationshipConfig) -> Self {
        Self::new(config.weights, config.candidate_floor)
    }

    /// Whether the pair survives the same-table and type checks that run before scoring.
    pub fn comparable(&self, source: ColumnRef<'_>, target: ColumnRef<'_>) -> bool {
        !source.table.eq_ignore_ascii_case(target.table)
            && type_signal(source.data_type, target.data_type).is_some()
    }

    /// Scores `source` as a reference to `target`.
    ///
    /// Returns `None` for columns of the same table, for incompatible types and
    /// for pairs whose combined confidence falls below the floor.
    pub fn score(
        &self,
        source: ColumnRef<'_>,
        target: ColumnRef<'_>,
        samples: Option<&SamplePair<'_>>,
    ) -> Option<RelationshipCandidate> {
        if source.table.eq_ignore_ascii_case(target.table) {
            return None;
        }

        let type_value = type_signal(source.data_type, target.data_type)?;
        let (name_value, rule) = name_signal(source, target);
        let overlap = match samples {
            Some(pair) => value_overlap(pair),
            None => Err(SignalUnavailable::NoSample),
        };
        if let Err(reason) = &overlap {
            debug!(
                "[column_matcher] overlap unavailable for {}.{} -> {}.{}: {reason}",
                source.table,
                source.column,
                target.table,
                target.column
            );
        }

        let overlap_weight = self.weights.weight_of(SignalKind::ValueOverlap);
        let signals = [
            Signal::available(
                SignalKind::NamePattern,
                self.weights.weight_of(SignalKind::NamePattern),
                name_value,
            ),
            Signal::available(
                SignalKind::TypeCompatibility,
                self.weights.weight_of(SignalKind::TypeCompatibility),
                type_value,
            ),
            match &overlap {
                Ok(value) => Signal::available(SignalKind::ValueOverlap, overlap_weight, *value),
                Err(_) => Signal::unavailable(SignalKind::ValueOverlap, overlap_weight),
            },
        ];

        let confidence = weighted_average(&signals)?;
        if confidence < self.floor {
            return None;
        }

        let mut evidence = Vec::with_capacity(3);
        if let Some(rule) = rule.filter(|_| name_value > 0.0) {
            evidence.push(Evidence::NamePattern(rule.to_string()));
        }
        evidence.push(Evidence::TypeCompatible);
        if overlap.is_ok_and(|value| value > 0.0) {
            evidence.push(Evidence::ValueOverlapSampled);
        }

        debug!(
            confidence,
            "[column_matcher] candidate {}.{} -> {}.{}",
            source.table,
            source.column,
            target.table,
            target.column
        );

        Some(RelationshipCandidate {
            source_table: source.table.to_string(),
            source_column: source.column.to_string(),
            target_table: target.table.to_string(),
            target_column: target.column.to_string(),
            confidence,
            evidence,
        })
    }
}

/// Lowercases, splits camelCase and collapses runs of other characters into `_`.
pub fn normalize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
            {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
        prev = Some(ch);
    }
    out.trim_end_matches('_').to_string()
}

/// Whether `stem` names `table`, allowing the common English plural forms.
pub fn table_names_match(stem: &str, table: &str) -> bool {
    let stem = normalize_identifier(stem);
    let table = normalize_identifier(short_table_name(table));
    if stem.is_empty() || table.is_empty() {
        return false;
    }
    plural_forms(&stem).any(|form| form == table) || plural_forms(&table).any(|form| form == stem)
}

fn plural_forms(word: &str) -> impl Iterator<Item = String> + '_ {
    let ies = word
        .strip_suffix('y')
        .filter(|rest| !rest.is_empty())
        .map(|rest| format!("{rest}ies"));
    [
        Some(word.to_string()),
        Some(format!("{word}s")),
        Some(format!("{word}es")),
        ies,
    ]
    .into_iter()
    .flatten()
}

// Returns the name score and the rule that produced it.
fn name_signal(source: ColumnRef<'_>, target: ColumnRef<'_>) -> (f64, Option<&'static str>) {
    let src = normalize_identifier(source.column);
    let tgt = normalize_identifier(target.column);

    if tgt == "id" {
        let patterns: [(&'static str, Option<&str>); 4] = [
            (
                "fk-prefix",
                src.strip_prefix("fk_").and_then(|s| s.strip_suffix("_id")),
            ),
            ("table-id-suffix", src.strip_suffix("_id")),
            ("fk-suffix", src.strip_suffix("_fk")),
            ("ref-prefix", src.strip_prefix("ref_")),
        ];
        for (rule, stem) in patterns {
            if stem.is_some_and(|stem| table_names_match(stem, target.table)) {
                return (FOREIGN_KEY_SCORE, Some(rule));
            }
        }
    }

    if src == tgt {
        if src == "id" {
            return (0.0, None);
        }
        return (IDENTICAL_NAME_SCORE, Some("identical-name"));
    }

    let prefixed = src
        .strip_suffix(tgt.as_str())
        .and_then(|s| s.strip_suffix('_'))
        .is_some_and(|stem| table_names_match(stem, target.table));
    if prefixed {
        return (TABLE_PREFIXED_SCORE, Some("table-prefixed"));
    }

    (0.0, None)
}

// `None` vetoes the pair. Unclassified types only match their exact declaration.
fn type_signal(source: &str, target: &str) -> Option<f64> {
    let (source_class, target_class) = (TypeClass::of(source), TypeClass::of(target));
    if source_class == TypeClass::Other || target_class == TypeClass::Other {
        return (declared(source) == declared(target)).then_some(EXACT_TYPE_SCORE);
    }
    if base_type(source) == base_type(target) {
        return Some(EXACT_TYPE_SCORE);
    }
    source_class
        .comparable_with(target_class)
        .then_some(CLASS_TYPE_SCORE)
}

fn declared(data_type: &str) -> String {
    data_type
        .split_whitespace()
        .collect::<String>()
        .to_uppercase()
}

fn value_overlap(samples: &SamplePair<'_>) -> Result<f64, SignalUnavailable> {
    let source: HashSet<&str> = non_empty(samples.source).collect();
    let target: HashSet<&str> = non_empty(samples.target).collect();
    if source.is_empty() || target.is_empty() {
        return Err(SignalUnavailable::EmptySample);
    }
    let hits = source.iter().filter(|v| target.contains(*v)).count();
    Ok(hits as f64 / source.len() as f64)
}

fn non_empty(values: &[String]) -> impl Iterator<Item = &str> {
    values.iter().map(|v| v.trim()).filter(|v| !v.is_empty())
}
