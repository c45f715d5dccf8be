//! # Relationship Detection
//!
//! Two evidence passes feed one graph. Foreign keys declared in the catalog come
//! first, at full confidence. Then every ordered column pair across tables is
//! scored by the matcher, optionally with value samples from storage. The graph
//! builder keeps the strongest candidate where the passes agree on a pair.
//!
//! Pairs are enumerated in schema order (source table, source column, target
//! table, target column) before any sampling starts. Samples are fetched with an
//! order-preserving bounded stream, so the candidate sequence handed to the graph
//! builder never depends on which fetch finished first.

use super::graph::{RelationshipCandidate, RelationshipGraph};
use super::matcher::{ColumnMatcher, ColumnRef, SamplePair};
use super::scoring::Evidence;
use crate::config::RelationshipConfig;
use crate::errors::SignalUnavailable;
use crate::providers::db::Storage;
use crate::schema::{ForeignKey, SchemaDescriptor};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sampled values keyed by table, then column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSamples {
    values: HashMap<String, HashMap<String, Vec<String>>>,
}

impl ColumnSamples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        values: Vec<String>,
    ) {
        self.values
            .entry(table.into())
            .or_default()
            .insert(column.into(), values);
    }

    /// Exact lookup first, then case-insensitive.
    pub fn get(&self, table: &str, column: &str) -> Option<&[String]> {
        let columns = self.values.get(table).or_else(|| {
            self.values
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(table))
                .map(|(_, columns)| columns)
        })?;
        columns
            .get(column)
            .or_else(|| {
                columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Indices into the schema: (source table, source column, target table, target column).
type PairIndex = (usize, usize, usize, usize);

#[derive(Debug, Clone)]
pub struct RelationshipDetector {
    matcher: ColumnMatcher,
    min_confidence: f64,
    sample_size: usize,
    sample_timeout: Duration,
    sample_concurrency: usize,
}

impl Default for RelationshipDetector {
    fn default() -> Self {
        Self::new(&RelationshipConfig::default())
    }
}

impl RelationshipDetector {
    pub fn new(config: &RelationshipConfig) -> Self {
        Self {
            matcher: ColumnMatcher::from_config(config),
            min_confidence: config.min_confidence,
            sample_size: config.sample_size,
            sample_timeout: config.sample_timeout(),
            sample_concurrency: config.sample_concurrency.max(1),
        }
    }

    /// Every comparable ordered pair, in schema order. Both directions of each
    /// table pair are included.
    fn pairs(&self, schema: &SchemaDescriptor) -> Vec<PairIndex> {
        let mut pairs = Vec::new();
        for (ti, source_table) in schema.tables.iter().enumerate() {
            for (ci, source_column) in source_table.columns.iter().enumerate() {
                let source = ColumnRef::of(&source_table.name, source_column);
                for (tj, target_table) in schema.tables.iter().enumerate() {
                    if ti == tj {
                        continue;
                    }
                    for (cj, target_column) in target_table.columns.iter().enumerate() {
                        let target = ColumnRef::of(&target_table.name, target_column);
                        if self.matcher.comparable(source, target) {
                            pairs.push((ti, ci, tj, cj));
                        }
                    }
                }
            }
        }
        pairs
    }

    /// Scores every pair in schema order, using samples where both sides have one.
    pub fn candidates(
        &self,
        schema: &SchemaDescriptor,
        samples: &ColumnSamples,
    ) -> Vec<RelationshipCandidate> {
        self.pairs(schema)
            .into_iter()
            .filter_map(|(ti, ci, tj, cj)| {
                let (source_table, target_table) = (&schema.tables[ti], &schema.tables[tj]);
                let source = ColumnRef::of(&source_table.name, &source_table.columns[ci]);
                let target = ColumnRef::of(&target_table.name, &target_table.columns[cj]);
                let pair = samples
                    .get(source.table, source.column)
                    .zip(samples.get(target.table, target.column))
                    .map(|(s, t)| SamplePair::new(s, t));
                self.matcher.score(source, target, pair.as_ref())
            })
            .collect()
    }

    /// Declared foreign keys as full-confidence candidates, using the schema's
    /// spelling of each name. Keys with an endpoint outside the schema are skipped.
    pub fn declared_candidates(
        &self,
        schema: &SchemaDescriptor,
        declared: &[ForeignKey],
    ) -> Vec<RelationshipCandidate> {
        declared
            .iter()
            .filter_map(|fk| {
                let source_table = schema.table(&fk.source_table)?;
                let source_column = source_table.column(&fk.source_column)?;
                let target_table = schema.table(&fk.target_table)?;
                let target_column = target_table.column(&fk.target_column)?;
                Some(RelationshipCandidate {
                    source_table: source_table.name.clone(),
                    source_column: source_column.name.clone(),
                    target_table: target_table.name.clone(),
                    target_column: target_column.name.clone(),
                    confidence: 1.0,
                    evidence: vec![Evidence::DeclaredForeignKey],
                })
            })
            .collect()
    }

    /// Scores the schema with the given samples and builds the graph.
    pub fn detect(&self, schema: &SchemaDescriptor, samples: &ColumnSamples) -> RelationshipGraph {
        self.detect_with_foreign_keys(schema, &[], samples)
    }

    /// Builds the graph from the declared keys followed by the inferred candidates.
    pub fn detect_with_foreign_keys(
        &self,
        schema: &SchemaDescriptor,
        declared: &[ForeignKey],
        samples: &ColumnSamples,
    ) -> RelationshipGraph {
        let mut candidates = self.declared_candidates(schema, declared);
        let declared_count = candidates.len();
        candidates.extend(self.candidates(schema, samples));
        info!(
            tables = schema.tables.len(),
            declared = declared_count,
            candidates = candidates.len(),
            "[relationship_detector] scored column pairs"
        );
        RelationshipGraph::build(candidates, schema.table_names(), self.min_confidence)
    }

    /// Like `detect_with_foreign_keys`, but reads the declared keys from storage
    /// and first samples every column that takes part in a comparable pair. A
    /// catalog lookup or sample fetch that fails or times out only removes that
    /// evidence.
    pub async fn detect_with_samples(
        &self,
        schema: &SchemaDescriptor,
        storage: &dyn Storage,
    ) -> RelationshipGraph {
        let declared = self.fetch_foreign_keys(schema, storage).await;
        let samples = self.fetch_samples(schema, storage).await;
        self.detect_with_foreign_keys(schema, &declared, &samples)
    }

    async fn fetch_foreign_keys(
        &self,
        schema: &SchemaDescriptor,
        storage: &dyn Storage,
    ) -> Vec<ForeignKey> {
        let tables = schema.table_names();
        let lookup = storage.foreign_keys(Some(tables.as_slice()));
        match tokio::time::timeout(self.sample_timeout, lookup).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(e)) => {
                warn!("[relationship_detector] declared foreign keys unavailable: {e}");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "[relationship_detector] declared foreign keys timed out after {:?}",
                    self.sample_timeout
                );
                Vec::new()
            }
        }
    }

    async fn fetch_samples(
        &self,
        schema: &SchemaDescriptor,
        storage: &dyn Storage,
    ) -> ColumnSamples {
        let columns: BTreeSet<(usize, usize)> = self
            .pairs(schema)
            .into_iter()
            .flat_map(|(ti, ci, tj, cj)| [(ti, ci), (tj, cj)])
            .collect();

        debug!(
            columns = columns.len(),
            concurrency = self.sample_concurrency,
            "[relationship_detector] sampling column values"
        );

        let fetched: Vec<((usize, usize), Result<Vec<String>, SignalUnavailable>)> =
            stream::iter(columns)
                .map(move |(ti, ci)| {
                    let table = &schema.tables[ti].name;
                    let column = &schema.tables[ti].columns[ci].name;
                    async move {
                        let result = match tokio::time::timeout(
                            self.sample_timeout,
                            storage.sample_column_values(table, column, self.sample_size),
                        )
                        .await
                        {
                            Err(_) => Err(SignalUnavailable::Timeout(self.sample_timeout)),
                            Ok(Err(e)) => Err(SignalUnavailable::Fetch(e.to_string())),
                            Ok(Ok(values)) => Ok(values),
                        };
                        ((ti, ci), result)
                    }
                })
                .buffered(self.sample_concurrency)
                .collect()
                .await;

        let mut samples = ColumnSamples::new();
        for ((ti, ci), result) in fetched {
            let table = &schema.tables[ti];
            let column = &table.columns[ci];
            match result {
                Ok(values) => samples.insert(table.name.clone(), column.name.clone(), values),
                Err(reason) => warn!(
                    "[relationship_detector] no sample for {}.{}: {reason}",
                    table.name, column.name
                ),
            }
        }
        samples
    }
}
