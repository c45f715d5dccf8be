//! # Relationship Graph
//!
//! Folds scored candidates into a directed graph of tables. The graph is built
//! in one pass from an ordered candidate sequence and never mutated afterwards;
//! a new detection run builds a new graph.

use super::scoring::Evidence;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const HUB_COUNT: usize = 5;

/// A scored claim that `source_table.source_column` references
/// `target_table.target_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipCandidate {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl RelationshipCandidate {
    fn key(&self) -> (String, String, String, String) {
        (
            self.source_table.to_lowercase(),
            self.source_column.to_lowercase(),
            self.target_table.to_lowercase(),
            self.target_column.to_lowercase(),
        )
    }

    // Higher confidence wins, then more evidence. Equal candidates keep the incumbent.
    fn beats(&self, other: &Self) -> bool {
        self.confidence > other.confidence
            || (self.confidence == other.confidence && self.evidence.len() > other.evidence.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub table: String,
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub total_tables: usize,
    pub total_relationships: usize,
    pub tables: Vec<String>,
    pub isolated_tables: Vec<String>,
    /// Up to five connected tables, most connected first.
    pub hub_tables: Vec<String>,
}

/// Tables as nodes, surviving candidates as directed edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationshipGraph {
    nodes: Vec<String>,
    edges: Vec<RelationshipCandidate>,
}

impl RelationshipGraph {
    /// Builds the graph from candidates in their stable input order.
    ///
    /// - Candidates below `min_confidence` (or with a NaN confidence) are dropped,
    ///   but their tables still become nodes.
    /// - Confidences are clamped to `[0, 1]`.
    /// - At most one edge per (source column, target column) pair survives; it
    ///   keeps the position of the first candidate seen for that pair.
    pub fn build(
        candidates: impl IntoIterator<Item = RelationshipCandidate>,
        tables: impl IntoIterator<Item = String>,
        min_confidence: f64,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut seen_nodes = HashSet::new();
        let mut add_node = |name: &str, nodes: &mut Vec<String>| {
            if seen_nodes.insert(name.to_lowercase()) {
                nodes.push(name.to_string());
            }
        };

        for table in tables {
            add_node(&table, &mut nodes);
        }

        let mut edges: Vec<RelationshipCandidate> = Vec::new();
        let mut positions: HashMap<(String, String, String, String), usize> = HashMap::new();
        let mut filtered = 0usize;

        for mut candidate in candidates {
            add_node(&candidate.source_table, &mut nodes);
            add_node(&candidate.target_table, &mut nodes);

            if candidate.confidence.is_nan() {
                filtered += 1;
                continue;
            }
            candidate.confidence = candidate.confidence.clamp(0.0, 1.0);
            if candidate.confidence < min_confidence {
                filtered += 1;
                continue;
            }

            match positions.get(&candidate.key()) {
                Some(&index) => {
                    if candidate.beats(&edges[index]) {
                        edges[index] = candidate;
                    }
                }
                None => {
                    positions.insert(candidate.key(), edges.len());
                    edges.push(candidate);
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            filtered,
            "[relationship_graph] built"
        );
        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[RelationshipCandidate] {
        &self.edges
    }

    pub fn contains_node(&self, table: &str) -> bool {
        self.nodes.iter().any(|n| n.eq_ignore_ascii_case(table))
    }

    /// Edges leaving `table`.
    pub fn edges_from<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipCandidate> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source_table.eq_ignore_ascii_case(table))
    }

    /// Degree information for every node, in node order.
    pub fn nodes_info(&self) -> Vec<NodeInfo> {
        let mut out_degree: HashMap<String, usize> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for edge in &self.edges {
            *out_degree.entry(edge.source_table.to_lowercase()).or_default() += 1;
            *in_degree.entry(edge.target_table.to_lowercase()).or_default() += 1;
        }

        self.nodes
            .iter()
            .map(|table| {
                let key = table.to_lowercase();
                let in_degree = in_degree.get(&key).copied().unwrap_or(0);
                let out_degree = out_degree.get(&key).copied().unwrap_or(0);
                NodeInfo {
                    table: table.clone(),
                    in_degree,
                    out_degree,
                    total_connections: in_degree + out_degree,
                }
            })
            .collect()
    }

    pub fn summary(&self) -> GraphSummary {
        let info = self.nodes_info();
        let isolated_tables = info
            .iter()
            .filter(|n| n.total_connections == 0)
            .map(|n| n.table.clone())
            .collect();

        let mut connected: Vec<&NodeInfo> =
            info.iter().filter(|n| n.total_connections > 0).collect();
        // Stable sort keeps node order among equally connected tables.
        connected.sort_by(|a, b| b.total_connections.cmp(&a.total_connections));
        let hub_tables = connected
            .into_iter()
            .take(HUB_COUNT)
            .map(|n| n.table.clone())
            .collect();

        GraphSummary {
            total_tables: self.nodes.len(),
            total_relationships: self.edges.len(),
            tables: self.nodes.clone(),
            isolated_tables,
            hub_tables,
        }
    }
}
