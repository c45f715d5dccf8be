//! # Relationship Detection
//!
//! Infers foreign-key-like links between tables from column names, declared
//! types and, when available, overlapping sampled values.

pub mod detector;
pub mod graph;
pub mod matcher;
pub mod scoring;

pub use detector::{ColumnSamples, RelationshipDetector};
pub use graph::{GraphSummary, NodeInfo, RelationshipCandidate, RelationshipGraph};
pub use matcher::{ColumnMatcher, ColumnRef, SamplePair};
pub use scoring::{weighted_average, Evidence, Signal, SignalKind, SignalWeights};
