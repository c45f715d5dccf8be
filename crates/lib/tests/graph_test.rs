//! # Relationship Graph Tests
//!
//! Building the graph from candidate sequences: filtering, deduplication, node
//! bookkeeping and the summary.

mod common;

use anyquery::relationships::{Evidence, RelationshipCandidate, RelationshipGraph};
use common::setup_tracing;

fn candidate(source: &str, target: &str, confidence: f64) -> RelationshipCandidate {
    let (source_table, source_column) = source.split_once('.').unwrap();
    let (target_table, target_column) = target.split_once('.').unwrap();
    RelationshipCandidate {
        source_table: source_table.to_string(),
        source_column: source_column.to_string(),
        target_table: target_table.to_string(),
        target_column: target_column.to_string(),
        confidence,
        evidence: vec![Evidence::TypeCompatible],
    }
}

fn tables(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Duplicate column pairs collapse to the most confident candidate.
#[test]
fn test_duplicates_keep_highest_confidence() {
    setup_tracing();
    let graph = RelationshipGraph::build(
        vec![
            candidate("orders.customer_id", "customers.id", 0.6),
            candidate("Orders.Customer_ID", "customers.ID", 0.9),
        ],
        tables(&["orders", "customers"]),
        0.5,
    );

    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.edges()[0].confidence, 0.9);
}

/// On equal confidence, more evidence wins; otherwise the first one stays.
#[test]
fn test_confidence_ties() {
    let mut richer = candidate("orders.customer_id", "customers.id", 0.8);
    richer.evidence.push(Evidence::ValueOverlapSampled);
    let first = candidate("orders.customer_id", "customers.id", 0.8);

    let graph = RelationshipGraph::build(
        vec![first.clone(), richer.clone()],
        tables(&["orders", "customers"]),
        0.5,
    );
    assert_eq!(graph.edges(), &[richer]);

    let mut second = first.clone();
    second.source_table = "ORDERS".to_string();
    let graph = RelationshipGraph::build(
        vec![first.clone(), second],
        tables(&["orders", "customers"]),
        0.5,
    );
    assert_eq!(graph.edges(), &[first]);
}

/// A replacing candidate keeps the position of the first one seen.
#[test]
fn test_edges_keep_first_seen_order() {
    let graph = RelationshipGraph::build(
        vec![
            candidate("orders.customer_id", "customers.id", 0.6),
            candidate("orders.product_id", "products.id", 0.9),
            candidate("orders.customer_id", "customers.id", 0.95),
        ],
        tables(&["orders", "customers", "products"]),
        0.5,
    );

    let pairs: Vec<(&str, f64)> = graph
        .edges()
        .iter()
        .map(|e| (e.target_table.as_str(), e.confidence))
        .collect();
    assert_eq!(pairs, vec![("customers", 0.95), ("products", 0.9)]);
}

/// Filtered candidates leave no edge but their tables still become nodes.
#[test]
fn test_filtered_endpoints_remain_nodes() {
    let graph = RelationshipGraph::build(
        vec![
            candidate("orders.customer_id", "customers.id", 0.9),
            candidate("shipments.order_ref", "orders.id", 0.2),
            candidate("refunds.order_id", "orders.id", f64::NAN),
        ],
        tables(&["orders", "customers", "audit_log"]),
        0.5,
    );

    assert_eq!(graph.edges().len(), 1);
    assert_eq!(
        graph.nodes(),
        &tables(&["orders", "customers", "audit_log", "shipments", "refunds"])[..]
    );
    assert!(graph.contains_node("SHIPMENTS"));
    assert_eq!(graph.edges_from("shipments").count(), 0);
}

/// Confidences above one are clamped; node names are matched case-insensitively.
#[test]
fn test_confidence_is_clamped() {
    let graph = RelationshipGraph::build(
        vec![candidate("Orders.customer_id", "Customers.id", 1.7)],
        tables(&["orders", "customers"]),
        0.5,
    );
    assert_eq!(graph.edges()[0].confidence, 1.0);
    assert_eq!(graph.nodes(), &tables(&["orders", "customers"])[..]);
}

/// Degrees, isolated tables and hubs in the summary.
#[test]
fn test_summary_and_node_info() {
    let graph = RelationshipGraph::build(
        vec![
            candidate("orders.customer_id", "customers.id", 0.9),
            candidate("orders.product_id", "products.id", 0.9),
            candidate("reviews.customer_id", "customers.id", 0.9),
        ],
        tables(&["orders", "customers", "products", "reviews", "audit_log"]),
        0.5,
    );

    let info = graph.nodes_info();
    let orders = &info[0];
    assert_eq!((orders.out_degree, orders.in_degree), (2, 0));
    let customers = &info[1];
    assert_eq!((customers.out_degree, customers.in_degree), (0, 2));
    assert_eq!(info[4].total_connections, 0);

    let summary = graph.summary();
    assert_eq!(summary.total_tables, 5);
    assert_eq!(summary.total_relationships, 3);
    assert_eq!(summary.isolated_tables, tables(&["audit_log"]));
    assert_eq!(
        summary.hub_tables,
        tables(&["orders", "customers", "products", "reviews"])
    );
}

/// An empty candidate list yields a graph of isolated tables.
#[test]
fn test_no_candidates() {
    let graph = RelationshipGraph::build(Vec::new(), tables(&["a", "b"]), 0.5);
    assert!(graph.edges().is_empty());
    let summary = graph.summary();
    assert_eq!(summary.isolated_tables, tables(&["a", "b"]));
    assert!(summary.hub_tables.is_empty());
}
