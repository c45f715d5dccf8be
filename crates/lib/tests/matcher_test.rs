//! # Column Matcher Tests
//!
//! Scores for single column pairs: naming conventions, the type veto, and how
//! sampled value overlap raises or lowers confidence.

mod common;

use anyquery::relationships::{
    ColumnMatcher, ColumnRef, Evidence, SamplePair, SignalWeights,
};
use common::setup_tracing;

fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

/// `orders.customer_id -> customers.id` is a strong candidate on names and types alone.
#[test]
fn test_foreign_key_naming_without_samples() {
    setup_tracing();
    let matcher = ColumnMatcher::default();
    let candidate = matcher
        .score(
            ColumnRef::new("orders", "customer_id", "INT64"),
            ColumnRef::new("customers", "id", "INT64"),
            None,
        )
        .expect("should be a candidate");

    assert_close(candidate.confidence, 0.914);
    assert_eq!(candidate.source_table, "orders");
    assert_eq!(candidate.target_column, "id");
    assert_eq!(
        candidate.evidence,
        vec![
            Evidence::NamePattern("table-id-suffix".to_string()),
            Evidence::TypeCompatible
        ]
    );
}

/// camelCase columns follow the same conventions.
#[test]
fn test_camel_case_columns() {
    let candidate = ColumnMatcher::default()
        .score(
            ColumnRef::new("Orders", "customerId", "INT64"),
            ColumnRef::new("Customers", "id", "INT64"),
            None,
        )
        .unwrap();
    assert_close(candidate.confidence, 0.914);
}

/// Pairs with no naming link, in the same table, or with incomparable types
/// are not candidates.
#[test]
fn test_non_candidates() {
    let matcher = ColumnMatcher::default();

    assert!(matcher
        .score(
            ColumnRef::new("customers", "id", "INT64"),
            ColumnRef::new("orders", "customer_id", "INT64"),
            None,
        )
        .is_none());
    assert!(matcher
        .score(
            ColumnRef::new("orders", "customer_id", "INT64"),
            ColumnRef::new("orders", "id", "INT64"),
            None,
        )
        .is_none());
    assert!(matcher
        .score(
            ColumnRef::new("orders", "customer_id", "STRING"),
            ColumnRef::new("customers", "id", "INT64"),
            None,
        )
        .is_none());

    let source = ColumnRef::new("orders", "customer_id", "STRING");
    let target = ColumnRef::new("customers", "id", "INT64");
    assert!(!matcher.comparable(source, target));
    assert!(matcher.comparable(
        ColumnRef::new("orders", "amount", "NUMERIC"),
        ColumnRef::new("customers", "id", "INT64"),
    ));
}

/// Full value overlap can lift a pair with no naming link over the floor.
#[test]
fn test_overlap_rescues_unrelated_names() {
    let source = values(&["1", "2", "3"]);
    let target = values(&["1", "2", "3", "4"]);
    let candidate = ColumnMatcher::default()
        .score(
            ColumnRef::new("orders", "buyer", "INT64"),
            ColumnRef::new("customers", "id", "INT64"),
            Some(&SamplePair::new(&source, &target)),
        )
        .expect("overlap should rescue the pair");

    assert_close(candidate.confidence, 0.4);
    assert_eq!(
        candidate.evidence,
        vec![Evidence::TypeCompatible, Evidence::ValueOverlapSampled]
    );
}

/// Zero overlap lowers a well-named pair; full overlap raises it.
#[test]
fn test_overlap_moves_confidence_both_ways() {
    let matcher = ColumnMatcher::default();
    let source_ref = ColumnRef::new("orders", "customer_id", "INT64");
    let target_ref = ColumnRef::new("customers", "id", "INT64");

    let ids = values(&["1", "2", "3"]);
    let others = values(&["7", "8", "9"]);
    let disjoint = matcher
        .score(source_ref, target_ref, Some(&SamplePair::new(&ids, &others)))
        .unwrap();
    assert_close(disjoint.confidence, 0.64);
    assert!(!disjoint.evidence.contains(&Evidence::ValueOverlapSampled));

    let full = matcher
        .score(source_ref, target_ref, Some(&SamplePair::new(&ids, &ids)))
        .unwrap();
    assert_close(full.confidence, 0.94);
    assert!(full.evidence.contains(&Evidence::ValueOverlapSampled));
}

/// An empty sample leaves the overlap signal out instead of counting it as zero.
#[test]
fn test_empty_sample_is_unavailable() {
    let matcher = ColumnMatcher::default();
    let source_ref = ColumnRef::new("orders", "customer_id", "INT64");
    let target_ref = ColumnRef::new("customers", "id", "INT64");
    let ids = values(&["1", "2"]);
    let blanks = values(&["", "  "]);

    let without = matcher.score(source_ref, target_ref, None).unwrap();
    let empty = matcher
        .score(source_ref, target_ref, Some(&SamplePair::new(&ids, &blanks)))
        .unwrap();
    assert_eq!(without.confidence, empty.confidence);
}

/// Weights change the combination; the floor decides what is kept.
#[test]
fn test_custom_weights_and_floor() {
    let name_only = ColumnMatcher::new(
        SignalWeights {
            name: 1.0,
            type_compat: 0.0,
            overlap: 0.0,
        },
        0.3,
    );
    let candidate = name_only
        .score(
            ColumnRef::new("orders", "fk_customer_id", "INT64"),
            ColumnRef::new("customers", "id", "INT64"),
            None,
        )
        .unwrap();
    assert_close(candidate.confidence, 0.9);
    assert_eq!(
        candidate.evidence[0],
        Evidence::NamePattern("fk-prefix".to_string())
    );

    let strict = ColumnMatcher::new(SignalWeights::default(), 0.95);
    assert!(strict
        .score(
            ColumnRef::new("orders", "customer_id", "INT64"),
            ColumnRef::new("customers", "id", "INT64"),
            None,
        )
        .is_none());
}
