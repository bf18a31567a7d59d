//! Assertion functions for testing join outputs.
//!
//! This module provides specialized assertion functions for comparing
//! emitted tables with expected results, with panic messages that dump both
//! sides when they differ.

use crate::table::Table;
use crate::values::Value;
use std::collections::HashMap;

/// Flatten a table into row-major cells, in the table's column order.
#[must_use]
pub fn table_rows(table: &Table) -> Vec<Vec<Value>> {
    (0..table.len())
        .map(|row| table.columns().iter().map(|c| c.value(row)).collect())
        .collect()
}

/// Assert that two tables are equal: same group key, same schema in the same
/// column order, and identical rows in identical order.
///
/// # Panics
///
/// Panics with a detailed message on any difference.
pub fn assert_tables_equal(actual: &Table, expected: &Table) {
    assert_eq!(
        actual.key(),
        expected.key(),
        "Group key mismatch:\n  Expected: {}\n  Actual: {}",
        expected.key(),
        actual.key()
    );
    assert_eq!(
        actual.schema(),
        expected.schema(),
        "Schema mismatch for key {}:\n  Expected: {:?}\n  Actual: {:?}",
        expected.key(),
        expected.schema(),
        actual.schema()
    );
    let actual_rows = table_rows(actual);
    let expected_rows = table_rows(expected);
    assert_eq!(
        actual_rows.len(),
        expected_rows.len(),
        "Row count mismatch for key {}:\n  Expected: {}\n  Actual: {}\n  Expected rows: {expected_rows:?}\n  Actual rows: {actual_rows:?}",
        expected.key(),
        expected_rows.len(),
        actual_rows.len()
    );
    for (i, (a, e)) in actual_rows.iter().zip(expected_rows.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Row mismatch at index {i} for key {}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected_rows:?}\n  Full actual: {actual_rows:?}",
            expected.key()
        );
    }
}

/// Assert that two tables hold the same multiset of rows, ignoring row
/// order. Group key and schema are still compared exactly.
///
/// # Panics
///
/// Panics with a detailed message on any difference.
pub fn assert_tables_unordered_equal(actual: &Table, expected: &Table) {
    assert_eq!(
        actual.key(),
        expected.key(),
        "Group key mismatch:\n  Expected: {}\n  Actual: {}",
        expected.key(),
        actual.key()
    );
    assert_eq!(
        actual.schema(),
        expected.schema(),
        "Schema mismatch for key {}:\n  Expected: {:?}\n  Actual: {:?}",
        expected.key(),
        expected.schema(),
        actual.schema()
    );
    let actual_rows = table_rows(actual);
    let expected_rows = table_rows(expected);

    let mut counts: HashMap<Vec<Value>, i64> = HashMap::new();
    for row in &actual_rows {
        *counts.entry(row.clone()).or_default() += 1;
    }
    for row in &expected_rows {
        *counts.entry(row.clone()).or_default() -= 1;
    }
    if counts.values().any(|&c| c != 0) {
        let missing: Vec<_> = counts.iter().filter(|&(_, &c)| c < 0).collect();
        let extra: Vec<_> = counts.iter().filter(|&(_, &c)| c > 0).collect();
        panic!(
            "Row multiset mismatch for key {}:\n  Missing rows: {missing:?}\n  Extra rows: {extra:?}\n  Expected: {expected_rows:?}\n  Actual: {actual_rows:?}",
            expected.key()
        );
    }
}

/// Assert that two output sets contain the same tables, matched by group
/// key. Table order across the set is ignored; rows within each table are
/// compared in order.
///
/// # Panics
///
/// Panics when a key is missing, duplicated, or its tables differ.
pub fn assert_output_equal(actual: &[Table], expected: &[Table]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Output table count mismatch:\n  Expected keys: {:?}\n  Actual keys: {:?}",
        expected.iter().map(|t| t.key().to_string()).collect::<Vec<_>>(),
        actual.iter().map(|t| t.key().to_string()).collect::<Vec<_>>()
    );
    for exp in expected {
        let matches: Vec<&Table> = actual.iter().filter(|t| t.key() == exp.key()).collect();
        assert_eq!(
            matches.len(),
            1,
            "Expected exactly one output table for key {}, found {}",
            exp.key(),
            matches.len()
        );
        assert_tables_equal(matches[0], exp);
    }
}

/// Assert that every row of a table satisfies a predicate over its cells
/// (label, value).
///
/// # Panics
///
/// Panics on the first violating row.
pub fn assert_all_rows<F>(table: &Table, mut predicate: F)
where
    F: FnMut(&[(String, Value)]) -> bool,
{
    for row in 0..table.len() {
        let cells: Vec<(String, Value)> = table
            .columns()
            .iter()
            .map(|c| (c.label().to_string(), c.value(row)))
            .collect();
        assert!(
            predicate(&cells),
            "Row {row} of table {} violates predicate: {cells:?}",
            table.key()
        );
    }
}
