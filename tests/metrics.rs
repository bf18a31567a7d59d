// tests/metrics.rs
#![cfg(feature = "metrics")]

use anyhow::Result;
use tablestream::metrics::{JoinMetrics, MetricsSnapshot};
use tablestream::testing::*;
use tablestream::*;

const LEFT: DatasetId = DatasetId::new(1);
const RIGHT: DatasetId = DatasetId::new(2);

fn joined_with_metrics() -> Result<JoinMetrics> {
    let spec = JoinSpec::new(["_time"], JoinMethod::Inner, LEFT, RIGHT)?;
    let mut join = JoinTransformation::new(spec, RecordingSink::new(), Allocator::unlimited());
    let metrics = JoinMetrics::new();
    join.set_metrics(metrics.clone());

    let a = TestTableBuilder::new()
        .times_opt("_time", &[Some(1), Some(2), None])
        .floats("_value", &[1.0, 2.0, 3.0])
        .build();
    let b = series(&[1, 2, 3], &[10.0, 20.0, 30.0]);
    join.process(LEFT, a)?;
    join.process(RIGHT, b)?;
    join.finish(LEFT, None);
    join.finish(RIGHT, None);
    Ok(metrics)
}

#[test]
fn executor_counters() -> Result<()> {
    let metrics = joined_with_metrics()?;

    assert_eq!(metrics.tables_buffered(), 2);
    assert_eq!(metrics.rows_buffered(), 6);
    // One null on the a side; t=3 on the b side probes fine but misses.
    assert_eq!(metrics.dropped_null_on(), 1);
    assert_eq!(metrics.bucket_pairs_joined(), 1);
    assert_eq!(metrics.rows_emitted(), 2);
    assert_eq!(metrics.tables_emitted(), 1);
    Ok(())
}

#[test]
fn snapshot_copies_every_counter() -> Result<()> {
    let metrics = joined_with_metrics()?;
    let snap = metrics.snapshot();

    assert_eq!(
        snap,
        MetricsSnapshot {
            tables_buffered: 2,
            rows_buffered: 6,
            rows_dropped_null_on: 1,
            bucket_pairs_joined: 1,
            rows_emitted: 2,
            tables_emitted: 1,
            execution_time_ms: None,
        }
    );
    Ok(())
}

#[test]
fn clones_share_counters() {
    let metrics = JoinMetrics::new();
    let shared = metrics.clone();
    metrics.table_buffered(5);
    metrics.pair_joined(3);
    metrics.table_emitted();

    assert_eq!(shared.tables_buffered(), 1);
    assert_eq!(shared.rows_buffered(), 5);
    assert_eq!(shared.bucket_pairs_joined(), 1);
    assert_eq!(shared.rows_emitted(), 3);
    assert_eq!(shared.tables_emitted(), 1);
}

#[test]
fn selectivity_is_output_per_input_row() {
    let metrics = JoinMetrics::new();
    assert_eq!(metrics.selectivity(), None);

    metrics.table_buffered(4);
    metrics.pair_joined(2);
    assert_eq!(metrics.selectivity(), Some(0.5));
}

#[test]
fn elapsed_requires_both_marks() {
    let metrics = JoinMetrics::new();
    assert!(metrics.elapsed().is_none());
    metrics.record_start();
    assert!(metrics.elapsed().is_none());
    metrics.record_end();
    assert!(metrics.elapsed().is_some());
    assert!(metrics.snapshot().execution_time_ms.is_some());
}

#[test]
fn save_to_file_round_trips() -> Result<()> {
    let metrics = joined_with_metrics()?;
    metrics.record_start();
    metrics.record_end();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("metrics.json");
    metrics.save_to_file(&path)?;

    let raw = std::fs::read_to_string(&path)?;
    let parsed: MetricsSnapshot = serde_json::from_str(&raw)?;
    assert_eq!(parsed.rows_emitted, 2);
    assert_eq!(parsed.rows_dropped_null_on, 1);
    assert!(parsed.execution_time_ms.is_some());
    Ok(())
}
