// tests/join.rs
use anyhow::Result;
use tablestream::testing::*;
use tablestream::*;

const LEFT: DatasetId = DatasetId::new(1);
const RIGHT: DatasetId = DatasetId::new(2);

fn inner_spec(on: &[&str]) -> JoinSpec {
    JoinSpec::new(on.iter().copied(), JoinMethod::Inner, LEFT, RIGHT).expect("valid spec")
}

fn run_join(on: &[&str], a_tables: Vec<Table>, b_tables: Vec<Table>) -> Result<RecordingSink> {
    run_join_opts(on, a_tables, b_tables, JoinOptions::default())
}

fn run_join_opts(
    on: &[&str],
    a_tables: Vec<Table>,
    b_tables: Vec<Table>,
    options: JoinOptions,
) -> Result<RecordingSink> {
    let mut join = JoinTransformation::with_options(
        inner_spec(on),
        RecordingSink::new(),
        Allocator::unlimited(),
        options,
    );
    for t in a_tables {
        join.process(LEFT, t)?;
    }
    for t in b_tables {
        join.process(RIGHT, t)?;
    }
    join.finish(LEFT, None);
    join.finish(RIGHT, None);
    Ok(join.into_downstream())
}

#[test]
fn simple_inner_on_time() -> Result<()> {
    let a = series(&[1, 2, 3], &[1.0, 2.0, 3.0]);
    let b = series(&[1, 2, 3], &[10.0, 20.0, 30.0]);
    let sink = run_join(&["_time"], vec![a], vec![b])?;

    assert!(sink.finished());
    assert!(sink.error().is_none());
    assert_eq!(sink.tables().len(), 1);

    let expected = TestTableBuilder::new()
        .times("_time", &[1, 2, 3])
        .floats("_value_a", &[1.0, 2.0, 3.0])
        .floats("_value_b", &[10.0, 20.0, 30.0])
        .build();
    assert_tables_equal(&sink.tables()[0], &expected);
    Ok(())
}

#[test]
fn unsorted_inputs_preserve_a_arrival_order() -> Result<()> {
    let a = series(&[2, 1, 3], &[1.0, 2.0, 3.0]);
    let b = series(&[3, 2, 1], &[10.0, 30.0, 20.0]);
    let sink = run_join(&["_time"], vec![a], vec![b])?;

    let expected = TestTableBuilder::new()
        .times("_time", &[2, 1, 3])
        .floats("_value_a", &[1.0, 2.0, 3.0])
        .floats("_value_b", &[30.0, 20.0, 10.0])
        .build();
    assert_tables_equal(&sink.tables()[0], &expected);
    Ok(())
}

#[test]
fn null_join_values_never_match() -> Result<()> {
    let a = TestTableBuilder::new()
        .times_opt("_time", &[Some(1), None, Some(2)])
        .floats("_value", &[1.0, 100.0, 2.0])
        .build();
    let b = TestTableBuilder::new()
        .times_opt("_time", &[Some(1), None, Some(2)])
        .floats("_value", &[10.0, 300.0, 20.0])
        .build();
    let sink = run_join(&["_time"], vec![a], vec![b])?;

    let expected = TestTableBuilder::new()
        .times("_time", &[1, 2])
        .floats("_value_a", &[1.0, 2.0])
        .floats("_value_b", &[10.0, 20.0])
        .build();
    assert_tables_equal(&sink.tables()[0], &expected);
    // Null rejection, checked on the raw output as well.
    assert_all_rows(&sink.tables()[0], |cells| {
        cells
            .iter()
            .all(|(label, value)| label != "_time" || !value.is_null())
    });
    Ok(())
}

#[test]
fn multiple_matches_emit_the_cartesian_product() -> Result<()> {
    let a = series(&[1], &[1.0]);
    let b = series(&[1, 1], &[10.0, 10.1]);
    let sink = run_join(&["_time"], vec![a], vec![b])?;

    let expected = TestTableBuilder::new()
        .times("_time", &[1, 1])
        .floats("_value_a", &[1.0, 1.0])
        .floats("_value_b", &[10.0, 10.1])
        .build();
    assert_tables_equal(&sink.tables()[0], &expected);
    Ok(())
}

#[test]
fn inner_join_cardinality() -> Result<()> {
    // on-tuples: a has 2x t=1, 1x t=2; b has 3x t=1, 1x t=2, 1x t=9.
    let a = series(&[1, 1, 2], &[1.0, 2.0, 3.0]);
    let b = series(&[1, 1, 1, 2, 9], &[0.1, 0.2, 0.3, 0.4, 0.5]);
    let sink = run_join(&["_time"], vec![a], vec![b])?;

    // 2*3 + 1*1 = 7 rows, a-major then b order.
    let out = &sink.tables()[0];
    assert_eq!(out.len(), 7);
    let times: Vec<Value> = (0..out.len())
        .map(|r| out.value("_time", r).unwrap())
        .collect();
    assert_eq!(
        times,
        vec![
            Value::Time(1),
            Value::Time(1),
            Value::Time(1),
            Value::Time(1),
            Value::Time(1),
            Value::Time(1),
            Value::Time(2),
        ]
    );
    let values_a: Vec<Value> = (0..out.len())
        .map(|r| out.value("_value_a", r).unwrap())
        .collect();
    assert_eq!(
        values_a,
        vec![
            Value::Float(1.0),
            Value::Float(1.0),
            Value::Float(1.0),
            Value::Float(2.0),
            Value::Float(2.0),
            Value::Float(2.0),
            Value::Float(3.0),
        ]
    );
    Ok(())
}

#[test]
fn disjoint_group_keys_regroup_output() -> Result<()> {
    let a = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .strings("t2", &["x", "x"])
        .times("_time", &[1, 2])
        .floats("_value", &[1.0, 2.0])
        .build();
    let b = TestTableBuilder::new()
        .key("t2", Value::String("x".into()))
        .strings("t1", &["srv1", "srv2"])
        .times("_time", &[1, 2])
        .floats("_value", &[10.0, 20.0])
        .build();
    let sink = run_join(&["_time", "t2"], vec![a], vec![b])?;

    let expected = TestTableBuilder::new()
        .key("t1_a", Value::String("cpu".into()))
        .key("t2", Value::String("x".into()))
        .times("_time", &[1, 2])
        .floats("_value_a", &[1.0, 2.0])
        .floats("_value_b", &[10.0, 20.0])
        .strings("t1_b", &["srv1", "srv2"])
        .build();
    assert_output_equal(sink.tables(), &[expected]);
    Ok(())
}

#[test]
fn null_valued_keys_are_preserved_in_the_output_key() -> Result<()> {
    let a = TestTableBuilder::new()
        .key("key", Value::String("foo".into()))
        .times("_time", &[1])
        .floats("_value", &[1.0])
        .build();
    let b = TestTableBuilder::new()
        .key_null("key", ColumnType::String)
        .times("_time", &[1])
        .floats("_value", &[2.0])
        .build();
    let sink = run_join(&["_time"], vec![a], vec![b])?;

    let expected = TestTableBuilder::new()
        .key("key_a", Value::String("foo".into()))
        .key_null("key_b", ColumnType::String)
        .times("_time", &[1])
        .floats("_value_a", &[1.0])
        .floats("_value_b", &[2.0])
        .build();
    assert_output_equal(sink.tables(), &[expected]);
    Ok(())
}

#[test]
fn key_constancy_across_buckets() -> Result<()> {
    // Two buckets on the a side, one on the b side; t1 is not part of the
    // predicate, so the (mem, cpu) pair still joins with both keys kept.
    let a_cpu = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1, 2])
        .floats("_value", &[1.0, 2.0])
        .build();
    let a_mem = TestTableBuilder::new()
        .key("t1", Value::String("mem".into()))
        .times("_time", &[1])
        .floats("_value", &[7.0])
        .build();
    let b_cpu = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1, 2])
        .floats("_value", &[10.0, 20.0])
        .build();
    let sink = run_join(&["_time"], vec![a_cpu, a_mem], vec![b_cpu])?;

    let merged = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1, 2])
        .floats("_value_a", &[1.0, 2.0])
        .floats("_value_b", &[10.0, 20.0])
        .build();
    let regrouped = TestTableBuilder::new()
        .key("t1_a", Value::String("mem".into()))
        .key("t1_b", Value::String("cpu".into()))
        .times("_time", &[1])
        .floats("_value_a", &[7.0])
        .floats("_value_b", &[10.0])
        .build();
    assert_output_equal(sink.tables(), &[merged, regrouped]);

    // Every output row's key columns equal the table's key values.
    for table in sink.tables() {
        for kc in table.key().columns().to_vec() {
            assert_all_rows(table, |cells| {
                cells
                    .iter()
                    .any(|(label, value)| *label == kc.label && *value == kc.value)
            });
        }
    }
    Ok(())
}

#[test]
fn collision_renaming_commutes_with_swapped_inputs() -> Result<()> {
    let a = series(&[1, 2, 4], &[1.0, 2.0, 4.0]);
    let b = series(&[1, 2, 3], &[10.0, 20.0, 30.0]);

    let forward = run_join(&["_time"], vec![a.clone()], vec![b.clone()])?;
    let backward = run_join(&["_time"], vec![b], vec![a])?;

    // Swapping the inputs maps _a <-> _b and keeps the same row multiset.
    let forward_rows = table_rows(&forward.tables()[0]);
    let swapped: Vec<Vec<Value>> = table_rows(&backward.tables()[0])
        .into_iter()
        .map(|row| vec![row[0].clone(), row[2].clone(), row[1].clone()])
        .collect();
    let mut forward_sorted = forward_rows;
    let mut swapped_sorted = swapped;
    forward_sorted.sort_by_key(|r| format!("{r:?}"));
    swapped_sorted.sort_by_key(|r| format!("{r:?}"));
    assert_eq!(forward_sorted, swapped_sorted);
    Ok(())
}

#[test]
fn join_is_idempotent() -> Result<()> {
    let a = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1, 2, 3])
        .floats("_value", &[1.0, 2.0, 3.0])
        .build();
    let b = series(&[2, 3], &[20.0, 30.0]);

    let first = run_join(&["_time"], vec![a.clone()], vec![b.clone()])?;
    let second = run_join(&["_time"], vec![a], vec![b])?;
    assert_output_equal(first.tables(), second.tables());
    Ok(())
}

#[test]
fn tables_interleave_in_any_order() -> Result<()> {
    // Deliver b first, then a split across two tables of the same key.
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    join.process(RIGHT, series(&[1, 2, 3], &[10.0, 20.0, 30.0]))?;
    join.process(LEFT, series(&[2], &[2.0]))?;
    join.process(LEFT, series(&[1, 3], &[1.0, 3.0]))?;
    join.finish(RIGHT, None);
    assert!(!join.downstream().finished());
    join.finish(LEFT, None);

    let sink = join.into_downstream();
    let expected = TestTableBuilder::new()
        .times("_time", &[2, 1, 3])
        .floats("_value_a", &[2.0, 1.0, 3.0])
        .floats("_value_b", &[20.0, 10.0, 30.0])
        .build();
    assert_tables_equal(&sink.tables()[0], &expected);
    Ok(())
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_matching_equals_sequential() -> Result<()> {
    let mk_a = || {
        vec![
            TestTableBuilder::new()
                .key("t1", Value::String("cpu".into()))
                .times("_time", &[1, 2])
                .floats("_value", &[1.0, 2.0])
                .build(),
            TestTableBuilder::new()
                .key("t1", Value::String("mem".into()))
                .times("_time", &[1, 2])
                .floats("_value", &[5.0, 6.0])
                .build(),
        ]
    };
    let mk_b = || {
        vec![
            TestTableBuilder::new()
                .key("t1", Value::String("cpu".into()))
                .times("_time", &[2, 1])
                .floats("_value", &[20.0, 10.0])
                .build(),
            TestTableBuilder::new()
                .key("t1", Value::String("disk".into()))
                .times("_time", &[1])
                .floats("_value", &[40.0])
                .build(),
        ]
    };

    let seq = run_join(&["_time"], mk_a(), mk_b())?;
    let par = run_join_opts(
        &["_time"],
        mk_a(),
        mk_b(),
        JoinOptions {
            match_mode: MatchMode::Parallel { threads: Some(2) },
        },
    )?;

    assert_eq!(seq.tables().len(), par.tables().len());
    for (s, p) in seq.tables().iter().zip(par.tables().iter()) {
        assert_tables_equal(p, s);
    }
    Ok(())
}

// ===== Specification and arrival validation =========================

#[test]
fn empty_on_is_invalid() {
    let err = JoinSpec::new(Vec::<String>::new(), JoinMethod::Inner, LEFT, RIGHT).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
}

#[test]
fn duplicate_on_label_is_invalid() {
    let err = JoinSpec::new(["_time", "_time"], JoinMethod::Inner, LEFT, RIGHT).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
}

#[test]
fn identical_parents_are_invalid() {
    let err = JoinSpec::new(["_time"], JoinMethod::Inner, LEFT, LEFT).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
}

#[test]
fn unknown_method_is_invalid() {
    assert_eq!(JoinMethod::parse("inner").unwrap(), JoinMethod::Inner);
    for bad in ["outer", "left", "right", "full", "cross", ""] {
        let err = JoinMethod::parse(bad).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Invalid);
    }
}

#[test]
fn unknown_parent_is_invalid() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    let err = join
        .process(DatasetId::new(99), series(&[1], &[1.0]))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
    let err = join.update_watermark(DatasetId::new(99), 10).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
    Ok(())
}

#[test]
fn missing_on_column_at_arrival_is_invalid() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    let no_time = TestTableBuilder::new().floats("_value", &[1.0]).build();
    let err = join.process(LEFT, no_time).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
    assert!(err.labels.contains(&"_time".to_string()));

    // The failure is fatal: it rides the downstream finish signal.
    join.finish(LEFT, None);
    let sink = join.into_downstream();
    assert!(sink.finished());
    assert_eq!(sink.error().unwrap().kind, ErrorKind::Invalid);
    assert!(sink.tables().is_empty());
    Ok(())
}

#[test]
fn on_type_drift_between_arrivals_is_invalid() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    join.process(LEFT, series(&[1], &[1.0]))?;

    let retyped = TestTableBuilder::new()
        .ints("_time", &[1])
        .floats("_value", &[2.0])
        .build();
    let err = join.process(RIGHT, retyped).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Invalid);
    Ok(())
}

#[test]
fn conflicting_bucket_schema_is_failed_precondition() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    join.process(LEFT, series(&[1], &[1.0]))?;

    let widened = TestTableBuilder::new()
        .times("_time", &[2])
        .floats("_value", &[2.0])
        .strings("host", &["srv1"])
        .build();
    let err = join.process(LEFT, widened).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    Ok(())
}

#[test]
fn retraction_is_unimplemented() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    let err = join.retract_table(LEFT, &GroupKey::empty()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unimplemented);
    Ok(())
}

// ===== Lifecycle, errors, and resources =============================

#[test]
fn parent_error_short_circuits_matching() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    join.process(LEFT, series(&[1, 2], &[1.0, 2.0]))?;
    join.process(RIGHT, series(&[1, 2], &[10.0, 20.0]))?;

    join.finish(LEFT, Some(EngineError::internal("upstream blew up")));
    // The error is forwarded immediately, without waiting for the b side.
    assert!(join.downstream().finished());
    assert_eq!(
        join.downstream().error().unwrap().kind,
        ErrorKind::Internal
    );
    assert!(join.downstream().tables().is_empty());

    // Late events are ignored.
    join.process(RIGHT, series(&[3], &[30.0]))?;
    join.finish(RIGHT, None);
    assert!(join.downstream().tables().is_empty());
    Ok(())
}

#[test]
fn cancellation_releases_everything_and_emits_nothing() -> Result<()> {
    let alloc = Allocator::with_budget(1 << 20);
    let mut join =
        JoinTransformation::new(inner_spec(&["_time"]), RecordingSink::new(), alloc.clone());
    join.process(LEFT, series(&[1, 2, 3], &[1.0, 2.0, 3.0]))?;
    join.process(RIGHT, series(&[1, 2, 3], &[10.0, 20.0, 30.0]))?;
    assert!(alloc.allocated() > 0);

    join.cancel();
    assert_eq!(alloc.allocated(), 0);

    // Finishes after cancellation do nothing.
    join.finish(LEFT, None);
    join.finish(RIGHT, None);
    let sink = join.into_downstream();
    assert!(sink.tables().is_empty());
    assert!(!sink.finished());
    Ok(())
}

#[test]
fn buffers_are_released_after_matching() -> Result<()> {
    let alloc = Allocator::with_budget(1 << 20);
    let mut join =
        JoinTransformation::new(inner_spec(&["_time"]), RecordingSink::new(), alloc.clone());
    join.process(LEFT, series(&[1, 2], &[1.0, 2.0]))?;
    join.process(RIGHT, series(&[1, 2], &[10.0, 20.0]))?;
    join.finish(LEFT, None);
    join.finish(RIGHT, None);

    // Output tables were handed off; nothing stays on the engine's budget.
    assert_eq!(alloc.allocated(), 0);
    assert_eq!(join.buffered(Side::A), 0);
    assert_eq!(join.buffered(Side::B), 0);
    assert_eq!(join.downstream().tables().len(), 1);
    Ok(())
}

#[test]
fn allocator_exhaustion_is_fatal() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::with_budget(16),
    );
    let err = join
        .process(LEFT, series(&[1, 2, 3, 4], &[1.0, 2.0, 3.0, 4.0]))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResourceExhausted);

    join.finish(LEFT, None);
    let sink = join.into_downstream();
    assert!(sink.finished());
    assert_eq!(sink.error().unwrap().kind, ErrorKind::ResourceExhausted);
    Ok(())
}

#[test]
fn downstream_rejection_rides_the_finish_signal() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        FailingSink::new(0),
        Allocator::unlimited(),
    );
    join.process(LEFT, series(&[1], &[1.0]))?;
    join.process(RIGHT, series(&[1], &[10.0]))?;
    join.finish(LEFT, None);
    join.finish(RIGHT, None);

    let sink = join.into_downstream();
    assert!(sink.finished());
    assert_eq!(sink.error().unwrap().kind, ErrorKind::Internal);
    assert_eq!(sink.received(), 0);
    Ok(())
}

#[test]
fn watermarks_are_recorded_not_acted_on() -> Result<()> {
    let mut join = JoinTransformation::new(
        inner_spec(&["_time"]),
        RecordingSink::new(),
        Allocator::unlimited(),
    );
    assert_eq!(join.watermark(Side::A), None);

    join.update_watermark(LEFT, 10)?;
    join.update_watermark(LEFT, 5)?;
    join.update_watermark(RIGHT, 7)?;
    join.update_processing_time(LEFT, 100)?;

    assert_eq!(join.watermark(Side::A), Some(10));
    assert_eq!(join.watermark(Side::B), Some(7));
    assert_eq!(join.processing_time(Side::A), Some(100));
    assert_eq!(join.processing_time(Side::B), None);
    // No matching was driven by any of this.
    assert!(join.downstream().tables().is_empty());
    assert!(!join.downstream().finished());
    Ok(())
}

#[test]
fn non_joinable_buckets_emit_nothing() -> Result<()> {
    // Both sides keyed on the predicate column with different constants.
    let a = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1])
        .build();
    let b = TestTableBuilder::new()
        .key("t1", Value::String("mem".into()))
        .times("_time", &[1])
        .build();
    let sink = run_join(&["t1"], vec![a], vec![b])?;
    assert!(sink.finished());
    assert!(sink.tables().is_empty());
    Ok(())
}

#[test]
fn empty_intersection_emits_nothing() -> Result<()> {
    let a = series(&[1, 2], &[1.0, 2.0]);
    let b = series(&[3, 4], &[30.0, 40.0]);
    let sink = run_join(&["_time"], vec![a], vec![b])?;
    assert!(sink.finished());
    assert!(sink.error().is_none());
    assert!(sink.tables().is_empty());
    Ok(())
}
