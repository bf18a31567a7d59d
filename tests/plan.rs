// tests/plan.rs
use anyhow::Result;
use tablestream::testing::*;
use tablestream::*;

// Buffer one table per side and plan the pair.
fn plan_for(a: Table, b: Table, on: &[&str]) -> Result<OutputPlan> {
    let mut store = BufferStore::new(Allocator::unlimited());
    let a_id = store.insert(Side::A, &a)?;
    let b_id = store.insert(Side::B, &b)?;
    let on: Vec<String> = on.iter().map(|s| (*s).to_string()).collect();
    let plan = OutputPlan::new(
        store.get(Side::A, a_id).unwrap(),
        store.get(Side::B, b_id).unwrap(),
        &on,
    )?;
    Ok(plan)
}

fn labels(plan: &OutputPlan) -> Vec<&str> {
    plan.columns().iter().map(|c| c.label.as_str()).collect()
}

#[test]
fn unkeyed_value_collision_renames() -> Result<()> {
    let a = series(&[1, 2], &[1.0, 2.0]);
    let b = series(&[1, 2], &[10.0, 20.0]);
    let plan = plan_for(a, b, &["_time"])?;

    assert!(plan.joinable());
    assert!(plan.key().is_empty());
    assert_eq!(labels(&plan), vec!["_time", "_value_a", "_value_b"]);
    assert!(plan.columns().iter().all(|c| !c.group));

    // Source map: the single `_time` column reads from the a side; the
    // renamed pair reads `_value` from its own side.
    let time = &plan.columns()[0];
    assert_eq!((time.side, time.source.as_str()), (Side::A, "_time"));
    let value_b = &plan.columns()[2];
    assert_eq!((value_b.side, value_b.source.as_str()), (Side::B, "_value"));
    Ok(())
}

#[test]
fn disjoint_keys_with_on_tag() -> Result<()> {
    // A grouped by t1, carrying t2 as data; B grouped by t2, carrying t1 as
    // data; join on [_time, t2].
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
    let plan = plan_for(a, b, &["_time", "t2"])?;

    assert!(plan.joinable());
    // t1 keys the a side but is a data column on the b side, so both are
    // kept under renamed labels; only the a side's joins the output key.
    // t2 is an `on` column keyed on the b side: a single group column.
    assert_eq!(
        labels(&plan),
        vec!["t1_a", "t2", "_time", "_value_a", "_value_b", "t1_b"]
    );
    assert_eq!(
        plan.key().value_of("t1_a"),
        Some(&Value::String("cpu".into()))
    );
    assert_eq!(plan.key().value_of("t2"), Some(&Value::String("x".into())));
    assert_eq!(plan.key().len(), 2);

    let t1_b = plan.columns().iter().find(|c| c.label == "t1_b").unwrap();
    assert!(!t1_b.group);
    assert_eq!((t1_b.side, t1_b.source.as_str()), (Side::B, "t1"));
    Ok(())
}

#[test]
fn conflicting_key_values_are_both_preserved() -> Result<()> {
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
    let plan = plan_for(a, b, &["_time"])?;

    assert!(plan.joinable());
    assert_eq!(
        labels(&plan),
        vec!["key_a", "key_b", "_time", "_value_a", "_value_b"]
    );
    assert_eq!(
        plan.key().value_of("key_a"),
        Some(&Value::String("foo".into()))
    );
    assert_eq!(plan.key().value_of("key_b"), Some(&Value::Null));
    Ok(())
}

#[test]
fn agreeing_key_values_collapse() -> Result<()> {
    let a = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1])
        .floats("_value", &[1.0])
        .build();
    let b = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1])
        .floats("_value", &[2.0])
        .build();
    let plan = plan_for(a, b, &["_time"])?;

    assert_eq!(labels(&plan), vec!["t1", "_time", "_value_a", "_value_b"]);
    let t1 = &plan.columns()[0];
    assert!(t1.group);
    // The b side's copy is never referenced: dropped silently.
    assert_eq!((t1.side, t1.source.as_str()), (Side::A, "t1"));
    assert_eq!(plan.key().len(), 1);
    Ok(())
}

#[test]
fn conflicting_on_key_values_are_not_joinable() -> Result<()> {
    let a = TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1])
        .build();
    let b = TestTableBuilder::new()
        .key("t1", Value::String("mem".into()))
        .times("_time", &[1])
        .build();
    let plan = plan_for(a, b, &["t1"])?;
    assert!(!plan.joinable());
    Ok(())
}

#[test]
fn missing_on_column_fails_precondition() {
    let a = series(&[1], &[1.0]);
    let b = TestTableBuilder::new().floats("_value", &[1.0]).build();
    let err = plan_for(a, b, &["_time"]).unwrap_err();
    let err = err.downcast::<EngineError>().unwrap();
    assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    assert!(err.labels.contains(&"_time".to_string()));
}

#[test]
fn mismatched_on_types_fail_precondition() {
    let a = series(&[1], &[1.0]);
    let b = TestTableBuilder::new()
        .ints("_time", &[1])
        .floats("_value", &[1.0])
        .build();
    let err = plan_for(a, b, &["_time"]).unwrap_err();
    let err = err.downcast::<EngineError>().unwrap();
    assert_eq!(err.kind, ErrorKind::FailedPrecondition);
}

#[test]
fn planning_is_deterministic() -> Result<()> {
    let make = || {
        (
            TestTableBuilder::new()
                .key("t1", Value::String("cpu".into()))
                .strings("host", &["srv1"])
                .times("_time", &[1])
                .floats("_value", &[1.0])
                .build(),
            TestTableBuilder::new()
                .key("host", Value::String("srv9".into()))
                .times("_time", &[1])
                .floats("_value", &[9.0])
                .build(),
        )
    };
    let (a1, b1) = make();
    let (a2, b2) = make();
    let first = plan_for(a1, b1, &["_time"])?;
    let second = plan_for(a2, b2, &["_time"])?;
    assert_eq!(first, second);
    assert_eq!(first.key().canonicalize(), second.key().canonicalize());
    Ok(())
}
