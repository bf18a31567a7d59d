//! Pre-built time-series tables for scenario tests.

use crate::table::Table;
use crate::testing::builders::TestTableBuilder;
use crate::values::Value;

/// Three CPU samples keyed by `t1="cpu"`: `_time` 1..=3, `_value` 1.0..=3.0.
#[must_use]
pub fn cpu_series() -> Table {
    TestTableBuilder::new()
        .key("t1", Value::String("cpu".into()))
        .times("_time", &[1, 2, 3])
        .floats("_value", &[1.0, 2.0, 3.0])
        .build()
}

/// Three memory samples keyed by `t1="mem"`: `_time` 1..=3, `_value`
/// 10.0..=30.0.
#[must_use]
pub fn mem_series() -> Table {
    TestTableBuilder::new()
        .key("t1", Value::String("mem".into()))
        .times("_time", &[1, 2, 3])
        .floats("_value", &[10.0, 20.0, 30.0])
        .build()
}

/// An unkeyed series with the given times and values.
///
/// # Panics
///
/// Panics when the slices have different lengths.
#[must_use]
pub fn series(times: &[i64], values: &[f64]) -> Table {
    TestTableBuilder::new()
        .times("_time", times)
        .floats("_value", values)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_have_expected_shape() {
        let cpu = cpu_series();
        assert_eq!(cpu.len(), 3);
        assert_eq!(cpu.columns().len(), 3);
        assert!(cpu.column("t1").is_some());

        let s = series(&[5, 6], &[0.5, 0.6]);
        assert_eq!(s.len(), 2);
        assert!(s.key().is_empty());
    }
}
