//! Fluent construction of group-keyed test tables.
//!
//! [`TestTableBuilder`] assembles a [`Table`] from typed column literals and
//! key entries. Key columns are materialized automatically: every key label
//! not already supplied as a data column becomes a constant column holding
//! the key's value, so built tables always satisfy the invariant that key
//! columns are constant across rows.

use crate::alloc::Allocator;
use crate::column::ColumnBuilder;
use crate::group_key::{GroupKey, KeyColumn};
use crate::table::Table;
use crate::values::{ColumnType, Value};

/// Builder for test tables.
///
/// # Example
///
/// ```
/// use tablestream::testing::TestTableBuilder;
/// use tablestream::Value;
///
/// let table = TestTableBuilder::new()
///     .key("t1", Value::String("cpu".into()))
///     .times("_time", &[1, 2, 3])
///     .floats("_value", &[1.0, 2.0, 3.0])
///     .build();
///
/// assert_eq!(table.len(), 3);
/// assert_eq!(table.columns().len(), 3); // t1 materialized from the key
/// ```
#[derive(Debug, Default)]
pub struct TestTableBuilder {
    key: Vec<KeyColumn>,
    columns: Vec<(String, ColumnType, Vec<Value>)>,
}

impl TestTableBuilder {
    /// Start an empty builder (empty group key, no columns).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group-key entry; the type is inferred from the value.
    ///
    /// # Panics
    ///
    /// Panics on `Value::Null` — use [`TestTableBuilder::key_null`] so the
    /// type stays known.
    #[must_use]
    pub fn key(mut self, label: &str, value: Value) -> Self {
        let typ = value
            .type_of()
            .expect("use key_null for null key values so the type stays known");
        self.key.push(KeyColumn {
            label: label.to_string(),
            typ,
            value,
        });
        self
    }

    /// Add a null-valued group-key entry of an explicit type.
    #[must_use]
    pub fn key_null(mut self, label: &str, typ: ColumnType) -> Self {
        self.key.push(KeyColumn {
            label: label.to_string(),
            typ,
            value: Value::Null,
        });
        self
    }

    /// Add an arbitrary column from `Value` literals (nulls allowed).
    ///
    /// # Panics
    ///
    /// Panics when a non-null value's type disagrees with `typ`.
    #[must_use]
    pub fn column(mut self, label: &str, typ: ColumnType, values: Vec<Value>) -> Self {
        for v in &values {
            if let Some(t) = v.type_of() {
                assert_eq!(t, typ, "value {v} does not fit a {typ} column {label}");
            }
        }
        self.columns.push((label.to_string(), typ, values));
        self
    }

    /// Add a time column.
    #[must_use]
    pub fn times(self, label: &str, values: &[i64]) -> Self {
        self.column(
            label,
            ColumnType::Time,
            values.iter().map(|&t| Value::Time(t)).collect(),
        )
    }

    /// Add a time column with null holes.
    #[must_use]
    pub fn times_opt(self, label: &str, values: &[Option<i64>]) -> Self {
        self.column(
            label,
            ColumnType::Time,
            values
                .iter()
                .map(|v| v.map_or(Value::Null, Value::Time))
                .collect(),
        )
    }

    /// Add an int column.
    #[must_use]
    pub fn ints(self, label: &str, values: &[i64]) -> Self {
        self.column(
            label,
            ColumnType::Int,
            values.iter().map(|&i| Value::Int(i)).collect(),
        )
    }

    /// Add a uint column.
    #[must_use]
    pub fn uints(self, label: &str, values: &[u64]) -> Self {
        self.column(
            label,
            ColumnType::UInt,
            values.iter().map(|&u| Value::UInt(u)).collect(),
        )
    }

    /// Add a float column.
    #[must_use]
    pub fn floats(self, label: &str, values: &[f64]) -> Self {
        self.column(
            label,
            ColumnType::Float,
            values.iter().map(|&x| Value::Float(x)).collect(),
        )
    }

    /// Add a float column with null holes.
    #[must_use]
    pub fn floats_opt(self, label: &str, values: &[Option<f64>]) -> Self {
        self.column(
            label,
            ColumnType::Float,
            values
                .iter()
                .map(|v| v.map_or(Value::Null, Value::Float))
                .collect(),
        )
    }

    /// Add a bool column.
    #[must_use]
    pub fn bools(self, label: &str, values: &[bool]) -> Self {
        self.column(
            label,
            ColumnType::Bool,
            values.iter().map(|&b| Value::Bool(b)).collect(),
        )
    }

    /// Add a string column.
    #[must_use]
    pub fn strings(self, label: &str, values: &[&str]) -> Self {
        self.column(
            label,
            ColumnType::String,
            values
                .iter()
                .map(|s| Value::String((*s).to_string()))
                .collect(),
        )
    }

    /// Assemble the table.
    ///
    /// # Panics
    ///
    /// Panics when column lengths disagree or the table fails validation.
    #[must_use]
    pub fn build(self) -> Table {
        let alloc = Allocator::unlimited();
        let rows = self.columns.first().map_or(0, |(_, _, v)| v.len());
        for (label, _, values) in &self.columns {
            assert_eq!(
                values.len(),
                rows,
                "column {label} has {} rows, expected {rows}",
                values.len()
            );
        }

        let mut columns = Vec::new();
        // Key columns first, materialized as constants.
        for kc in &self.key {
            if self.columns.iter().any(|(label, _, _)| label == &kc.label) {
                continue;
            }
            let mut b = ColumnBuilder::new(&kc.label, kc.typ, alloc.clone());
            for _ in 0..rows {
                b.push_value(&kc.value).expect("push key value");
            }
            columns.push(b.finish());
        }
        for (label, typ, values) in &self.columns {
            let mut b = ColumnBuilder::new(label, *typ, alloc.clone());
            for v in values {
                b.push_value(v).expect("push column value");
            }
            columns.push(b.finish());
        }

        let key = GroupKey::new(self.key).expect("valid group key");
        Table::new(key, columns).expect("valid table")
    }
}
