//! Immutable columnar tables and the builder that assembles them.
//!
//! A [`Table`] is an ordered set of equal-length [`Column`]s together with a
//! [`GroupKey`]; the key's columns are materialized in the table, constant
//! across every row. Tables are immutable once built — downstream consumers
//! own the tables handed to them and the engine never touches them again.

use crate::alloc::Allocator;
use crate::column::{Column, ColumnBuilder};
use crate::errors::{EngineError, Result};
use crate::group_key::GroupKey;
use crate::values::{ColumnType, Value};
use serde::{Deserialize, Serialize};

/// Label and type of one column, without its data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// The column label.
    pub label: String,
    /// The column type.
    pub typ: ColumnType,
}

impl ColumnMeta {
    /// Construct a column descriptor.
    pub fn new(label: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            label: label.into(),
            typ,
        }
    }
}

/// Sort a schema by label so schemas can be compared across column orders.
#[must_use]
pub fn normalized_schema(mut schema: Vec<ColumnMeta>) -> Vec<ColumnMeta> {
    schema.sort_by(|a, b| a.label.cmp(&b.label));
    schema
}

/// An immutable group-keyed columnar table.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    key: GroupKey,
    columns: Vec<Column>,
}

impl Table {
    /// Assemble a table from a key and columns.
    ///
    /// # Errors
    ///
    /// `Invalid` when columns have unequal lengths, carry duplicate labels,
    /// or when a key column is missing from the columns (or present with the
    /// wrong type).
    pub fn new(key: GroupKey, columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            for col in &columns[1..] {
                if col.len() != first.len() {
                    return Err(EngineError::invalid(format!(
                        "column lengths differ: {} has {} rows, {} has {}",
                        first.label(),
                        first.len(),
                        col.label(),
                        col.len()
                    ))
                    .with_key(&key));
                }
            }
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.label() == col.label()) {
                return Err(EngineError::invalid("duplicate column label in table")
                    .with_label(col.label())
                    .with_key(&key));
            }
        }
        for kc in key.columns() {
            match columns.iter().find(|c| c.label() == kc.label) {
                None => {
                    return Err(EngineError::invalid("group key column missing from table")
                        .with_label(&kc.label)
                        .with_key(&key));
                }
                Some(col) if col.column_type() != kc.typ => {
                    return Err(EngineError::invalid(format!(
                        "group key column has type {} in key but {} in table",
                        kc.typ,
                        col.column_type()
                    ))
                    .with_label(&kc.label)
                    .with_key(&key));
                }
                Some(_) => {}
            }
        }
        Ok(Self { key, columns })
    }

    /// The table's group key.
    #[must_use]
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// All columns in schema order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by label.
    #[must_use]
    pub fn column(&self, label: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.label() == label)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// True when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The table's schema in column order.
    #[must_use]
    pub fn schema(&self) -> Vec<ColumnMeta> {
        self.columns
            .iter()
            .map(|c| ColumnMeta::new(c.label(), c.column_type()))
            .collect()
    }

    /// Read one cell by label and row.
    #[must_use]
    pub fn value(&self, label: &str, row: usize) -> Option<Value> {
        self.column(label).map(|c| c.value(row))
    }
}

/// Builds a table column by column, against an allocator budget.
///
/// The join executor appends output rows cell by cell through
/// [`TableBuilder::column_mut`]; [`TableBuilder::finish`] seals the result
/// and releases the builder's bytes from the budget (the finished table is
/// owned by its receiver).
#[derive(Debug)]
pub struct TableBuilder {
    key: GroupKey,
    builders: Vec<ColumnBuilder>,
}

impl TableBuilder {
    /// Start a table with the given key and column schema.
    pub fn new(key: GroupKey, schema: &[ColumnMeta], alloc: &Allocator) -> Self {
        let builders = schema
            .iter()
            .map(|m| ColumnBuilder::new(&m.label, m.typ, alloc.clone()))
            .collect();
        Self { key, builders }
    }

    /// The key the finished table will carry.
    #[must_use]
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// The schema in column order.
    #[must_use]
    pub fn schema(&self) -> Vec<ColumnMeta> {
        self.builders
            .iter()
            .map(|b| ColumnMeta::new(b.label(), b.column_type()))
            .collect()
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.builders.len()
    }

    /// Rows appended so far (by the first column).
    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.first().map_or(0, ColumnBuilder::len)
    }

    /// True when no rows have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutable access to the column builder at `idx`.
    pub fn column_mut(&mut self, idx: usize) -> &mut ColumnBuilder {
        &mut self.builders[idx]
    }

    /// Pre-reserve capacity for `additional` rows in every column.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the allocator budget would be exceeded.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        for b in &mut self.builders {
            b.reserve(additional)?;
        }
        Ok(())
    }

    /// Seal all columns into an immutable [`Table`].
    ///
    /// # Errors
    ///
    /// `Internal` when the columns ended up with unequal lengths.
    pub fn finish(self) -> Result<Table> {
        let rows = self.len();
        let mut columns = Vec::with_capacity(self.builders.len());
        for b in self.builders {
            if b.len() != rows {
                return Err(EngineError::internal(format!(
                    "output column has {} rows, expected {rows}",
                    b.len()
                ))
                .with_label(b.label())
                .with_key(&self.key));
            }
            columns.push(b.finish());
        }
        Ok(Table {
            key: self.key,
            columns,
        })
    }
}
