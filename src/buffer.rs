//! Per-side, per-group-key row buffers.
//!
//! Tables arriving from either parent are appended into a [`RowBuffer`]
//! addressed by `(side, canonical key id)`. Buffers are append-only: the
//! first table for a key fixes the buffer's column schema, and every later
//! table must match it label for label (schema widening within a key is not
//! supported). Column order is insignificant for lookup — buffers address
//! columns by label and schemas are canonicalized by label before comparison.
//!
//! Buffered column memory is owned by the store and accounted against the
//! injected allocator; releasing a buffer (or the whole store) returns the
//! bytes to the budget.

use crate::alloc::Allocator;
use crate::column::ColumnBuilder;
use crate::errors::{EngineError, Result};
use crate::group_key::{GroupKey, KeyId};
use crate::table::{normalized_schema, ColumnMeta, Table};
use crate::values::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which parent a buffer belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The left parent.
    A,
    /// The right parent.
    B,
}

impl Side {
    /// The opposite side.
    #[must_use]
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("a"),
            Side::B => f.write_str("b"),
        }
    }
}

/// Accumulated rows for one `(side, input group key)`.
#[derive(Debug)]
pub struct RowBuffer {
    key: GroupKey,
    columns: Vec<ColumnBuilder>,
    by_label: HashMap<String, usize>,
}

impl RowBuffer {
    fn new(key: GroupKey, schema: &[ColumnMeta], alloc: &Allocator) -> Self {
        let mut by_label = HashMap::with_capacity(schema.len());
        let columns = schema
            .iter()
            .enumerate()
            .map(|(i, m)| {
                by_label.insert(m.label.clone(), i);
                ColumnBuilder::new(&m.label, m.typ, alloc.clone())
            })
            .collect();
        Self {
            key,
            columns,
            by_label,
        }
    }

    /// The buffer's input group key.
    #[must_use]
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Rows buffered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, ColumnBuilder::len)
    }

    /// True when no rows are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a buffered column by label.
    #[must_use]
    pub fn column(&self, label: &str) -> Option<&ColumnBuilder> {
        self.by_label.get(label).map(|&i| &self.columns[i])
    }

    /// True if the buffer has a column with this label.
    #[must_use]
    pub fn has_column(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    /// The schema in first-seen column order.
    #[must_use]
    pub fn schema(&self) -> Vec<ColumnMeta> {
        self.columns
            .iter()
            .map(|b| ColumnMeta::new(b.label(), b.column_type()))
            .collect()
    }

    /// Read one buffered cell by label and row.
    #[must_use]
    pub fn value(&self, label: &str, row: usize) -> Option<Value> {
        self.column(label).map(|c| c.value(row))
    }

    fn append(&mut self, table: &Table) -> Result<()> {
        if normalized_schema(self.schema()) != normalized_schema(table.schema()) {
            return Err(EngineError::failed_precondition(
                "table schema differs from the schema already buffered for this group key",
            )
            .with_key(&self.key));
        }
        for builder in &mut self.columns {
            // Present with matching type by the schema check above.
            let col = table
                .column(builder.label())
                .ok_or_else(|| EngineError::internal("column vanished after schema check"))?;
            builder.append_column(col)?;
        }
        Ok(())
    }
}

/// All buffered input for one join, both sides.
#[derive(Debug)]
pub struct BufferStore {
    alloc: Allocator,
    buffers: HashMap<(Side, KeyId), RowBuffer>,
    // Insertion order per side, for deterministic matching enumeration.
    order: [Vec<KeyId>; 2],
}

impl BufferStore {
    /// An empty store accounting against `alloc`.
    #[must_use]
    pub fn new(alloc: Allocator) -> Self {
        Self {
            alloc,
            buffers: HashMap::new(),
            order: [Vec::new(), Vec::new()],
        }
    }

    /// Append a table into the buffer for `(side, table.key())`, creating the
    /// buffer on first contact.
    ///
    /// # Errors
    ///
    /// `FailedPrecondition` when the buffer exists with a different schema;
    /// `Internal` on a canonical-id collision between distinct keys;
    /// `ResourceExhausted` on budget breach.
    pub fn insert(&mut self, side: Side, table: &Table) -> Result<KeyId> {
        let id = table.key().canonicalize();
        match self.buffers.get_mut(&(side, id)) {
            Some(buffer) => {
                if buffer.key() != table.key() {
                    return Err(EngineError::internal(
                        "group key hash collision in buffer store",
                    )
                    .with_key(table.key()));
                }
                buffer.append(table)?;
            }
            None => {
                let mut buffer = RowBuffer::new(table.key().clone(), &table.schema(), &self.alloc);
                buffer.append(table)?;
                self.buffers.insert((side, id), buffer);
                self.order[side.index()].push(id);
            }
        }
        Ok(id)
    }

    /// Look up one side's buffer by canonical id.
    #[must_use]
    pub fn get(&self, side: Side, id: KeyId) -> Option<&RowBuffer> {
        self.buffers.get(&(side, id))
    }

    /// Enumerate one side's buffers in first-insertion order.
    pub fn iter_side(&self, side: Side) -> impl Iterator<Item = (KeyId, &RowBuffer)> {
        self.order[side.index()]
            .iter()
            .filter_map(move |&id| self.buffers.get(&(side, id)).map(|b| (id, b)))
    }

    /// Number of buffers on one side.
    #[must_use]
    pub fn side_len(&self, side: Side) -> usize {
        self.order[side.index()].len()
    }

    /// Release one buffer, returning its bytes to the budget.
    pub fn release(&mut self, side: Side, id: KeyId) {
        if self.buffers.remove(&(side, id)).is_some() {
            self.order[side.index()].retain(|&k| k != id);
        }
    }

    /// Release everything, returning all buffered bytes to the budget.
    pub fn release_all(&mut self) {
        self.buffers.clear();
        self.order = [Vec::new(), Vec::new()];
    }
}
