//! Columnar storage: typed vectors, null masks, and accounted builders.
//!
//! A [`Column`] is a typed vector plus a packed [`NullMask`]; nulls are
//! tracked out of band so zero values and missing values stay distinct.
//! Columns are immutable; all mutation happens through a [`ColumnBuilder`],
//! which accounts every byte of growth against the injected
//! [`Allocator`](crate::alloc::Allocator) and returns the bytes when it is
//! dropped or finished.
//!
//! Type dispatch is a single `match` over [`ColumnData`]; the per-type
//! accessor and push families are stamped out with `paste!` rather than
//! written six times by hand.

use crate::alloc::Allocator;
use crate::errors::{EngineError, Result};
use crate::values::{ColumnType, Value};
use std::mem;

/// Packed validity bitmap; a set bit marks the row as null.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NullMask {
    bits: Vec<u64>,
    len: usize,
}

impl NullMask {
    /// An empty mask.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no rows are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one row's validity.
    pub fn push(&mut self, null: bool) {
        let word = self.len / 64;
        if word == self.bits.len() {
            self.bits.push(0);
        }
        if null {
            self.bits[word] |= 1 << (self.len % 64);
        }
        self.len += 1;
    }

    /// True if the row is null. Out-of-range rows read as non-null.
    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        if row >= self.len {
            return false;
        }
        self.bits[row / 64] & (1 << (row % 64)) != 0
    }

    /// Number of null rows.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn reserve_rows(&mut self, additional: usize) {
        let words_needed = (self.len + additional).div_ceil(64);
        if words_needed > self.bits.capacity() {
            self.bits.reserve(words_needed - self.bits.len());
        }
    }
}

/// The typed storage behind a column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Time(Vec<i64>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
    String(Vec<String>),
}

impl ColumnData {
    /// Empty storage of the given type.
    #[must_use]
    pub fn empty(typ: ColumnType) -> Self {
        match typ {
            ColumnType::Time => ColumnData::Time(Vec::new()),
            ColumnType::Int => ColumnData::Int(Vec::new()),
            ColumnType::UInt => ColumnData::UInt(Vec::new()),
            ColumnType::Float => ColumnData::Float(Vec::new()),
            ColumnType::Bool => ColumnData::Bool(Vec::new()),
            ColumnType::String => ColumnData::String(Vec::new()),
        }
    }

    /// The runtime type tag of this storage.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Time(_) => ColumnType::Time,
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::UInt(_) => ColumnType::UInt,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Bool(_) => ColumnType::Bool,
            ColumnData::String(_) => ColumnType::String,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Time(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::UInt(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    /// True when no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize {
        match self {
            ColumnData::Time(v) => v.capacity(),
            ColumnData::Int(v) => v.capacity(),
            ColumnData::UInt(v) => v.capacity(),
            ColumnData::Float(v) => v.capacity(),
            ColumnData::Bool(v) => v.capacity(),
            ColumnData::String(v) => v.capacity(),
        }
    }

    fn reserve(&mut self, additional: usize) {
        match self {
            ColumnData::Time(v) => v.reserve(additional),
            ColumnData::Int(v) => v.reserve(additional),
            ColumnData::UInt(v) => v.reserve(additional),
            ColumnData::Float(v) => v.reserve(additional),
            ColumnData::Bool(v) => v.reserve(additional),
            ColumnData::String(v) => v.reserve(additional),
        }
    }

    /// Per-slot size used for budget accounting; string heap bytes are
    /// accounted separately at push time.
    fn slot_size(typ: ColumnType) -> usize {
        match typ {
            ColumnType::Time | ColumnType::Int => mem::size_of::<i64>(),
            ColumnType::UInt => mem::size_of::<u64>(),
            ColumnType::Float => mem::size_of::<f64>(),
            ColumnType::Bool => mem::size_of::<bool>(),
            ColumnType::String => mem::size_of::<String>(),
        }
    }

    /// Read one slot, ignoring the null mask.
    #[must_use]
    pub fn value(&self, row: usize) -> Value {
        match self {
            ColumnData::Time(v) => Value::Time(v[row]),
            ColumnData::Int(v) => Value::Int(v[row]),
            ColumnData::UInt(v) => Value::UInt(v[row]),
            ColumnData::Float(v) => Value::Float(v[row]),
            ColumnData::Bool(v) => Value::Bool(v[row]),
            ColumnData::String(v) => Value::String(v[row].clone()),
        }
    }

    // Pushes a non-null value; the caller has already matched types.
    fn push(&mut self, value: &Value) -> Result<()> {
        match (self, value) {
            (ColumnData::Time(v), Value::Time(t)) => v.push(*t),
            (ColumnData::Int(v), Value::Int(i)) => v.push(*i),
            (ColumnData::UInt(v), Value::UInt(u)) => v.push(*u),
            (ColumnData::Float(v), Value::Float(x)) => v.push(*x),
            (ColumnData::Bool(v), Value::Bool(b)) => v.push(*b),
            (ColumnData::String(v), Value::String(s)) => v.push(s.clone()),
            (data, value) => {
                return Err(EngineError::internal(format!(
                    "pushed {} value into {} column",
                    value
                        .type_of()
                        .map_or_else(|| "null".to_string(), |t| t.to_string()),
                    data.column_type()
                )));
            }
        }
        Ok(())
    }

    // Default filler slot for null rows.
    fn push_default(&mut self) {
        match self {
            ColumnData::Time(v) => v.push(0),
            ColumnData::Int(v) => v.push(0),
            ColumnData::UInt(v) => v.push(0),
            ColumnData::Float(v) => v.push(0.0),
            ColumnData::Bool(v) => v.push(false),
            ColumnData::String(v) => v.push(String::new()),
        }
    }
}

/// An immutable, labeled, typed vector with a null mask.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    label: String,
    data: ColumnData,
    nulls: NullMask,
}

impl Column {
    /// Assemble a column from parts.
    ///
    /// # Errors
    ///
    /// `Internal` when the mask length disagrees with the data length.
    pub fn new(label: impl Into<String>, data: ColumnData, nulls: NullMask) -> Result<Self> {
        let label = label.into();
        if nulls.len() != data.len() {
            return Err(EngineError::internal(format!(
                "null mask length {} does not match data length {}",
                nulls.len(),
                data.len()
            ))
            .with_label(label));
        }
        Ok(Self { label, data, nulls })
    }

    /// The column label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The column's runtime type.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read one cell, honoring the null mask.
    #[must_use]
    pub fn value(&self, row: usize) -> Value {
        if self.nulls.is_null(row) {
            Value::Null
        } else {
            self.data.value(row)
        }
    }

    /// True if the row is null.
    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.is_null(row)
    }

    /// Number of null rows.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.nulls.null_count()
    }

    /// The raw typed storage.
    #[must_use]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// The null mask.
    #[must_use]
    pub fn nulls(&self) -> &NullMask {
        &self.nulls
    }
}

/// Mutable, allocator-accounted column under construction.
///
/// Builders account vector capacity (plus string heap bytes) against the
/// injected allocator as they grow, and return everything they accounted when
/// finished or dropped. [`ColumnBuilder::finish`] hands the storage off as an
/// immutable [`Column`], at which point it leaves the engine's budget: output
/// tables are owned by whoever receives them.
#[derive(Debug)]
pub struct ColumnBuilder {
    label: String,
    data: ColumnData,
    nulls: NullMask,
    alloc: Allocator,
    accounted: usize,
}

impl ColumnBuilder {
    /// A new builder for a column of the given type.
    #[must_use]
    pub fn new(label: impl Into<String>, typ: ColumnType, alloc: Allocator) -> Self {
        Self {
            label: label.into(),
            data: ColumnData::empty(typ),
            nulls: NullMask::new(),
            alloc,
            accounted: 0,
        }
    }

    /// The column label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The column's runtime type.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no rows have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pre-reserve capacity for `additional` rows, accounting the growth.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the allocator budget would be exceeded.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self.data.len() + additional;
        if needed <= self.data.capacity() {
            return Ok(());
        }
        let old_bytes = self.capacity_bytes();
        self.data.reserve(needed - self.data.len());
        self.nulls.reserve_rows(additional);
        let new_bytes = self.capacity_bytes();
        self.account_growth(new_bytes.saturating_sub(old_bytes))
    }

    /// Append one value; `Value::Null` appends a null row.
    ///
    /// # Errors
    ///
    /// `Internal` on a type mismatch, `ResourceExhausted` on budget breach.
    pub fn push_value(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return self.push_null();
        }
        self.ensure_one()?;
        if let Value::String(s) = value {
            self.account_growth(s.len())?;
        }
        self.data.push(value).map_err(|e| e.with_label(&self.label))?;
        self.nulls.push(false);
        Ok(())
    }

    /// Append a null row.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` on budget breach.
    pub fn push_null(&mut self) -> Result<()> {
        self.ensure_one()?;
        self.data.push_default();
        self.nulls.push(true);
        Ok(())
    }

    /// Bulk-append an entire column of the same label-independent type.
    ///
    /// # Errors
    ///
    /// `Internal` on a type mismatch, `ResourceExhausted` on budget breach.
    pub fn append_column(&mut self, column: &Column) -> Result<()> {
        if column.column_type() != self.column_type() {
            return Err(EngineError::internal(format!(
                "appended {} column into {} builder",
                column.column_type(),
                self.column_type()
            ))
            .with_label(&self.label));
        }
        self.reserve(column.len())?;
        for row in 0..column.len() {
            self.push_value(&column.value(row))?;
        }
        Ok(())
    }

    /// Read one appended cell, honoring the null mask.
    #[must_use]
    pub fn value(&self, row: usize) -> Value {
        if self.nulls.is_null(row) {
            Value::Null
        } else {
            self.data.value(row)
        }
    }

    /// True if the appended row is null.
    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.is_null(row)
    }

    /// Number of null rows appended.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.nulls.null_count()
    }

    /// Seal the builder into an immutable [`Column`], releasing its bytes
    /// from the engine budget.
    #[must_use]
    pub fn finish(mut self) -> Column {
        let typ = self.data.column_type();
        self.alloc.shrink(self.accounted);
        self.accounted = 0;
        let data = mem::replace(&mut self.data, ColumnData::empty(typ));
        let nulls = mem::take(&mut self.nulls);
        let label = mem::take(&mut self.label);
        // Lengths agree by construction.
        Column { label, data, nulls }
    }

    // Amortized growth for one more row.
    fn ensure_one(&mut self) -> Result<()> {
        if self.data.len() < self.data.capacity() {
            return Ok(());
        }
        let target = (self.data.capacity() * 2).max(4);
        self.reserve(target - self.data.len())
    }

    fn capacity_bytes(&self) -> usize {
        let slots = self.data.capacity() * ColumnData::slot_size(self.data.column_type());
        let mask = self.data.capacity().div_ceil(64) * mem::size_of::<u64>();
        slots + mask
    }

    fn account_growth(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.alloc
            .grow(bytes)
            .map_err(|e| e.with_label(&self.label))?;
        self.accounted += bytes;
        Ok(())
    }
}

impl Drop for ColumnBuilder {
    fn drop(&mut self) {
        self.alloc.shrink(self.accounted);
        self.accounted = 0;
    }
}

macro_rules! typed_column_family {
    ($(($variant:ident, $name:ident, $ty:ty)),* $(,)?) => {
        paste::paste! {
            impl Column {
                $(
                    #[doc = concat!("Borrow the raw `", stringify!($ty), "` slots, or `None` if the column is not of type `", stringify!($name), "`. Null rows hold filler values; consult [`Column::is_null`].")]
                    #[must_use]
                    pub fn [<$name _values>](&self) -> Option<&[$ty]> {
                        match &self.data {
                            ColumnData::$variant(v) => Some(v),
                            _ => None,
                        }
                    }
                )*
            }

            impl ColumnBuilder {
                $(
                    #[doc = concat!("Append one non-null `", stringify!($name), "` row.")]
                    pub fn [<push_ $name>](&mut self, v: $ty) -> Result<()> {
                        self.push_value(&Value::$variant(v))
                    }
                )*
            }
        }
    };
}

typed_column_family!(
    (Time, time, i64),
    (Int, int, i64),
    (UInt, uint, u64),
    (Float, float, f64),
    (Bool, bool, bool),
    (String, string, String),
);
