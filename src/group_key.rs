//! Group keys: ordered, label-addressed tuples of typed constants.
//!
//! Every table carries a [`GroupKey`] whose columns are constant across all
//! of its rows. The algebra here is what the buffer store and the output-key
//! planner are built on: label enumeration, value lookup, label intersection
//! with type checking, order-independent deep equality, and canonicalization
//! into a stable [`KeyId`] for hash-bucket addressing.
//!
//! Keys may hold null values; two null key values compare equal for key
//! identity. (Null rejection applies to the join predicate, not to key
//! identity — a bucket keyed on `key=null` is a perfectly good bucket.)

use crate::errors::{EngineError, Result};
use crate::values::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed for group-key canonicalization hashes.
const KEY_HASH_SEED: u64 = 0x5161_7473_6c6f_7473;

/// One `(label, type, value)` entry of a group key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyColumn {
    /// The column label.
    pub label: String,
    /// The declared column type.
    pub typ: ColumnType,
    /// The constant value; may be `Value::Null`.
    pub value: Value,
}

impl KeyColumn {
    /// Construct a key column; the value must match the declared type or be
    /// null.
    ///
    /// # Errors
    ///
    /// `Invalid` when the value's type disagrees with `typ`.
    pub fn new(label: impl Into<String>, typ: ColumnType, value: Value) -> Result<Self> {
        let label = label.into();
        if let Some(value_typ) = value.type_of() {
            if value_typ != typ {
                return Err(EngineError::invalid(format!(
                    "group key value {value} has type {value_typ}, expected {typ}"
                ))
                .with_label(label));
            }
        }
        Ok(Self { label, typ, value })
    }
}

/// An ordered list of key columns tagging every row of a table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupKey {
    cols: Vec<KeyColumn>,
}

impl GroupKey {
    /// The empty group key.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a key from columns.
    ///
    /// # Errors
    ///
    /// `Invalid` on duplicate labels.
    pub fn new(cols: Vec<KeyColumn>) -> Result<Self> {
        for (i, col) in cols.iter().enumerate() {
            if cols[..i].iter().any(|c| c.label == col.label) {
                return Err(
                    EngineError::invalid("duplicate label in group key").with_label(&col.label)
                );
            }
        }
        Ok(Self { cols })
    }

    /// Number of key columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// True for the empty key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// The key columns in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[KeyColumn] {
        &self.cols
    }

    /// The labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cols.iter().map(|c| c.label.as_str())
    }

    /// True if `label` is part of this key.
    #[must_use]
    pub fn has(&self, label: &str) -> bool {
        self.cols.iter().any(|c| c.label == label)
    }

    /// The value for `label`, or `None` when absent.
    #[must_use]
    pub fn value_of(&self, label: &str) -> Option<&Value> {
        self.cols.iter().find(|c| c.label == label).map(|c| &c.value)
    }

    /// The declared type for `label`, or `None` when absent.
    #[must_use]
    pub fn typ_of(&self, label: &str) -> Option<ColumnType> {
        self.cols.iter().find(|c| c.label == label).map(|c| c.typ)
    }

    /// Labels present in both keys.
    ///
    /// # Errors
    ///
    /// `Invalid` when a shared label carries different declared types.
    pub fn intersect_labels<'a>(&'a self, other: &GroupKey) -> Result<Vec<&'a str>> {
        let mut shared = Vec::new();
        for col in &self.cols {
            if let Some(other_typ) = other.typ_of(&col.label) {
                if other_typ != col.typ {
                    return Err(EngineError::invalid(format!(
                        "label has type {} on one side and {} on the other",
                        col.typ, other_typ
                    ))
                    .with_label(&col.label)
                    .with_key(self));
                }
                shared.push(col.label.as_str());
            }
        }
        Ok(shared)
    }

    /// A copy of this key with labels sorted lexicographically.
    #[must_use]
    pub fn sorted(&self) -> GroupKey {
        let mut cols = self.cols.clone();
        cols.sort_by(|a, b| a.label.cmp(&b.label));
        GroupKey { cols }
    }

    /// Canonical 64-bit identifier for hash-bucket addressing.
    ///
    /// Labels are sorted before hashing, so insertion order never affects the
    /// identifier. Equal keys always canonicalize to equal ids; distinct keys
    /// collide only with hash-collision probability, and lookups that care
    /// resolve collisions with [`GroupKey::eq`].
    #[must_use]
    pub fn canonicalize(&self) -> KeyId {
        let mut idx: Vec<usize> = (0..self.cols.len()).collect();
        idx.sort_by(|&a, &b| self.cols[a].label.cmp(&self.cols[b].label));
        let mut h = KEY_HASH_SEED;
        for i in idx {
            let col = &self.cols[i];
            h = crate::values::hash_label(&col.label, h);
            h = h.rotate_left(7) ^ (col.typ as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            h = col.value.hash64(h);
        }
        KeyId(h)
    }
}

// Deep label-and-value equality, independent of insertion order.
impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cols.len() == other.cols.len()
            && self.cols.iter().all(|c| {
                other.typ_of(&c.label) == Some(c.typ) && other.value_of(&c.label) == Some(&c.value)
            })
    }
}

impl Eq for GroupKey {}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut idx: Vec<usize> = (0..self.cols.len()).collect();
        idx.sort_by(|&a, &b| self.cols[a].label.cmp(&self.cols[b].label));
        write!(f, "{{")?;
        for (n, i) in idx.into_iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            let col = &self.cols[i];
            write!(f, "{}={}", col.label, col.value)?;
        }
        write!(f, "}}")
    }
}

/// Canonical numeric identifier for a group key.
///
/// Opaque outside the engine; the buffer store and the output bucket store
/// use it as a map key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct KeyId(u64);

impl KeyId {
    /// Return the underlying numeric value.
    ///
    /// Useful mainly for debugging or serialization.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}
