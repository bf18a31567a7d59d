//! Runtime column types and dynamically typed values.
//!
//! The engine dispatches on a runtime type tag rather than per-column vtables:
//! every column carries a [`ColumnType`], and individual cells surface as
//! [`Value`] variants. All dispatch happens inside a single `match`, which
//! keeps the per-row cost of the join inner loop low.
//!
//! Two hash paths exist on purpose:
//!
//! - The `std::hash::Hash` impl on [`Value`] feeds the per-bucket join index
//!   (`HashMap<Vec<Value>, _>`), with collisions resolved by the `Eq` impl.
//! - [`Value::hash64`] is a seeded 64-bit hash with type-aware mixing
//!   (FNV-1a over bytes for strings, a splitmix finalizer for numerics) used
//!   to canonicalize group keys into stable bucket addresses.
//!
//! Floats are compared and hashed through [`ordered_float`] semantics so that
//! `NaN == NaN` and `-0.0 == 0.0` hold consistently across both paths. Note
//! that this is *value identity*, not the join predicate: null rejection for
//! `on` columns happens in the executor, before any value reaches a hash map.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The six primitive column types understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Nanoseconds since the Unix epoch, signed 64-bit.
    Time,
    /// Signed 64-bit integer.
    Int,
    /// Unsigned 64-bit integer.
    UInt,
    /// IEEE-754 double.
    Float,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
}

impl ColumnType {
    /// Stable lowercase name, used in error messages and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Time => "time",
            ColumnType::Int => "int",
            ColumnType::UInt => "uint",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single dynamically typed cell.
///
/// `Null` is a first-class variant: nulls are distinct from zero values and
/// survive buffering, planning, and emission unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Time(i64),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl Value {
    /// The column type of this value, or `None` for `Null`.
    #[must_use]
    pub fn type_of(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Time(_) => Some(ColumnType::Time),
            Value::Int(_) => Some(ColumnType::Int),
            Value::UInt(_) => Some(ColumnType::UInt),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::String(_) => Some(ColumnType::String),
        }
    }

    /// True if this is the `Null` variant.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Seeded 64-bit hash with type-aware mixing.
    ///
    /// Strings run through FNV-1a; numerics, bools, and times go through a
    /// splitmix-style bit finalizer; `Null` hashes to a fixed tag. The same
    /// seed and value always produce the same hash, so group keys canonicalize
    /// to stable identifiers across runs.
    #[must_use]
    pub fn hash64(&self, seed: u64) -> u64 {
        match self {
            Value::Null => mix64(seed ^ TAG_NULL),
            Value::Time(t) => mix64(seed ^ TAG_TIME ^ (*t as u64)),
            Value::Int(i) => mix64(seed ^ TAG_INT ^ (*i as u64)),
            Value::UInt(u) => mix64(seed ^ TAG_UINT ^ *u),
            Value::Float(x) => mix64(seed ^ TAG_FLOAT ^ canonical_float_bits(*x)),
            Value::Bool(b) => mix64(seed ^ TAG_BOOL ^ u64::from(*b)),
            Value::String(s) => fnv1a(s.as_bytes(), seed ^ TAG_STRING),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash64(0));
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
        }
    }
}

// Per-variant tags keep equal bit patterns of different types from colliding
// (e.g. Int(1) vs UInt(1) vs Bool(true)).
const TAG_NULL: u64 = 0x9ae1_6a3b_2f90_404f;
const TAG_TIME: u64 = 0xd1b5_4a32_d192_ed03;
const TAG_INT: u64 = 0x8cb9_2ba7_2f3d_8dd7;
const TAG_UINT: u64 = 0xaef1_7502_0c9a_74d1;
const TAG_FLOAT: u64 = 0xc2b2_ae3d_27d4_eb4f;
const TAG_BOOL: u64 = 0x1656_67b1_9e37_79f9;
const TAG_STRING: u64 = 0xff51_afd7_ed55_8ccd;

// Label hashing for key canonicalization, without routing through a Value.
#[inline]
pub(crate) fn hash_label(label: &str, seed: u64) -> u64 {
    fnv1a(label.as_bytes(), seed)
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over a byte slice, folded with a seed.
#[inline]
fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut h = FNV_OFFSET ^ mix64(seed);
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Splitmix64 finalizer: cheap, well-mixed avalanche for integral inputs.
#[inline]
fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

// Equal floats must hash equal: collapse -0.0 onto 0.0 and all NaN payloads
// onto the canonical NaN, matching the OrderedFloat equality above.
#[inline]
fn canonical_float_bits(x: f64) -> u64 {
    if x.is_nan() {
        f64::NAN.to_bits()
    } else if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}
