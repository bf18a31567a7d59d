//! Dataset identifiers.
//!
//! A join transformation never holds references to its parents. The
//! surrounding framework tags every inbound event with the `DatasetId` of
//! the operation that produced it, and the executor routes the event to a
//! side by comparing that tag against the `left`/`right` ids named in its
//! procedure spec. An id the spec does not name is rejected as `Invalid`.
//!
//! The engine treats ids as fully opaque: it never allocates one, never
//! orders them, and reads no meaning into the numeric value beyond equality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag identifying one operation in the surrounding execution graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DatasetId(u64);

impl DatasetId {
    /// Wrap a framework-assigned numeric id.
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    /// The framework-assigned number, for diagnostics and serialization.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dataset({})", self.0)
    }
}
