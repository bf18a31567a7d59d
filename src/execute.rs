//! The execution seam between the framework and transformations.
//!
//! This module defines:
//! - [`Dataset`]: the downstream surface a transformation writes into. The
//!   receiver owns every table handed to it; the engine keeps no references.
//! - [`Transformation`]: the framework-facing event surface, addressed by
//!   parent [`DatasetId`]. A single logical consumer delivers events in an
//!   arbitrary interleaving across parents, but serially — the `&mut self`
//!   receivers encode that contract in the type system, so no internal
//!   locking is needed.
//!
//! Watermark and processing-time updates are carried per parent and recorded;
//! they never drive matching. Table retraction is not supported by the inner
//! join and fails `Unimplemented` by default.

use crate::dataset_id::DatasetId;
use crate::errors::{EngineError, Result};
use crate::group_key::GroupKey;
use crate::table::Table;

/// A downstream consumer of output tables.
pub trait Dataset {
    /// Deliver one output table. The dataset assumes ownership.
    ///
    /// # Errors
    ///
    /// Implementations may reject a table; the error propagates to the
    /// transformation's finish signal.
    fn process(&mut self, table: Table) -> Result<()>;

    /// Signal that no further tables will arrive, carrying the first error
    /// observed upstream, if any.
    fn finish(&mut self, err: Option<EngineError>);

    /// Forwarded event-time watermark.
    fn update_watermark(&mut self, watermark: i64) {
        let _ = watermark;
    }

    /// Forwarded processing-time mark.
    fn update_processing_time(&mut self, ts: i64) {
        let _ = ts;
    }
}

/// A stream transformation fed by one or more parent datasets.
pub trait Transformation {
    /// Deliver one table from the given parent.
    ///
    /// # Errors
    ///
    /// Fatal to the transformation; the framework should stop delivery and
    /// call [`Transformation::finish`].
    fn process(&mut self, parent: DatasetId, table: Table) -> Result<()>;

    /// Record the parent's event-time watermark. Does not drive matching.
    ///
    /// # Errors
    ///
    /// `Invalid` when the parent is unknown.
    fn update_watermark(&mut self, parent: DatasetId, watermark: i64) -> Result<()>;

    /// Record the parent's processing-time mark.
    ///
    /// # Errors
    ///
    /// `Invalid` when the parent is unknown.
    fn update_processing_time(&mut self, parent: DatasetId, ts: i64) -> Result<()>;

    /// Retract a previously delivered table by group key.
    ///
    /// # Errors
    ///
    /// `Unimplemented` unless the transformation supports retraction.
    fn retract_table(&mut self, parent: DatasetId, key: &GroupKey) -> Result<()> {
        let _ = (parent, key);
        Err(EngineError::unimplemented(
            "table retraction is not supported",
        ))
    }

    /// Signal that the parent will deliver no further tables, optionally
    /// carrying the parent's terminal error.
    fn finish(&mut self, parent: DatasetId, err: Option<EngineError>);
}
