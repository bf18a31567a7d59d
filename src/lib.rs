//! # Tablestream
//!
//! A **streaming columnar join engine** for time-series dataflow pipelines.
//! Tablestream materializes a relational inner join across two asynchronous,
//! possibly-unsorted streams of group-keyed columnar tables, regrouping rows
//! as the join key, the inputs' group keys, and the output's group key all
//! differ.
//!
//! ## Key Features
//!
//! - **Columnar data plane** - typed column vectors with null masks, distinct
//!   from zero values
//! - **Group-key algebra** - label intersection, order-independent equality,
//!   canonical 64-bit key identifiers
//! - **Out-of-order buffering** - tables from either parent arrive in any
//!   interleaving and are buffered per `(side, group key)`
//! - **Output-key planning** - deterministic derivation of the output group
//!   key and schema, with `_a`/`_b` collision renaming
//! - **Null-rejecting equijoin** - rows with a null in any `on` column never
//!   match (`null = null` is false for the predicate)
//! - **Budgeted memory** - every buffered byte is accounted against an
//!   injected allocator; exhaustion is a clean, fatal error
//! - **Sequential and parallel matching** - bucket pairs can be matched on a
//!   rayon pool with identical output (feature: `parallel`)
//! - **Metrics** - attachable row and bucket counters with snapshot export
//!   (feature: `metrics`)
//!
//! ## Quick Start
//!
//! ```
//! use tablestream::*;
//! use tablestream::testing::{RecordingSink, TestTableBuilder};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! // Describe the join: predicate columns, method, and the two parents.
//! let left = DatasetId::new(1);
//! let right = DatasetId::new(2);
//! let spec = JoinSpec::new(["_time"], JoinMethod::Inner, left, right)?;
//!
//! // Wire the executor to a downstream dataset and a memory budget.
//! let alloc = Allocator::unlimited();
//! let mut join = JoinTransformation::new(spec, RecordingSink::new(), alloc);
//!
//! // Feed tables from both parents, in any order.
//! let a = TestTableBuilder::new()
//!     .times("_time", &[1, 2, 3])
//!     .floats("_value", &[1.0, 2.0, 3.0])
//!     .build();
//! let b = TestTableBuilder::new()
//!     .times("_time", &[1, 2, 3])
//!     .floats("_value", &[10.0, 20.0, 30.0])
//!     .build();
//! join.process(left, a)?;
//! join.process(right, b)?;
//!
//! // Matching runs when both parents have finished.
//! join.finish(left, None);
//! join.finish(right, None);
//!
//! let sink = join.into_downstream();
//! assert!(sink.finished());
//! let out = &sink.tables()[0];
//! // Colliding non-key columns are renamed: _time, _value_a, _value_b.
//! assert_eq!(out.columns().len(), 3);
//! assert_eq!(out.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### `Table`
//!
//! A [`Table`] is an ordered set of equal-length typed [`Column`]s plus a
//! [`GroupKey`] — an ordered list of `(label, type, value)` constants that
//! every row of the table carries. Tables are immutable once built, and a
//! stream never contains two tables with the same group key.
//!
//! ### Buckets and buffering
//!
//! Arriving tables are appended into per-`(side, key)` row buffers. The
//! first table for a key fixes the bucket's schema; schema widening within a
//! bucket is rejected. Buffered column memory belongs to the engine and is
//! released when matching drains the bucket or the transformation tears
//! down.
//!
//! ### Output-key planning
//!
//! For every pair of input buckets the planner derives the output group key
//! and column schema before any row work: `on` columns are emitted once,
//! other labels shared by both sides are renamed `L_a`/`L_b`, one-sided
//! labels pass through, and key columns agreeing on value collapse to a
//! single output key entry. The derivation is deterministic, so reruns emit
//! identical shapes.
//!
//! ### The executor
//!
//! [`JoinTransformation`] implements [`Transformation`]: the framework
//! delivers `process`, `update_watermark`, `update_processing_time`,
//! `retract_table` (unsupported), and `finish` events per parent, serially.
//! When both parents finish, every bucket pair is matched with a hash index
//! on its smaller side, and output buckets are handed to the downstream
//! [`Dataset`] followed by a finish signal carrying the first observed
//! error, if any.
//!
//! ## Ordering guarantees
//!
//! Within one output bucket, rows appear in A-major, B-minor arrival order,
//! regardless of which side was indexed. Emission order across buckets is
//! unspecified (currently first-created order).
//!
//! ## Error Handling
//!
//! All errors are fatal to the transformation and ride the downstream finish
//! signal: bad specs and arrival-time schema drift are `Invalid`, cross-side
//! schema violations at match time are `FailedPrecondition`, budget breaches
//! are `ResourceExhausted`, and retraction is `Unimplemented`. Errors carry
//! the offending column labels and a group-key rendering for diagnosis.
//!
//! ## Feature Flags
//!
//! - `metrics` - Metrics collection and reporting (enabled by default)
//! - `parallel` - Rayon-backed parallel bucket matching (enabled by default)
//!
//! ## Module Overview
//!
//! - [`values`] - Runtime type tags, dynamic values, type-aware hashing
//! - [`column`] - Typed columns, null masks, accounted builders
//! - [`table`] - Immutable tables and the table builder
//! - [`group_key`] - Group-key algebra and canonical identifiers
//! - [`alloc`] - The injected byte-budget allocator
//! - [`errors`] - Error kinds and diagnostic context
//! - [`spec`] - The join procedure specification
//! - [`buffer`] - Per-side, per-key row buffers
//! - [`plan`] - Output-key and schema planning
//! - [`join`] - The join executor
//! - [`execute`] - The `Dataset`/`Transformation` seam to the framework
//! - [`testing`] - Table builders, assertions, and mock sinks
//! - [`metrics`] - Metrics collection (feature: `metrics`)

pub mod alloc;
pub mod buffer;
pub mod column;
pub mod dataset_id;
pub mod errors;
pub mod execute;
pub mod group_key;
pub mod join;
pub mod plan;
pub mod spec;
pub mod table;
pub mod testing;
pub mod values;

#[cfg(feature = "metrics")]
pub mod metrics;

// General re-exports
pub use alloc::Allocator;
pub use buffer::{BufferStore, RowBuffer, Side};
pub use column::{Column, ColumnBuilder, ColumnData, NullMask};
pub use dataset_id::DatasetId;
pub use errors::{EngineError, ErrorKind};
pub use execute::{Dataset, Transformation};
pub use group_key::{GroupKey, KeyColumn, KeyId};
pub use join::{JoinOptions, JoinTransformation, MatchMode};
pub use plan::{OutputColumn, OutputPlan};
pub use spec::{JoinMethod, JoinSpec};
pub use table::{ColumnMeta, Table, TableBuilder};
pub use values::{ColumnType, Value};

// Gated re-exports
#[cfg(feature = "metrics")]
pub use metrics::{JoinMetrics, MetricsSnapshot};
