//! Testing utilities for join pipelines.
//!
//! This module provides a testing facility for writing idiomatic Rust tests
//! against the engine. It includes:
//!
//! - **Assertions**: Compare emitted tables with expected results
//! - **Test table builders**: Assemble group-keyed columnar tables fluently
//! - **Recording sink**: A mock downstream dataset that captures everything
//! - **Fixtures**: Pre-built time-series tables for common scenarios
//!
//! # Quick Start
//!
//! ```
//! use tablestream::*;
//! use tablestream::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let spec = JoinSpec::new(
//!     ["_time"],
//!     JoinMethod::Inner,
//!     DatasetId::new(0),
//!     DatasetId::new(1),
//! )?;
//! let mut join = JoinTransformation::new(spec, RecordingSink::new(), Allocator::unlimited());
//!
//! let a = TestTableBuilder::new()
//!     .times("_time", &[1, 2])
//!     .floats("_value", &[1.0, 2.0])
//!     .build();
//! let b = TestTableBuilder::new()
//!     .times("_time", &[1, 2])
//!     .floats("_value", &[10.0, 20.0])
//!     .build();
//!
//! join.process(DatasetId::new(0), a)?;
//! join.process(DatasetId::new(1), b)?;
//! join.finish(DatasetId::new(0), None);
//! join.finish(DatasetId::new(1), None);
//!
//! let sink = join.into_downstream();
//! assert!(sink.finished());
//! assert_eq!(sink.tables().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod sink;

// Re-export commonly used items
pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use sink::*;
