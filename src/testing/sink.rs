//! Mock downstream datasets for testing without a real consumer.

use crate::errors::{EngineError, Result};
use crate::execute::Dataset;
use crate::group_key::GroupKey;
use crate::table::Table;

/// A downstream dataset that records everything it receives.
///
/// Recorded tables are kept in arrival order; the finish signal and any
/// watermark or processing-time updates are captured too.
#[derive(Debug, Default)]
pub struct RecordingSink {
    tables: Vec<Table>,
    finished: bool,
    error: Option<EngineError>,
    watermarks: Vec<i64>,
    processing_times: Vec<i64>,
}

impl RecordingSink {
    /// A fresh, empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables received so far, in arrival order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Take ownership of the received tables.
    pub fn take_tables(&mut self) -> Vec<Table> {
        std::mem::take(&mut self.tables)
    }

    /// Find the received table carrying the given group key.
    #[must_use]
    pub fn table_for_key(&self, key: &GroupKey) -> Option<&Table> {
        self.tables.iter().find(|t| t.key() == key)
    }

    /// True once the finish signal arrived.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// The error the finish signal carried, if any.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    /// Watermarks received, in arrival order.
    #[must_use]
    pub fn watermarks(&self) -> &[i64] {
        &self.watermarks
    }

    /// Processing-time marks received, in arrival order.
    #[must_use]
    pub fn processing_times(&self) -> &[i64] {
        &self.processing_times
    }
}

impl Dataset for RecordingSink {
    fn process(&mut self, table: Table) -> Result<()> {
        assert!(!self.finished, "table received after finish");
        self.tables.push(table);
        Ok(())
    }

    fn finish(&mut self, err: Option<EngineError>) {
        assert!(!self.finished, "finish received twice");
        self.finished = true;
        self.error = err;
    }

    fn update_watermark(&mut self, watermark: i64) {
        self.watermarks.push(watermark);
    }

    fn update_processing_time(&mut self, ts: i64) {
        self.processing_times.push(ts);
    }
}

/// A downstream dataset that accepts a fixed number of tables and then
/// rejects the next one, for exercising downstream failure paths.
#[derive(Debug)]
pub struct FailingSink {
    accept: usize,
    received: usize,
    finished: bool,
    error: Option<EngineError>,
}

impl FailingSink {
    /// A sink that fails on table number `accept + 1`.
    #[must_use]
    pub fn new(accept: usize) -> Self {
        Self {
            accept,
            received: 0,
            finished: false,
            error: None,
        }
    }

    /// Number of tables accepted before the failure.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// True once the finish signal arrived.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// The error the finish signal carried, if any.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }
}

impl Dataset for FailingSink {
    fn process(&mut self, _table: Table) -> Result<()> {
        if self.received == self.accept {
            return Err(EngineError::internal("downstream rejected the table"));
        }
        self.received += 1;
        Ok(())
    }

    fn finish(&mut self, err: Option<EngineError>) {
        self.finished = true;
        self.error = err;
    }
}
