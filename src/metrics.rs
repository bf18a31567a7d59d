//! Execution counters for a join transformation.
//!
//! A join has a small, fixed set of quantities worth watching: how much input
//! it buffered, how many rows the null-rejecting predicate discarded, how
//! many bucket pairs actually produced output, and how much output left the
//! engine. [`JoinMetrics`] holds exactly those counters, plus optional
//! start/end timestamps, behind a cheaply cloneable handle — the executor
//! and the caller share one set of numbers.
//!
//! Counters are cumulative over the life of the transformation. Read them
//! individually, or take a [`MetricsSnapshot`] for reporting: snapshots are
//! plain serde values, so they print, compare, and serialize without any
//! further machinery.
//!
//! # Example
//!
//! ```no_run
//! use tablestream::metrics::JoinMetrics;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = JoinMetrics::new();
//! metrics.record_start();
//!
//! // ... attach a clone to a JoinTransformation with set_metrics, run the
//! // join to completion ...
//!
//! metrics.record_end();
//! metrics.print();
//! metrics.save_to_file("join_metrics.json")?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared counters for one join transformation.
///
/// Clones share the same underlying counters. The executor increments them
/// through the typed methods below; there is no name-keyed registry to
/// misspell.
#[derive(Clone, Debug, Default)]
pub struct JoinMetrics {
    inner: Arc<JoinMetricsInner>,
}

#[derive(Debug, Default)]
struct JoinMetricsInner {
    tables_buffered: AtomicU64,
    rows_buffered: AtomicU64,
    rows_dropped_null_on: AtomicU64,
    bucket_pairs_joined: AtomicU64,
    rows_emitted: AtomicU64,
    tables_emitted: AtomicU64,
    timings: Mutex<Timings>,
}

#[derive(Debug, Default)]
struct Timings {
    started: Option<Instant>,
    finished: Option<Instant>,
}

/// A point-in-time copy of all counters, ready for reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Input tables accepted into the buffer store.
    pub tables_buffered: u64,
    /// Input rows accepted into the buffer store.
    pub rows_buffered: u64,
    /// Rows skipped because an `on` column was null.
    pub rows_dropped_null_on: u64,
    /// Bucket pairs that produced at least one output row.
    pub bucket_pairs_joined: u64,
    /// Output rows appended across all output buckets.
    pub rows_emitted: u64,
    /// Output tables handed to the downstream dataset.
    pub tables_emitted: u64,
    /// Wall-clock time between the start and end marks, when both were
    /// recorded.
    pub execution_time_ms: Option<u64>,
}

impl JoinMetrics {
    /// Fresh counters, all zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of execution.
    pub fn record_start(&self) {
        self.inner.timings.lock().unwrap().started = Some(Instant::now());
    }

    /// Mark the end of execution.
    pub fn record_end(&self) {
        self.inner.timings.lock().unwrap().finished = Some(Instant::now());
    }

    /// Wall-clock time between the two marks, when both were recorded.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let timings = self.inner.timings.lock().unwrap();
        match (timings.started, timings.finished) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Record one buffered input table with `rows` rows.
    pub fn table_buffered(&self, rows: u64) {
        self.inner.tables_buffered.fetch_add(1, Ordering::Relaxed);
        self.inner.rows_buffered.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record `rows` rows rejected for a null `on` value.
    pub fn rows_dropped_null_on(&self, rows: u64) {
        self.inner
            .rows_dropped_null_on
            .fetch_add(rows, Ordering::Relaxed);
    }

    /// Record one productive bucket pair that emitted `rows` rows.
    pub fn pair_joined(&self, rows: u64) {
        self.inner
            .bucket_pairs_joined
            .fetch_add(1, Ordering::Relaxed);
        self.inner.rows_emitted.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record one output table handed downstream.
    pub fn table_emitted(&self) {
        self.inner.tables_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Input tables accepted so far.
    #[must_use]
    pub fn tables_buffered(&self) -> u64 {
        self.inner.tables_buffered.load(Ordering::Relaxed)
    }

    /// Input rows accepted so far.
    #[must_use]
    pub fn rows_buffered(&self) -> u64 {
        self.inner.rows_buffered.load(Ordering::Relaxed)
    }

    /// Rows rejected for null `on` values so far.
    #[must_use]
    pub fn dropped_null_on(&self) -> u64 {
        self.inner.rows_dropped_null_on.load(Ordering::Relaxed)
    }

    /// Productive bucket pairs so far.
    #[must_use]
    pub fn bucket_pairs_joined(&self) -> u64 {
        self.inner.bucket_pairs_joined.load(Ordering::Relaxed)
    }

    /// Output rows so far.
    #[must_use]
    pub fn rows_emitted(&self) -> u64 {
        self.inner.rows_emitted.load(Ordering::Relaxed)
    }

    /// Output tables so far.
    #[must_use]
    pub fn tables_emitted(&self) -> u64 {
        self.inner.tables_emitted.load(Ordering::Relaxed)
    }

    /// Output rows per buffered input row, or `None` before any input.
    ///
    /// A quick read on how selective the predicate was: well under 1.0 means
    /// most input never matched; above 1.0 means duplicate `on` tuples
    /// multiplied rows on the way out.
    #[must_use]
    pub fn selectivity(&self) -> Option<f64> {
        let buffered = self.rows_buffered();
        if buffered == 0 {
            return None;
        }
        Some(self.rows_emitted() as f64 / buffered as f64)
    }

    /// Copy every counter into a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tables_buffered: self.tables_buffered(),
            rows_buffered: self.rows_buffered(),
            rows_dropped_null_on: self.dropped_null_on(),
            bucket_pairs_joined: self.bucket_pairs_joined(),
            rows_emitted: self.rows_emitted(),
            tables_emitted: self.tables_emitted(),
            execution_time_ms: self.elapsed().map(|d| d.as_millis() as u64),
        }
    }

    /// Print a short report to stdout.
    pub fn print(&self) {
        let snap = self.snapshot();
        println!("join metrics:");
        println!("  tables buffered        {}", snap.tables_buffered);
        println!("  rows buffered          {}", snap.rows_buffered);
        println!("  rows dropped (null on) {}", snap.rows_dropped_null_on);
        println!("  bucket pairs joined    {}", snap.bucket_pairs_joined);
        println!("  rows emitted           {}", snap.rows_emitted);
        println!("  tables emitted         {}", snap.tables_emitted);
        if let Some(s) = self.selectivity() {
            println!("  selectivity            {s:.3}");
        }
        if let Some(ms) = snap.execution_time_ms {
            println!("  execution time         {ms} ms");
        }
    }

    /// Write the snapshot to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
