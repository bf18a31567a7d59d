//! The streaming inner-join executor.
//!
//! [`JoinTransformation`] consumes group-keyed tables from two parents in any
//! interleaving, buffers them per `(side, input group key)`, and — once both
//! parents have finished — enumerates every bucket pair, plans each pair's
//! output shape, and performs a null-rejecting hash equijoin:
//!
//! 1. validate that the `on` columns exist on both sides with equal types,
//! 2. derive the output group key, schema, and source map
//!    ([`OutputPlan`]),
//! 3. hash-index the smaller side by its tuple of `on` values, skipping rows
//!    with any null `on` value,
//! 4. probe with the other side and collect matching row pairs,
//! 5. reserve the exact output size once, then emit the Cartesian matches in
//!    A-major, B-minor order into the output bucket addressed by the output
//!    key.
//!
//! Output buckets are handed to the downstream [`Dataset`] in first-created
//! order, followed by a finish signal carrying the first observed error, if
//! any. Errors anywhere — bad arrivals, schema conflicts, allocator budget —
//! are fatal to the transformation: buffers are released and the error rides
//! the finish signal downstream. An out-of-band cancellation releases all
//! buffered columns without emitting another row.
//!
//! Matching is single-threaded by default. With the `parallel` feature, the
//! per-pair probe work (which only reads immutable buffers) can be spread
//! over a rayon pool; results are still folded into output buckets in
//! deterministic pair order, so both modes produce identical output.

use crate::alloc::Allocator;
use crate::buffer::{BufferStore, RowBuffer, Side};
use crate::column::ColumnBuilder;
use crate::dataset_id::DatasetId;
use crate::errors::{EngineError, Result};
use crate::execute::{Dataset, Transformation};
use crate::group_key::KeyId;
use crate::plan::OutputPlan;
use crate::spec::JoinSpec;
use crate::table::{Table, TableBuilder};
use crate::values::{ColumnType, Value};
use std::collections::HashMap;

#[cfg(feature = "metrics")]
use crate::metrics::JoinMetrics;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How bucket pairs are matched at finish time.
#[derive(Clone, Copy, Debug)]
pub enum MatchMode {
    /// Match pairs one at a time on the calling thread.
    Sequential,
    /// Match pairs on a rayon pool. `threads: None` sizes the pool to the
    /// machine.
    #[cfg(feature = "parallel")]
    Parallel { threads: Option<usize> },
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Sequential
    }
}

/// Tuning knobs for a join transformation.
#[derive(Clone, Copy, Debug, Default)]
pub struct JoinOptions {
    /// Matching execution mode.
    pub match_mode: MatchMode,
}

/// A streaming inner join between two parent datasets.
pub struct JoinTransformation<D> {
    spec: JoinSpec,
    options: JoinOptions,
    alloc: Allocator,
    store: BufferStore,
    downstream: D,
    // First observed type per `on` label, across both sides.
    on_types: HashMap<String, ColumnType>,
    finished: [bool; 2],
    watermarks: [Option<i64>; 2],
    processing_times: [Option<i64>; 2],
    first_err: Option<EngineError>,
    done: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<JoinMetrics>,
}

impl<D: Dataset> JoinTransformation<D> {
    /// Create a join executor feeding `downstream`, accounting column memory
    /// against `alloc`.
    #[must_use]
    pub fn new(spec: JoinSpec, downstream: D, alloc: Allocator) -> Self {
        Self::with_options(spec, downstream, alloc, JoinOptions::default())
    }

    /// Like [`JoinTransformation::new`], with explicit options.
    #[must_use]
    pub fn with_options(
        spec: JoinSpec,
        downstream: D,
        alloc: Allocator,
        options: JoinOptions,
    ) -> Self {
        let store = BufferStore::new(alloc.clone());
        Self {
            spec,
            options,
            alloc,
            store,
            downstream,
            on_types: HashMap::new(),
            finished: [false, false],
            watermarks: [None, None],
            processing_times: [None, None],
            first_err: None,
            done: false,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Attach counters; the executor will track its work on them.
    #[cfg(feature = "metrics")]
    pub fn set_metrics(&mut self, metrics: JoinMetrics) {
        self.metrics = Some(metrics);
    }

    /// Detach and return the counters, if any were attached.
    #[cfg(feature = "metrics")]
    pub fn take_metrics(&mut self) -> Option<JoinMetrics> {
        self.metrics.take()
    }

    /// The validated procedure spec.
    #[must_use]
    pub fn spec(&self) -> &JoinSpec {
        &self.spec
    }

    /// Borrow the downstream dataset.
    #[must_use]
    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    /// Mutably borrow the downstream dataset.
    pub fn downstream_mut(&mut self) -> &mut D {
        &mut self.downstream
    }

    /// Tear down the executor and recover the downstream dataset.
    #[must_use]
    pub fn into_downstream(self) -> D {
        self.downstream
    }

    /// The last recorded watermark for a side.
    #[must_use]
    pub fn watermark(&self, side: Side) -> Option<i64> {
        self.watermarks[side.index()]
    }

    /// The last recorded processing-time mark for a side.
    #[must_use]
    pub fn processing_time(&self, side: Side) -> Option<i64> {
        self.processing_times[side.index()]
    }

    /// Number of buffered input buckets on a side.
    #[must_use]
    pub fn buffered(&self, side: Side) -> usize {
        self.store.side_len(side)
    }

    /// Out-of-band cancellation: release all buffered columns and stop.
    /// Nothing further is emitted.
    pub fn cancel(&mut self) {
        self.store.release_all();
        self.done = true;
    }

    fn side_of(&self, parent: DatasetId) -> Result<Side> {
        if parent == self.spec.left {
            Ok(Side::A)
        } else if parent == self.spec.right {
            Ok(Side::B)
        } else {
            Err(EngineError::invalid(format!(
                "{parent} is not a parent of this join"
            )))
        }
    }

    fn record_error(&mut self, err: EngineError) {
        if self.first_err.is_none() {
            self.first_err = Some(err);
        }
    }

    // Metric taps; each compiles away without the `metrics` feature.
    fn note_buffered(&self, rows: u64) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.table_buffered(rows);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = rows;
    }

    fn note_dropped_nulls(&self, rows: u64) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.rows_dropped_null_on(rows);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = rows;
    }

    fn note_pair_joined(&self, rows: u64) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.pair_joined(rows);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = rows;
    }

    fn note_table_emitted(&self) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.table_emitted();
        }
    }

    // Fast arrival check: every `on` column present, and its type consistent
    // with everything observed so far on either side.
    fn check_on_columns(&mut self, table: &Table) -> Result<()> {
        for label in &self.spec.on {
            let col = table.column(label).ok_or_else(|| {
                EngineError::invalid("join column missing from arriving table")
                    .with_label(label)
                    .with_key(table.key())
            })?;
            let typ = col.column_type();
            match self.on_types.get(label) {
                Some(&seen) if seen != typ => {
                    return Err(EngineError::invalid(format!(
                        "join column arrived as {typ} but was previously {seen}"
                    ))
                    .with_label(label)
                    .with_key(table.key()));
                }
                Some(_) => {}
                None => {
                    self.on_types.insert(label.clone(), typ);
                }
            }
        }
        Ok(())
    }

    fn match_and_emit(&mut self) -> Result<()> {
        let pairs: Vec<(KeyId, KeyId)> = self
            .store
            .iter_side(Side::A)
            .flat_map(|(a_id, _)| {
                self.store
                    .iter_side(Side::B)
                    .map(move |(b_id, _)| (a_id, b_id))
            })
            .collect();

        let matched = match self.options.match_mode {
            MatchMode::Sequential => {
                let mut out = Vec::with_capacity(pairs.len());
                for &(a_id, b_id) in &pairs {
                    out.push(match_pair(&self.store, &self.spec.on, a_id, b_id)?);
                }
                out
            }
            #[cfg(feature = "parallel")]
            MatchMode::Parallel { threads } => {
                let t = threads.unwrap_or_else(num_cpus::get);
                rayon::ThreadPoolBuilder::new()
                    .num_threads(t)
                    .build_global()
                    .ok();
                let store = &self.store;
                let on = &self.spec.on;
                let results: Vec<Result<PairMatch>> = pairs
                    .par_iter()
                    .map(|&(a_id, b_id)| match_pair(store, on, a_id, b_id))
                    .collect();
                results.into_iter().collect::<Result<Vec<_>>>()?
            }
        };

        // Fold matches into output buckets in deterministic pair order.
        let mut out: HashMap<KeyId, TableBuilder> = HashMap::new();
        let mut out_order: Vec<KeyId> = Vec::new();
        for pm in matched {
            self.note_dropped_nulls(pm.dropped_nulls);
            let Some(plan) = pm.plan else { continue };
            if pm.rows.is_empty() {
                continue;
            }
            let out_id = plan.key().canonicalize();
            let created = !out.contains_key(&out_id);
            if created {
                out_order.push(out_id);
            }
            let builder = out.entry(out_id).or_insert_with(|| {
                TableBuilder::new(plan.key().clone(), &plan.schema(), &self.alloc)
            });
            if !created && builder.schema() != plan.schema() {
                return Err(EngineError::failed_precondition(
                    "bucket pairs produced conflicting schemas for one output group key",
                )
                .with_key(plan.key()));
            }
            builder.reserve(pm.rows.len())?;
            let buf_a = self
                .store
                .get(Side::A, pm.a_id)
                .ok_or_else(|| EngineError::internal("a-side buffer missing at emission"))?;
            let buf_b = self
                .store
                .get(Side::B, pm.b_id)
                .ok_or_else(|| EngineError::internal("b-side buffer missing at emission"))?;
            for &(a_row, b_row) in &pm.rows {
                for (i, col) in plan.columns().iter().enumerate() {
                    let (buf, row) = match col.side {
                        Side::A => (buf_a, a_row),
                        Side::B => (buf_b, b_row),
                    };
                    let value = buf.value(&col.source, row).ok_or_else(|| {
                        EngineError::internal("planned source column missing from buffer")
                            .with_label(&col.source)
                    })?;
                    builder.column_mut(i).push_value(&value)?;
                }
            }
            self.note_pair_joined(pm.rows.len() as u64);
        }

        for out_id in out_order {
            let builder = out
                .remove(&out_id)
                .ok_or_else(|| EngineError::internal("output bucket vanished before emission"))?;
            let table = builder.finish()?;
            self.note_table_emitted();
            self.downstream.process(table)?;
        }
        Ok(())
    }
}

impl<D: Dataset> Transformation for JoinTransformation<D> {
    fn process(&mut self, parent: DatasetId, table: Table) -> Result<()> {
        if self.done || self.first_err.is_some() {
            return Ok(());
        }
        let result = self.process_inner(parent, &table);
        if let Err(ref e) = result {
            self.record_error(e.clone());
        }
        result
    }

    fn update_watermark(&mut self, parent: DatasetId, watermark: i64) -> Result<()> {
        let side = self.side_of(parent)?;
        let slot = &mut self.watermarks[side.index()];
        *slot = Some(slot.map_or(watermark, |w| w.max(watermark)));
        Ok(())
    }

    fn update_processing_time(&mut self, parent: DatasetId, ts: i64) -> Result<()> {
        let side = self.side_of(parent)?;
        let slot = &mut self.processing_times[side.index()];
        *slot = Some(slot.map_or(ts, |t| t.max(ts)));
        Ok(())
    }

    fn finish(&mut self, parent: DatasetId, err: Option<EngineError>) {
        if self.done {
            return;
        }
        if let Ok(side) = self.side_of(parent) {
            self.finished[side.index()] = true;
        }
        if let Some(e) = err {
            self.record_error(e);
        }
        // A parent error short-circuits matching entirely.
        if let Some(e) = self.first_err.clone() {
            self.store.release_all();
            self.done = true;
            self.downstream.finish(Some(e));
            return;
        }
        if !(self.finished[0] && self.finished[1]) {
            return;
        }
        let outcome = self.match_and_emit();
        self.store.release_all();
        self.done = true;
        match outcome {
            Ok(()) => self.downstream.finish(None),
            Err(e) => self.downstream.finish(Some(e)),
        }
    }
}

impl<D: Dataset> JoinTransformation<D> {
    fn process_inner(&mut self, parent: DatasetId, table: &Table) -> Result<()> {
        let side = self.side_of(parent)?;
        self.check_on_columns(table)?;
        self.store.insert(side, table)?;
        self.note_buffered(table.len() as u64);
        Ok(())
    }
}

// The outcome of matching one bucket pair: the plan (None when the pair is
// statically non-joinable) and the matched row index pairs in output order.
struct PairMatch {
    a_id: KeyId,
    b_id: KeyId,
    plan: Option<OutputPlan>,
    rows: Vec<(usize, usize)>,
    dropped_nulls: u64,
}

impl PairMatch {
    fn skipped(a_id: KeyId, b_id: KeyId) -> Self {
        Self {
            a_id,
            b_id,
            plan: None,
            rows: Vec::new(),
            dropped_nulls: 0,
        }
    }
}

// Match one bucket pair: plan, index the smaller side, probe with the other,
// and return the matched row pairs in A-major, B-minor order. Reads the store
// immutably, so pairs can be matched concurrently.
fn match_pair(store: &BufferStore, on: &[String], a_id: KeyId, b_id: KeyId) -> Result<PairMatch> {
    let a = store
        .get(Side::A, a_id)
        .ok_or_else(|| EngineError::internal("a-side buffer missing at match"))?;
    let b = store
        .get(Side::B, b_id)
        .ok_or_else(|| EngineError::internal("b-side buffer missing at match"))?;

    let plan = OutputPlan::new(a, b, on)?;
    if !plan.joinable() {
        return Ok(PairMatch::skipped(a_id, b_id));
    }

    let a_on = on_columns(a, on)?;
    let b_on = on_columns(b, on)?;

    // Index the smaller side, probe with the other.
    let index_a = a.len() <= b.len();
    let (index_cols, index_len, probe_cols, probe_len) = if index_a {
        (&a_on, a.len(), &b_on, b.len())
    } else {
        (&b_on, b.len(), &a_on, a.len())
    };

    let mut dropped = 0u64;
    let mut index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    for row in 0..index_len {
        match on_tuple(index_cols, row) {
            Some(tuple) => index.entry(tuple).or_default().push(row),
            None => dropped += 1,
        }
    }

    let mut rows = Vec::new();
    for row in 0..probe_len {
        let Some(tuple) = on_tuple(probe_cols, row) else {
            dropped += 1;
            continue;
        };
        if let Some(hits) = index.get(&tuple) {
            for &hit in hits {
                rows.push(if index_a { (hit, row) } else { (row, hit) });
            }
        }
    }
    if index_a {
        // Probing B against an A-side index yields B-major pairs; restore
        // the A-major, B-minor output order.
        rows.sort_unstable();
    }

    Ok(PairMatch {
        a_id,
        b_id,
        plan: Some(plan),
        rows,
        dropped_nulls: dropped,
    })
}

fn on_columns<'b>(buffer: &'b RowBuffer, on: &[String]) -> Result<Vec<&'b ColumnBuilder>> {
    on.iter()
        .map(|label| {
            buffer.column(label).ok_or_else(|| {
                EngineError::failed_precondition("join column missing from buffered bucket")
                    .with_label(label)
                    .with_key(buffer.key())
            })
        })
        .collect()
}

// The row's tuple of `on` values, or `None` if any of them is null
// (null-rejecting equality: such rows can never match).
fn on_tuple(cols: &[&ColumnBuilder], row: usize) -> Option<Vec<Value>> {
    let mut tuple = Vec::with_capacity(cols.len());
    for col in cols {
        let value = col.value(row);
        if value.is_null() {
            return None;
        }
        tuple.push(value);
    }
    Some(tuple)
}
