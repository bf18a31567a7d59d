//! Output-key planning for a pair of input buckets.
//!
//! Given one buffer from each side plus the join predicate labels, the
//! planner decides, before any row work happens:
//!
//! - the **output group key** for the pair,
//! - the **output column schema** (with `_a`/`_b` collision renaming),
//! - the **column source map** — for every output column, which side and
//!   source label materializes it, and
//! - whether the pair is **joinable at all** (two buckets keyed on the same
//!   `on` label with different constant values can never produce a row).
//!
//! The derivation is purely a function of the two keys, the two schemas, and
//! `on`: identical inputs always produce identical plans, so repeated runs
//! emit identical output shapes.
//!
//! # Key derivation rules
//!
//! For a label `L` shared by both sides (as key or data column):
//! - `L` in `on`: a single column `L` is emitted; it joins the output key
//!   whenever `L` is a key column of either side (matched rows make it
//!   constant).
//! - `L` a key column on both sides with equal types and equal values: a
//!   single group column `L`.
//! - otherwise: renamed to `L_a` and `L_b`, each joining the output key iff
//!   `L` keys its own side. A string key `"foo"` against a null key yields
//!   `{L_a="foo", L_b=null}` — both preserved.
//!
//! One-sided labels are carried unrenamed. Input columns not referenced by
//! the schema are dropped silently. Output key labels are ordered
//! lexicographically; the column schema lists group columns first, then row
//! columns, each sorted by final label.

use crate::buffer::{RowBuffer, Side};
use crate::errors::{EngineError, Result};
use crate::group_key::{GroupKey, KeyColumn};
use crate::table::ColumnMeta;
use crate::values::{ColumnType, Value};
use std::collections::BTreeSet;

/// One column of the output schema, with its source mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputColumn {
    /// Output label, after any collision renaming.
    pub label: String,
    /// Output column type.
    pub typ: ColumnType,
    /// The input side the values come from.
    pub side: Side,
    /// The label of the source column on that side.
    pub source: String,
    /// True when the column is part of the output group key.
    pub group: bool,
}

/// A deterministic plan for joining one bucket pair.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputPlan {
    key: GroupKey,
    columns: Vec<OutputColumn>,
    joinable: bool,
}

impl OutputPlan {
    /// Derive the plan for `(a, b)` under the predicate `on`.
    ///
    /// # Errors
    ///
    /// `FailedPrecondition` when an `on` column is missing from either side
    /// or its types disagree across sides.
    pub fn new(a: &RowBuffer, b: &RowBuffer, on: &[String]) -> Result<Self> {
        let a_schema = a.schema();
        let b_schema = b.schema();
        let typ_in = |schema: &[ColumnMeta], label: &str| {
            schema.iter().find(|m| m.label == label).map(|m| m.typ)
        };

        for label in on {
            let ta = typ_in(&a_schema, label).ok_or_else(|| {
                EngineError::failed_precondition("join column missing from the a side")
                    .with_label(label)
                    .with_key(a.key())
            })?;
            let tb = typ_in(&b_schema, label).ok_or_else(|| {
                EngineError::failed_precondition("join column missing from the b side")
                    .with_label(label)
                    .with_key(b.key())
            })?;
            if ta != tb {
                return Err(EngineError::failed_precondition(format!(
                    "join column has type {ta} on the a side and {tb} on the b side"
                ))
                .with_label(label)
                .with_key(a.key()));
            }
        }

        let labels: BTreeSet<&str> = a_schema
            .iter()
            .chain(b_schema.iter())
            .map(|m| m.label.as_str())
            .collect();

        let mut joinable = true;
        let mut columns = Vec::new();
        let mut key_cols = Vec::new();
        let mut push_key = |label: &str, typ: ColumnType, value: &Value| {
            key_cols.push(KeyColumn {
                label: label.to_string(),
                typ,
                value: value.clone(),
            });
        };

        for label in labels {
            let ta = typ_in(&a_schema, label);
            let tb = typ_in(&b_schema, label);
            if on.iter().any(|l| l == label) {
                // Single column; both sides carry it, values equal on match.
                let typ = ta.unwrap_or_else(|| unreachable!());
                let group = match (a.key().value_of(label), b.key().value_of(label)) {
                    (Some(va), Some(vb)) => {
                        // Constant on both sides: rows can only match when
                        // the constants agree.
                        if va != vb {
                            joinable = false;
                        }
                        push_key(label, typ, va);
                        true
                    }
                    (Some(va), None) => {
                        push_key(label, typ, va);
                        true
                    }
                    (None, Some(vb)) => {
                        push_key(label, typ, vb);
                        true
                    }
                    (None, None) => false,
                };
                columns.push(OutputColumn {
                    label: label.to_string(),
                    typ,
                    side: Side::A,
                    source: label.to_string(),
                    group,
                });
                continue;
            }
            match (ta, tb) {
                (Some(ta), Some(tb)) => {
                    let va = a.key().value_of(label);
                    let vb = b.key().value_of(label);
                    if let (Some(va), Some(vb)) = (va, vb) {
                        if ta == tb && va == vb {
                            // Shared key column agreeing on type and value:
                            // carried once, unrenamed.
                            push_key(label, ta, va);
                            columns.push(OutputColumn {
                                label: label.to_string(),
                                typ: ta,
                                side: Side::A,
                                source: label.to_string(),
                                group: true,
                            });
                            continue;
                        }
                    }
                    // Collision: rename both ways.
                    let label_a = format!("{label}_a");
                    let label_b = format!("{label}_b");
                    if let Some(va) = va {
                        push_key(&label_a, ta, va);
                    }
                    if let Some(vb) = vb {
                        push_key(&label_b, tb, vb);
                    }
                    columns.push(OutputColumn {
                        label: label_a,
                        typ: ta,
                        side: Side::A,
                        source: label.to_string(),
                        group: va.is_some(),
                    });
                    columns.push(OutputColumn {
                        label: label_b,
                        typ: tb,
                        side: Side::B,
                        source: label.to_string(),
                        group: vb.is_some(),
                    });
                }
                (Some(ta), None) => {
                    let va = a.key().value_of(label);
                    if let Some(va) = va {
                        push_key(label, ta, va);
                    }
                    columns.push(OutputColumn {
                        label: label.to_string(),
                        typ: ta,
                        side: Side::A,
                        source: label.to_string(),
                        group: va.is_some(),
                    });
                }
                (None, Some(tb)) => {
                    let vb = b.key().value_of(label);
                    if let Some(vb) = vb {
                        push_key(label, tb, vb);
                    }
                    columns.push(OutputColumn {
                        label: label.to_string(),
                        typ: tb,
                        side: Side::B,
                        source: label.to_string(),
                        group: vb.is_some(),
                    });
                }
                (None, None) => unreachable!("label came from one of the schemas"),
            }
        }

        // Canonical order: group columns first, then row columns, each by
        // final label. The sort is stable and the inputs arrive in base-label
        // order, so renamed pairs stay adjacent where labels tie.
        columns.sort_by(|x, y| y.group.cmp(&x.group).then(x.label.cmp(&y.label)));

        let key = GroupKey::new(key_cols)?.sorted();
        Ok(Self {
            key,
            columns,
            joinable,
        })
    }

    /// The output group key for this pair.
    #[must_use]
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// The output columns in canonical order, with source mappings.
    #[must_use]
    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    /// False when the pair can be skipped without probing a single row.
    #[must_use]
    pub fn joinable(&self) -> bool {
        self.joinable
    }

    /// The output schema in canonical column order.
    #[must_use]
    pub fn schema(&self) -> Vec<ColumnMeta> {
        self.columns
            .iter()
            .map(|c| ColumnMeta::new(&c.label, c.typ))
            .collect()
    }
}
