//! Join procedure specification, as handed down by a planner.
//!
//! A [`JoinSpec`] names the predicate columns, the join method, and the two
//! parent datasets. Validation happens here, at construction, so a bad
//! specification never reaches the executor: an empty `on` list, a duplicate
//! predicate label, an unknown method string, or identical parents all fail
//! `Invalid` immediately.

use crate::dataset_id::DatasetId;
use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported join methods.
///
/// Only `inner` exists today; the enum is the seam where outer variants
/// would land.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinMethod {
    /// Null-rejecting equijoin; unmatched rows on either side are dropped.
    Inner,
}

impl JoinMethod {
    /// Parse a method name from a procedure spec.
    ///
    /// # Errors
    ///
    /// `Invalid` for anything other than `"inner"`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "inner" => Ok(JoinMethod::Inner),
            other => Err(EngineError::invalid(format!(
                "unknown join method \"{other}\""
            ))),
        }
    }

    /// The method's canonical name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            JoinMethod::Inner => "inner",
        }
    }
}

impl fmt::Display for JoinMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The validated procedure specification for one join transformation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Predicate column labels, in order. Non-empty and duplicate-free.
    pub on: Vec<String>,
    /// The join method.
    pub method: JoinMethod,
    /// The left parent operation.
    pub left: DatasetId,
    /// The right parent operation.
    pub right: DatasetId,
}

impl JoinSpec {
    /// Validate and construct a spec.
    ///
    /// # Errors
    ///
    /// `Invalid` when `on` is empty or repeats a label, or when the two
    /// parents are the same operation.
    pub fn new<I, S>(on: I, method: JoinMethod, left: DatasetId, right: DatasetId) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let on: Vec<String> = on.into_iter().map(Into::into).collect();
        if on.is_empty() {
            return Err(EngineError::invalid(
                "join requires at least one predicate column",
            ));
        }
        for (i, label) in on.iter().enumerate() {
            if on[..i].contains(label) {
                return Err(
                    EngineError::invalid("predicate column listed twice").with_label(label)
                );
            }
        }
        if left == right {
            return Err(EngineError::invalid(
                "join parents must be distinct operations",
            ));
        }
        Ok(Self {
            on,
            method,
            left,
            right,
        })
    }
}
