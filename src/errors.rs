//! Engine error kinds and the context they carry.
//!
//! Every failure in the join engine is fatal to the transformation: errors are
//! attached to the downstream finish signal and there is no per-row recovery.
//! To make those terminal errors actionable, an [`EngineError`] carries the
//! offending column label(s) and a rendering of the group key involved, in
//! addition to its [`ErrorKind`].
//!
//! # Example
//!
//! ```
//! use tablestream::errors::{EngineError, ErrorKind};
//!
//! let err = EngineError::failed_precondition("join column missing from right side")
//!     .with_label("_time");
//! assert_eq!(err.kind, ErrorKind::FailedPrecondition);
//! assert!(err.to_string().contains("_time"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of engine failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad user specification: empty `on`, unknown method, type drift on an
    /// `on` column between arriving tables.
    Invalid,
    /// Runtime schema violation: missing `on` column at match time,
    /// incompatible types across sides, conflicting buffer schemas.
    FailedPrecondition,
    /// The allocator's byte budget was exceeded.
    ResourceExhausted,
    /// The operation is not supported (table retraction).
    Unimplemented,
    /// An internal invariant was violated.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name for logs and serialized payloads.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Invalid => "invalid",
            ErrorKind::FailedPrecondition => "failed precondition",
            ErrorKind::ResourceExhausted => "resource exhausted",
            ErrorKind::Unimplemented => "unimplemented",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A terminal engine error with diagnostic context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineError {
    /// The failure classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Column labels involved, if any.
    pub labels: Vec<String>,
    /// Rendering of the group key involved, if any.
    pub key: Option<String>,
}

impl EngineError {
    /// Create an error of the given kind.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            labels: Vec::new(),
            key: None,
        }
    }

    /// A bad user specification.
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    /// A runtime schema violation.
    pub fn failed_precondition<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    /// Allocator budget exceeded.
    pub fn resource_exhausted<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    /// Unsupported operation.
    pub fn unimplemented<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unimplemented, message)
    }

    /// Violated internal invariant.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach an offending column label.
    #[must_use]
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Attach several offending column labels.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Attach a rendering of the group key involved.
    #[must_use]
    pub fn with_key<K: fmt::Display>(mut self, key: K) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.labels.is_empty() {
            write!(f, " (columns: {})", self.labels.join(", "))?;
        }
        if let Some(ref key) = self.key {
            write!(f, " (group key: {key})")?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
