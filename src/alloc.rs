//! Byte-budgeted memory accounting for column storage.
//!
//! All column memory in the engine flows through an injected [`Allocator`] so
//! a query's working set can be accounted against a budget. The allocator does
//! not allocate anything itself; builders call [`Allocator::grow`] before
//! growing their vectors and [`Allocator::shrink`] when storage is released,
//! and the allocator merely keeps the books. Exceeding the budget surfaces as
//! a `ResourceExhausted` error, which is fatal to the query.
//!
//! The handle is cheaply cloneable; all clones share one ledger.

use crate::errors::{EngineError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared memory-accounting handle.
///
/// # Example
///
/// ```
/// use tablestream::alloc::Allocator;
///
/// let alloc = Allocator::with_budget(1024);
/// alloc.grow(512).unwrap();
/// assert_eq!(alloc.allocated(), 512);
/// assert!(alloc.grow(1024).is_err());
/// alloc.shrink(512);
/// assert_eq!(alloc.allocated(), 0);
/// assert_eq!(alloc.max_allocated(), 512);
/// ```
#[derive(Clone, Debug)]
pub struct Allocator {
    inner: Arc<AllocatorInner>,
}

#[derive(Debug)]
struct AllocatorInner {
    /// Budget in bytes; `None` means unlimited.
    limit: Option<usize>,
    used: AtomicUsize,
    peak: AtomicUsize,
}

impl Allocator {
    /// An allocator with no budget.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                limit: None,
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// An allocator that rejects growth past `bytes`.
    #[must_use]
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                limit: Some(bytes),
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Account `bytes` of new column storage.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the growth would exceed the budget; the ledger
    /// is left unchanged in that case.
    pub fn grow(&self, bytes: usize) -> Result<()> {
        let prev = self.inner.used.fetch_add(bytes, Ordering::Relaxed);
        let now = prev + bytes;
        if let Some(limit) = self.inner.limit {
            if now > limit {
                self.inner.used.fetch_sub(bytes, Ordering::Relaxed);
                return Err(EngineError::resource_exhausted(format!(
                    "allocation of {bytes} bytes exceeds budget ({prev} of {limit} bytes in use)"
                )));
            }
        }
        self.inner.peak.fetch_max(now, Ordering::Relaxed);
        Ok(())
    }

    /// Return `bytes` of column storage to the budget.
    pub fn shrink(&self, bytes: usize) {
        self.inner.used.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Bytes currently accounted.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    /// High-water mark of accounted bytes.
    #[must_use]
    pub fn max_allocated(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::unlimited()
    }
}
