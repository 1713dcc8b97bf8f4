//! Concurrency limiting for guarded invocations
//!
//! An optional cap on the number of invocations simultaneously in flight
//! through one circuit. At capacity, entry points reject immediately with a
//! distinct error kind instead of queuing, so a stalled downstream cannot
//! exhaust the caller's threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free in-flight counter with a hard ceiling
#[derive(Debug)]
pub struct ConcurrencyLimit {
    limit: usize,
    in_flight: AtomicUsize,
}

impl ConcurrencyLimit {
    /// Create a limit of `limit` simultaneous invocations.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "concurrency limit must be greater than 0");
        Self {
            limit,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Claim a slot without blocking. Returns `None` at capacity.
    pub fn try_acquire(self: &Arc<Self>) -> Option<InflightGuard> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.limit {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(InflightGuard {
                        limit: Arc::clone(self),
                    });
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Slots currently claimed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Configured ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::Release);
    }
}

/// RAII handle for one claimed slot; released on drop, including on panic
#[derive(Debug)]
pub struct InflightGuard {
    limit: Arc<ConcurrencyLimit>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.limit.release();
    }
}
