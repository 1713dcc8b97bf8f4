//! Time-bucketed sliding window for rate-based tripping
//!
//! The window divides a fixed recent interval into equal-duration buckets and
//! maintains aggregated tallies incrementally, so rate queries are constant
//! amortized cost. Timestamps are offsets from a monotonic anchor taken at
//! construction, which keeps the arithmetic immune to wall-clock skew.

use crate::Counts;
use crate::circuit::TripFn;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_WINDOW_SIZE: Duration = Duration::from_secs(10);
const DEFAULT_BUCKET_COUNT: usize = 10;

/// Aggregated tallies over the live portion of the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub requests: u32,
    pub successes: u32,
    pub failures: u32,
}

#[derive(Debug)]
struct Bucket {
    /// Offset from the window origin, truncated to the bucket duration
    start: Duration,
    requests: u32,
    successes: u32,
    failures: u32,
}

#[derive(Debug, Default)]
struct WindowInner {
    /// Oldest first, newest last
    buckets: VecDeque<Bucket>,
    total: WindowCounts,
}

/// Sliding window of request outcomes over a fixed recent interval.
///
/// Writers take the exclusive side of the lock; readers share. A bucket is
/// live iff its start offset is strictly after `now - size`: a bucket exactly
/// on the boundary is expired.
#[derive(Debug)]
pub struct SlidingWindow {
    size: Duration,
    bucket_len: Duration,
    bucket_count: usize,
    origin: Instant,
    inner: RwLock<WindowInner>,
    /// Packed `(requests << 32) | failures` as of the most recent write.
    /// Read by [`snapshot`](Self::snapshot) without touching `inner`'s lock.
    packed_totals: AtomicU64,
    /// Offset of the write that published `packed_totals`, in nanoseconds
    packed_at: AtomicU64,
}

impl SlidingWindow {
    /// Create a window of the given total size divided into `bucket_count`
    /// buckets. A zero size falls back to 10 seconds, a zero bucket count to
    /// 10 buckets.
    pub fn new(size: Duration, bucket_count: usize) -> Self {
        let size = if size.is_zero() {
            DEFAULT_WINDOW_SIZE
        } else {
            size
        };
        let bucket_count = if bucket_count == 0 {
            DEFAULT_BUCKET_COUNT
        } else {
            bucket_count
        };

        Self {
            size,
            bucket_len: size / bucket_count as u32,
            bucket_count,
            origin: Instant::now(),
            inner: RwLock::new(WindowInner::default()),
            packed_totals: AtomicU64::new(0),
            packed_at: AtomicU64::new(0),
        }
    }

    /// Record one outcome into the bucket covering the current instant.
    pub fn record(&self, success: bool) {
        let now = self.origin.elapsed();
        let mut inner = self.inner.write();

        self.expire(&mut inner, now);

        let start = self.truncate(now);
        let reuse_newest = inner
            .buckets
            .back()
            .is_some_and(|bucket| bucket.start == start);
        if !reuse_newest {
            inner.buckets.push_back(Bucket {
                start,
                requests: 0,
                successes: 0,
                failures: 0,
            });
            // Bounded bucket count: newest wins, oldest is dropped
            if inner.buckets.len() > self.bucket_count {
                if let Some(oldest) = inner.buckets.pop_front() {
                    subtract(&mut inner.total, &oldest);
                }
            }
        }

        if let Some(bucket) = inner.buckets.back_mut() {
            bucket.requests += 1;
            if success {
                bucket.successes += 1;
            } else {
                bucket.failures += 1;
            }
        }

        inner.total.requests += 1;
        if success {
            inner.total.successes += 1;
        } else {
            inner.total.failures += 1;
        }

        self.publish(&inner, now);
    }

    /// Aggregated tallies over the live buckets.
    ///
    /// The reader is idempotent: buckets that have expired since the last
    /// write are subtracted from a copy of the aggregate, never from the
    /// window itself, so repeated reads within the same bucket boundary
    /// return the same counts.
    pub fn counts(&self) -> WindowCounts {
        let cutoff = self.origin.elapsed().checked_sub(self.size);
        let inner = self.inner.read();

        let mut counts = inner.total;
        let Some(cutoff) = cutoff else {
            return counts;
        };
        // Buckets are ordered oldest first; stop at the first live one
        for bucket in &inner.buckets {
            if bucket.start > cutoff {
                break;
            }
            counts.requests -= bucket.requests;
            counts.successes -= bucket.successes;
            counts.failures -= bucket.failures;
        }
        counts
    }

    /// Failures divided by requests; 0.0 with no traffic.
    pub fn failure_rate(&self) -> f64 {
        let counts = self.counts();
        if counts.requests == 0 {
            0.0
        } else {
            f64::from(counts.failures) / f64::from(counts.requests)
        }
    }

    /// Successes divided by requests; 1.0 with no traffic.
    pub fn success_rate(&self) -> f64 {
        let counts = self.counts();
        if counts.requests == 0 {
            1.0
        } else {
            f64::from(counts.successes) / f64::from(counts.requests)
        }
    }

    /// Lock-free aggregate as of the most recent write.
    ///
    /// For contexts that must not take the window's lock: the engine consults
    /// trip predicates inside its own critical section, so a window-derived
    /// predicate reads this snapshot instead of [`counts`](Self::counts).
    /// Returns zeroes once the publishing write has itself left the window.
    pub fn snapshot(&self) -> WindowCounts {
        let taken_at = Duration::from_nanos(self.packed_at.load(Ordering::Acquire));
        if let Some(cutoff) = self.origin.elapsed().checked_sub(self.size) {
            if taken_at <= cutoff {
                return WindowCounts::default();
            }
        }

        let packed = self.packed_totals.load(Ordering::Acquire);
        let requests = (packed >> 32) as u32;
        let failures = packed as u32;
        WindowCounts {
            requests,
            // Every recorded request is either a success or a failure
            successes: requests - failures,
            failures,
        }
    }

    /// Drop every bucket and zero the aggregate.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.buckets.clear();
        inner.total = WindowCounts::default();
        self.publish(&inner, self.origin.elapsed());
    }

    fn expire(&self, inner: &mut WindowInner, now: Duration) {
        let Some(cutoff) = now.checked_sub(self.size) else {
            return;
        };
        while inner
            .buckets
            .front()
            .is_some_and(|bucket| bucket.start <= cutoff)
        {
            if let Some(expired) = inner.buckets.pop_front() {
                subtract(&mut inner.total, &expired);
            }
        }
    }

    fn truncate(&self, offset: Duration) -> Duration {
        let len = self.bucket_len.as_nanos();
        Duration::from_nanos(((offset.as_nanos() / len) * len) as u64)
    }

    /// Publish the aggregate for lock-free readers. Called with the write
    /// lock held, after the totals are current.
    fn publish(&self, inner: &WindowInner, now: Duration) {
        let packed = (u64::from(inner.total.requests) << 32) | u64::from(inner.total.failures);
        self.packed_totals.store(packed, Ordering::Release);
        self.packed_at.store(now.as_nanos() as u64, Ordering::Release);
    }
}

fn subtract(total: &mut WindowCounts, bucket: &Bucket) {
    total.requests -= bucket.requests;
    total.successes -= bucket.successes;
    total.failures -= bucket.failures;
}

/// Parameters for window-based tripping
#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    /// Total window size
    pub size: Duration,
    /// Number of buckets the window is divided into
    pub buckets: usize,
    /// Minimum live requests before the failure rate is evaluated
    pub min_requests: u32,
    /// Failure rate at or above which the predicate trips (0.0-1.0)
    pub failure_rate_threshold: f64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            size: DEFAULT_WINDOW_SIZE,
            buckets: DEFAULT_BUCKET_COUNT,
            min_requests: 10,
            failure_rate_threshold: 0.5,
        }
    }
}

impl WindowPolicy {
    /// Produce a trip predicate over the given window: trips when the window
    /// holds at least `min_requests` requests and the failure rate is at or
    /// above the threshold.
    ///
    /// The predicate is consulted from inside the engine's critical section,
    /// where the window's lock must not be taken; it reads the window through
    /// [`SlidingWindow::snapshot`], so it never blocks on concurrent writers.
    pub fn ready_to_trip(self, window: Arc<SlidingWindow>) -> TripFn {
        Arc::new(move |_: Counts| {
            let counts = window.snapshot();
            if counts.requests < self.min_requests {
                return false;
            }
            f64::from(counts.failures) / f64::from(counts.requests)
                >= self.failure_rate_threshold
        })
    }
}
