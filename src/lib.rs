//! Breakwater - a circuit breaker decision engine
//!
//! This crate guards invocations of an unreliable downstream dependency with:
//! - A three-state engine (Closed → Open → Half-Open) with lazy, lock-scoped
//!   transitions and generation-token bookkeeping
//! - A time-bucketed sliding window for rate-based tripping
//! - A slow-call detector for latency-driven degradation
//! - Guarded execution entry points, including cancellable and deadline-bound
//!   variants and fallback composition
//!
//! # Example
//!
//! ```rust
//! use breakwater::{CircuitBreaker, Config};
//!
//! let breaker = CircuitBreaker::new("payment_api", Config::default());
//!
//! // Execute with circuit protection
//! let result = breaker.execute(|| {
//!     // Your service call here
//!     Ok::<_, String>("success")
//! });
//! assert!(result.is_ok());
//!
//! // Inspect the engine
//! println!("state: {}", breaker.state());
//! ```

pub mod builder;
pub mod bulkhead;
pub mod callbacks;
pub mod cancel;
pub mod circuit;
pub mod classifier;
pub mod errors;
pub mod fallback;
pub mod metrics;
pub mod slow;
pub mod transport;
pub mod window;

pub use builder::CircuitBuilder;
pub use bulkhead::{ConcurrencyLimit, InflightGuard};
pub use callbacks::{Callbacks, StateChangeFn};
pub use cancel::{CancelToken, Canceller};
pub use circuit::{CircuitBreaker, Config, TripFn};
pub use classifier::{DefaultClassifier, FailureContext, PredicateClassifier, SuccessClassifier};
pub use errors::CircuitError;
pub use metrics::Metrics;
pub use slow::{SlowCallConfig, SlowCallDetector};
pub use window::{SlidingWindow, WindowCounts, WindowPolicy};

use std::fmt;

/// Engine state for a circuit breaker instance.
///
/// The numeric form (0, 1, 2) is stable and consumed by the metrics gauge;
/// the textual form ("closed", "half-open", "open") is stable and used in
/// notifications and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Normal operation, requests pass through.
    Closed = 0,
    /// Cautious probing after the cool-off, a bounded number of requests pass.
    HalfOpen = 1,
    /// Fail-fast mode, requests are rejected without invoking work.
    Open = 2,
}

impl State {
    /// Stable numeric rendering used by the metrics sink.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::HalfOpen => write!(f, "half-open"),
            State::Open => write!(f, "open"),
        }
    }
}

/// Outcome tallies for the current generation.
///
/// `total_successes + total_failures` may lag behind `requests`: the gap is
/// invocations still in flight, or outcomes discarded because their admission
/// generation no longer matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Admitted invocations.
    pub requests: u32,
    /// Invocations whose outcome was classified as success.
    pub total_successes: u32,
    /// Invocations whose outcome was classified as failure.
    pub total_failures: u32,
    /// Current run of successes; zeroed by any failure.
    pub consecutive_successes: u32,
    /// Current run of failures; zeroed by any success.
    pub consecutive_failures: u32,
}

impl Counts {
    pub(crate) fn on_request(&mut self) {
        self.requests += 1;
    }

    pub(crate) fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    pub(crate) fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    pub(crate) fn clear(&mut self) {
        *self = Counts::default();
    }
}
