//! The circuit breaker decision engine
//!
//! This module owns the finite state machine, the outcome bookkeeping, the
//! generation token that keeps concurrent outcome reports consistent across
//! state changes, and the synchronous guarded entry point.
//!
//! All mutable engine state lives behind a single exclusive lock. The lock is
//! held only across admission and completion bookkeeping, never across the
//! caller's work. Transitions are lazy: the Open → Half-Open move and the
//! periodic counter reset in Closed happen on whichever thread next asks for
//! the current state or attempts admission.

use crate::{
    Counts, State,
    bulkhead::{ConcurrencyLimit, InflightGuard},
    callbacks::{Callbacks, StateChangeFn},
    classifier::{FailureContext, SuccessClassifier},
    errors::CircuitError,
    slow::SlowCallConfig,
};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Trip predicate: receives a snapshot of the current counts after a failure
/// in Closed and decides whether the circuit opens.
///
/// Runs inside the engine's critical section on the failing caller's thread.
/// Like the state-change notifier, it must be non-blocking: no lock
/// acquisition, no I/O, no calls back into the instance's entry points.
/// [`WindowPolicy::ready_to_trip`](crate::window::WindowPolicy::ready_to_trip)
/// honors this by reading its window through
/// [`SlidingWindow::snapshot`](crate::window::SlidingWindow::snapshot)
/// instead of the window's lock.
pub type TripFn = Arc<dyn Fn(Counts) -> bool + Send + Sync>;

/// Circuit breaker configuration
#[derive(Clone)]
pub struct Config {
    /// Maximum requests allowed through while half-open.
    /// A value of 0 is treated as 1.
    pub max_requests: u32,

    /// Cyclic period of the closed state after which the counts are cleared.
    /// Zero disables the periodic reset.
    pub interval: Duration,

    /// Cool-off period of the open state, after which the circuit becomes
    /// eligible to probe. Zero is treated as 60 seconds.
    pub timeout: Duration,

    /// Called with a snapshot of the counts whenever a request fails in the
    /// closed state; returning true opens the circuit.
    /// Defaults to "more than 5 consecutive failures".
    /// Runs under the engine's lock; see [`TripFn`] for its obligations.
    pub ready_to_trip: Option<TripFn>,

    /// Called on every state change with (name, previous state, new state).
    pub on_state_change: Option<StateChangeFn>,

    /// Decides whether a failure value returned by the work should count as
    /// a success. With no classifier, every failure value is a failure.
    pub classifier: Option<Arc<dyn SuccessClassifier>>,

    /// Thresholds handed to slow-call detectors built for this circuit.
    pub slow_call: SlowCallConfig,

    /// Cap on simultaneously in-flight invocations. `None` disables it.
    pub max_concurrency: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_requests: 1,
            interval: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            ready_to_trip: None,
            on_state_change: None,
            classifier: None,
            slow_call: SlowCallConfig::default(),
            max_concurrency: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field(
                "ready_to_trip",
                &self.ready_to_trip.as_ref().map(|_| "<fn>"),
            )
            .field(
                "on_state_change",
                &self.on_state_change.as_ref().map(|_| "<fn>"),
            )
            .field(
                "classifier",
                &self.classifier.as_ref().map(|_| "<dyn SuccessClassifier>"),
            )
            .field("slow_call", &self.slow_call)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

/// Mutable engine state, all of it behind one lock
#[derive(Debug)]
struct Shared {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Circuit breaker instance guarding one logical downstream endpoint.
///
/// Safe to share across threads behind an `Arc`; every entry point takes
/// `&self`.
pub struct CircuitBreaker {
    name: String,
    max_requests: u32,
    interval: Duration,
    timeout: Duration,
    ready_to_trip: TripFn,
    classifier: Option<Arc<dyn SuccessClassifier>>,
    callbacks: Callbacks,
    limit: Option<Arc<ConcurrencyLimit>>,
    slow_call: SlowCallConfig,
    shared: Mutex<Shared>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use `builder()` for more options)
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        let callbacks = Callbacks {
            on_state_change: config.on_state_change.clone(),
            ..Callbacks::new()
        };
        Self::with_callbacks(name, config, callbacks)
    }

    /// Create a circuit breaker with explicit callbacks (used by the builder)
    pub(crate) fn with_callbacks(
        name: impl Into<String>,
        config: Config,
        mut callbacks: Callbacks,
    ) -> Self {
        if callbacks.on_state_change.is_none() {
            callbacks.on_state_change = config.on_state_change.clone();
        }

        let max_requests = if config.max_requests == 0 {
            1
        } else {
            config.max_requests
        };
        let timeout = if config.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            config.timeout
        };
        let ready_to_trip = config
            .ready_to_trip
            .unwrap_or_else(|| Arc::new(|counts: Counts| counts.consecutive_failures > 5));
        let limit = config.max_concurrency.map(|n| Arc::new(ConcurrencyLimit::new(n)));

        let breaker = Self {
            name: name.into(),
            max_requests,
            interval: config.interval,
            timeout,
            ready_to_trip,
            classifier: config.classifier,
            callbacks,
            limit,
            slow_call: config.slow_call,
            shared: Mutex::new(Shared {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: None,
            }),
        };

        // Enter the first generation
        {
            let mut shared = breaker.shared.lock();
            breaker.to_new_generation(&mut shared, Instant::now());
        }

        breaker
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective current state. Evaluates lazy transitions, so asking for the
    /// state can itself move an expired Open circuit to Half-Open.
    pub fn state(&self) -> State {
        let now = Instant::now();
        let mut shared = self.shared.lock();
        self.current_state(&mut shared, now).0
    }

    /// Snapshot of the current generation's counts
    pub fn counts(&self) -> Counts {
        self.shared.lock().counts
    }

    /// Slow-call thresholds configured for this circuit
    pub fn slow_call_config(&self) -> SlowCallConfig {
        self.slow_call
    }

    /// Execute a fallible operation with circuit protection.
    ///
    /// The work runs on the caller's thread. If admission is rejected the
    /// work is never invoked. A panic in the work records a failure and then
    /// resumes unwinding.
    pub fn execute<T, E, F>(&self, work: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: 'static,
    {
        let _slot = self.acquire_slot()?;
        let generation = self.before_request()?;

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(work));
        let result = match outcome {
            Ok(result) => result,
            Err(cause) => {
                self.after_request(generation, false);
                panic::resume_unwind(cause);
            }
        };

        match &result {
            Ok(_) => self.after_request(generation, true),
            Err(failure) => {
                let success = self.classify_failure(failure, start.elapsed());
                self.after_request(generation, success);
            }
        }

        result.map_err(CircuitError::Execution)
    }

    /// Claim a concurrency slot if a limit is configured
    pub(crate) fn acquire_slot<E>(&self) -> Result<Option<InflightGuard>, CircuitError<E>> {
        match &self.limit {
            None => Ok(None),
            Some(limit) => match limit.try_acquire() {
                Some(guard) => Ok(Some(guard)),
                None => {
                    debug!(circuit = %self.name, limit = limit.limit(), "rejected: saturated");
                    Err(CircuitError::Saturated {
                        circuit: self.name.clone(),
                        limit: limit.limit(),
                    })
                }
            },
        }
    }

    /// Admission: decide whether the invocation may proceed, and under which
    /// generation its outcome will be reported.
    pub(crate) fn before_request<E>(&self) -> Result<u64, CircuitError<E>> {
        let now = Instant::now();
        let mut shared = self.shared.lock();
        let (state, generation) = self.current_state(&mut shared, now);

        if state == State::Open {
            debug!(circuit = %self.name, "rejected: circuit open");
            return Err(CircuitError::Open {
                circuit: self.name.clone(),
            });
        }
        if state == State::HalfOpen && shared.counts.requests >= self.max_requests {
            debug!(circuit = %self.name, "rejected: probe budget exhausted");
            return Err(CircuitError::TooManyRequests {
                circuit: self.name.clone(),
            });
        }

        shared.counts.on_request();
        Ok(generation)
    }

    /// Completion: apply the outcome, unless the generation has moved on
    /// since admission, in which case the outcome is discarded.
    pub(crate) fn after_request(&self, before: u64, success: bool) {
        let now = Instant::now();
        let mut shared = self.shared.lock();
        let (state, generation) = self.current_state(&mut shared, now);

        if generation != before {
            return;
        }

        if success {
            self.on_success(&mut shared, state, now);
        } else {
            self.on_failure(&mut shared, state, now);
        }
    }

    /// Ask the configured classifier whether this failure value counts as a
    /// success. With no classifier, it never does.
    pub(crate) fn classify_failure<E: 'static>(&self, failure: &E, duration: Duration) -> bool {
        match &self.classifier {
            Some(classifier) => classifier.is_success(&FailureContext {
                circuit: &self.name,
                failure: failure as &dyn Any,
                duration,
            }),
            None => false,
        }
    }

    fn on_success(&self, shared: &mut Shared, state: State, now: Instant) {
        match state {
            State::Closed => shared.counts.on_success(),
            State::HalfOpen => {
                shared.counts.on_success();
                if shared.counts.consecutive_successes >= self.max_requests {
                    self.set_state(shared, State::Closed, now);
                }
            }
            State::Open => {}
        }
    }

    fn on_failure(&self, shared: &mut Shared, state: State, now: Instant) {
        match state {
            State::Closed => {
                shared.counts.on_failure();
                if (*self.ready_to_trip)(shared.counts) {
                    self.set_state(shared, State::Open, now);
                }
            }
            State::HalfOpen => self.set_state(shared, State::Open, now),
            State::Open => {}
        }
    }

    /// Effective state at `now`, applying lazy transitions
    fn current_state(&self, shared: &mut Shared, now: Instant) -> (State, u64) {
        match shared.state {
            State::Closed => {
                if let Some(expiry) = shared.expiry {
                    if now >= expiry {
                        // Periodic rollover: same state, fresh generation
                        self.to_new_generation(shared, now);
                    }
                }
            }
            State::Open => {
                if let Some(expiry) = shared.expiry {
                    if now >= expiry {
                        self.set_state(shared, State::HalfOpen, now);
                    }
                }
            }
            State::HalfOpen => {}
        }

        (shared.state, shared.generation)
    }

    fn set_state(&self, shared: &mut Shared, state: State, now: Instant) {
        if shared.state == state {
            return;
        }

        let prev = shared.state;
        shared.state = state;
        self.to_new_generation(shared, now);

        info!(circuit = %self.name, from = %prev, to = %state, "state changed");
        self.callbacks.trigger(&self.name, prev, state);
    }

    fn to_new_generation(&self, shared: &mut Shared, now: Instant) {
        shared.generation += 1;
        shared.counts.clear();

        shared.expiry = match shared.state {
            State::Closed => {
                if self.interval.is_zero() {
                    None
                } else {
                    Some(now + self.interval)
                }
            }
            State::Open => Some(now + self.timeout),
            State::HalfOpen => None,
        };
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("shared", &*self.shared.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PredicateClassifier;
    use crate::window::{SlidingWindow, WindowPolicy};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn trip_after(failures: u32) -> Option<TripFn> {
        Some(Arc::new(move |counts: Counts| {
            counts.consecutive_failures >= failures
        }))
    }

    #[test]
    fn test_starts_closed() {
        let breaker = CircuitBreaker::new("test", Config::default());
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.name(), "test");
    }

    #[test]
    fn test_default_trip_is_strict() {
        // The default predicate is "more than 5": five consecutive failures
        // are not enough, the sixth trips.
        let breaker = CircuitBreaker::new("test", Config::default());

        for _ in 0..5 {
            let _ = breaker.execute(|| Err::<(), _>("error"));
        }
        assert_eq!(breaker.state(), State::Closed);

        let _ = breaker.execute(|| Err::<(), _>("error"));
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn test_successes_keep_circuit_closed() {
        let breaker = CircuitBreaker::new("test", Config::default());

        for _ in 0..100 {
            let result = breaker.execute(|| Ok::<_, String>("fine"));
            assert!(result.is_ok());
        }
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn test_counts_snapshot() {
        let breaker = CircuitBreaker::new("test", Config::default());

        for _ in 0..3 {
            let _ = breaker.execute(|| Ok::<(), String>(()));
        }
        for _ in 0..2 {
            let _ = breaker.execute(|| Err::<(), _>("error"));
        }

        let counts = breaker.counts();
        assert_eq!(counts.requests, 5);
        assert_eq!(counts.total_successes, 3);
        assert_eq!(counts.total_failures, 2);
        assert_eq!(counts.consecutive_failures, 2);
        assert_eq!(counts.consecutive_successes, 0);
    }

    #[test]
    fn test_trip_on_consecutive_failures_and_fail_fast() {
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                max_requests: 1,
                timeout: Duration::from_millis(100),
                ready_to_trip: trip_after(3),
                ..Config::default()
            },
        );

        for _ in 0..3 {
            let _ = breaker.execute(|| Err::<(), _>("error"));
        }
        assert_eq!(breaker.state(), State::Open);

        // Rejected without invoking the work
        let invoked = AtomicBool::new(false);
        let result = breaker.execute(|| {
            invoked.store(true, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        assert!(matches!(result, Err(CircuitError::Open { .. })));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_recovery_through_half_open() {
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                max_requests: 2,
                timeout: Duration::from_millis(100),
                ready_to_trip: trip_after(3),
                ..Config::default()
            },
        );

        for _ in 0..3 {
            let _ = breaker.execute(|| Err::<(), _>("error"));
        }
        assert_eq!(breaker.state(), State::Open);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(breaker.state(), State::HalfOpen);

        // Two consecutive probe successes close the circuit
        let _ = breaker.execute(|| Ok::<(), String>(()));
        assert_eq!(breaker.state(), State::HalfOpen);
        let _ = breaker.execute(|| Ok::<(), String>(()));
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                max_requests: 2,
                timeout: Duration::from_millis(50),
                ready_to_trip: trip_after(2),
                ..Config::default()
            },
        );

        let _ = breaker.execute(|| Err::<(), _>("error"));
        let _ = breaker.execute(|| Err::<(), _>("error"));
        assert_eq!(breaker.state(), State::Open);

        thread::sleep(Duration::from_millis(100));

        let result = breaker.execute(|| Err::<(), _>("still down"));
        assert!(matches!(result, Err(CircuitError::Execution(_))));
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn test_half_open_probe_budget_with_inflight_probes() {
        let breaker = Arc::new(CircuitBreaker::new(
            "test",
            Config {
                max_requests: 3,
                timeout: Duration::from_millis(50),
                ready_to_trip: trip_after(1),
                ..Config::default()
            },
        ));

        let _ = breaker.execute(|| Err::<(), _>("error"));
        thread::sleep(Duration::from_millis(80));
        assert_eq!(breaker.state(), State::HalfOpen);

        // Hold three probes in flight
        let mut entered = Vec::new();
        let mut releases = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel::<()>();
            let breaker = Arc::clone(&breaker);
            handles.push(thread::spawn(move || {
                breaker.execute(move || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<(), String>(())
                })
            }));
            entered.push(entered_rx);
            releases.push(release_tx);
        }
        for rx in &entered {
            rx.recv().unwrap();
        }

        // Budget exhausted: the fourth admission is rejected
        let result = breaker.execute(|| Ok::<(), String>(()));
        assert!(matches!(result, Err(CircuitError::TooManyRequests { .. })));

        for tx in releases {
            tx.send(()).unwrap();
        }
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        // Three consecutive probe successes closed the circuit
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn test_stale_outcome_is_discarded() {
        let breaker = Arc::new(CircuitBreaker::new(
            "test",
            Config {
                ready_to_trip: trip_after(2),
                ..Config::default()
            },
        ));

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = {
            let breaker = Arc::clone(&breaker);
            thread::spawn(move || {
                breaker.execute(move || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<(), String>(())
                })
            })
        };
        entered_rx.recv().unwrap();

        // Trip the circuit while the first invocation is still in flight
        let _ = breaker.execute(|| Err::<(), _>("error"));
        let _ = breaker.execute(|| Err::<(), _>("error"));
        assert_eq!(breaker.state(), State::Open);

        // The stale success completes in a later generation: the caller still
        // receives it verbatim, but the engine must not count it
        release_tx.send(()).unwrap();
        assert!(worker.join().unwrap().is_ok());

        assert_eq!(breaker.state(), State::Open);
        assert_eq!(breaker.counts().total_successes, 0);
    }

    #[test]
    fn test_periodic_interval_clears_counts_in_closed() {
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                interval: Duration::from_millis(50),
                ..Config::default()
            },
        );

        let _ = breaker.execute(|| Ok::<(), String>(()));
        let _ = breaker.execute(|| Ok::<(), String>(()));
        assert_eq!(breaker.counts().requests, 2);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.counts(), Counts::default());
    }

    #[test]
    fn test_trip_predicate_called_once_per_closed_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let breaker = CircuitBreaker::new(
            "test",
            Config {
                max_requests: 1,
                timeout: Duration::from_millis(50),
                ready_to_trip: Some(Arc::new(move |counts: Counts| {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    counts.consecutive_failures >= 2
                })),
                ..Config::default()
            },
        );

        let _ = breaker.execute(|| Err::<(), _>("error"));
        let _ = breaker.execute(|| Err::<(), _>("error"));
        assert_eq!(breaker.state(), State::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Rejections in Open never consult the predicate
        let _ = breaker.execute(|| Ok::<(), String>(()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A half-open failure reopens unconditionally, without the predicate
        thread::sleep(Duration::from_millis(80));
        let _ = breaker.execute(|| Err::<(), _>("error"));
        assert_eq!(breaker.state(), State::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rate_based_tripping_under_window_contention() {
        let window = Arc::new(SlidingWindow::new(Duration::from_secs(10), 10));
        let policy = WindowPolicy {
            min_requests: 5,
            failure_rate_threshold: 0.5,
            ..WindowPolicy::default()
        };
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                ready_to_trip: Some(policy.ready_to_trip(Arc::clone(&window))),
                ..Config::default()
            },
        );

        // A reader thread keeps the window's lock busy while failures flow
        // through the engine's lock on this thread
        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let window = Arc::clone(&window);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    let _ = window.counts();
                    thread::yield_now();
                }
            })
        };

        for _ in 0..6 {
            window.record(false);
            let _ = breaker.execute(|| Err::<(), _>("error"));
        }
        assert_eq!(breaker.state(), State::Open);

        stop.store(true, Ordering::SeqCst);
        reader.join().unwrap();
    }

    #[test]
    fn test_notifier_fires_once_per_transition() {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let transitions_clone = transitions.clone();

        let breaker = CircuitBreaker::new(
            "probe",
            Config {
                max_requests: 1,
                timeout: Duration::from_millis(50),
                ready_to_trip: trip_after(1),
                on_state_change: Some(Arc::new(move |name, from, to| {
                    transitions_clone
                        .lock()
                        .push((name.to_string(), from, to));
                })),
                ..Config::default()
            },
        );

        let _ = breaker.execute(|| Err::<(), _>("error"));
        thread::sleep(Duration::from_millis(80));

        // The lazy probe-entry move fires the notifier too
        assert_eq!(breaker.state(), State::HalfOpen);
        let _ = breaker.execute(|| Ok::<(), String>(()));

        // Asking for the state again adds nothing
        assert_eq!(breaker.state(), State::Closed);

        let transitions = transitions.lock();
        assert_eq!(
            *transitions,
            vec![
                ("probe".to_string(), State::Closed, State::Open),
                ("probe".to_string(), State::Open, State::HalfOpen),
                ("probe".to_string(), State::HalfOpen, State::Closed),
            ]
        );
    }

    #[test]
    fn test_classifier_can_forgive_failures() {
        // Only server-side failures count
        let classifier = Arc::new(PredicateClassifier::new(|ctx| {
            ctx.failure
                .downcast_ref::<&str>()
                .map(|e| !e.contains("server"))
                .unwrap_or(false)
        }));

        let breaker = CircuitBreaker::new(
            "test",
            Config {
                ready_to_trip: trip_after(2),
                classifier: Some(classifier),
                ..Config::default()
            },
        );

        for _ in 0..5 {
            let _ = breaker.execute(|| Err::<(), _>("client_error"));
        }
        assert_eq!(breaker.state(), State::Closed);
        // Forgiven failures are recorded as successes
        assert_eq!(breaker.counts().total_successes, 5);

        let _ = breaker.execute(|| Err::<(), _>("server_error"));
        let _ = breaker.execute(|| Err::<(), _>("server_error"));
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn test_panic_in_work_counts_as_failure_and_propagates() {
        let breaker = CircuitBreaker::new("test", Config::default());

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = breaker.execute(|| -> Result<(), String> { panic!("boom") });
        }));
        assert!(result.is_err());

        let counts = breaker.counts();
        assert_eq!(counts.requests, 1);
        assert_eq!(counts.total_failures, 1);
        assert_eq!(counts.consecutive_failures, 1);
    }

    #[test]
    fn test_result_is_returned_verbatim() {
        let breaker = CircuitBreaker::new("test", Config::default());

        let ok = breaker.execute(|| Ok::<_, String>(42));
        assert_eq!(ok.unwrap(), 42);

        let err = breaker.execute(|| Err::<i32, _>("boom"));
        match err {
            Err(CircuitError::Execution(e)) => assert_eq!(e, "boom"),
            other => panic!("expected execution error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_saturation_rejects_before_admission() {
        let breaker = Arc::new(CircuitBreaker::new(
            "test",
            Config {
                max_concurrency: Some(1),
                ..Config::default()
            },
        ));

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = {
            let breaker = Arc::clone(&breaker);
            thread::spawn(move || {
                breaker.execute(move || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<(), String>(())
                })
            })
        };
        entered_rx.recv().unwrap();

        let result = breaker.execute(|| Ok::<(), String>(()));
        match result {
            Err(CircuitError::Saturated { circuit, limit }) => {
                assert_eq!(circuit, "test");
                assert_eq!(limit, 1);
            }
            other => panic!("expected saturation, got ok={}", other.is_ok()),
        }
        // Saturation is not an admission: no request was counted for it
        assert_eq!(breaker.counts().requests, 1);

        release_tx.send(()).unwrap();
        assert!(worker.join().unwrap().is_ok());

        let result = breaker.execute(|| Ok::<(), String>(()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_generation_is_monotonic() {
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                timeout: Duration::from_millis(50),
                ready_to_trip: trip_after(1),
                ..Config::default()
            },
        );

        let first = breaker.shared.lock().generation;
        let _ = breaker.execute(|| Err::<(), _>("error"));
        let second = breaker.shared.lock().generation;
        assert!(second > first);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(breaker.state(), State::HalfOpen);
        let third = breaker.shared.lock().generation;
        assert!(third > second);

        // Entering a generation always clears the counts
        assert_eq!(breaker.counts(), Counts::default());
    }
}
