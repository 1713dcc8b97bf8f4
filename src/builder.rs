//! Builder API for ergonomic circuit breaker configuration

use crate::{
    Counts, State,
    callbacks::Callbacks,
    circuit::{CircuitBreaker, Config},
    classifier::SuccessClassifier,
    slow::SlowCallConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with a fluent API
pub struct CircuitBuilder {
    name: String,
    config: Config,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            callbacks: Callbacks::new(),
        }
    }

    /// Maximum number of probe requests allowed through while half-open
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    /// Cyclic period of the closed state after which counts are cleared.
    /// Zero disables the periodic reset.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Cool-off period of the open state before the circuit may probe
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Custom trip predicate, consulted with a snapshot of the counts after
    /// every failure in the closed state
    pub fn ready_to_trip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Counts) -> bool + Send + Sync + 'static,
    {
        self.config.ready_to_trip = Some(Arc::new(predicate));
        self
    }

    /// Decide which failure values count as failures.
    ///
    /// Use this to forgive "expected" failures like client-side errors while
    /// still tripping on genuine downstream unhealth.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use breakwater::{CircuitBreaker, PredicateClassifier};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let breaker = CircuitBreaker::builder("api")
    ///     .classifier(Arc::new(PredicateClassifier::new(|ctx| {
    ///         // Only fast failures are forgiven
    ///         ctx.duration < Duration::from_secs(1)
    ///     })))
    ///     .build();
    /// ```
    pub fn classifier(mut self, classifier: Arc<dyn SuccessClassifier>) -> Self {
        self.config.classifier = Some(classifier);
        self
    }

    /// Thresholds for slow-call detectors built for this circuit
    pub fn slow_call(mut self, slow_call: SlowCallConfig) -> Self {
        self.config.slow_call = slow_call;
        self
    }

    /// Cap on simultaneously in-flight invocations.
    ///
    /// At capacity, entry points reject with
    /// [`CircuitError::Saturated`](crate::CircuitError::Saturated) without
    /// consulting the state machine.
    ///
    /// # Panics
    ///
    /// The built circuit panics at construction if `limit` is 0.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = Some(limit);
        self
    }

    /// Notifier invoked on every state change with (name, from, to).
    ///
    /// Runs inside the engine's critical section on the transitioning thread;
    /// it must be non-blocking and must not call back into the instance.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.callbacks.on_state_change = Some(Arc::new(f));
        self
    }

    /// Hook invoked when the circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Hook invoked when the circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Hook invoked when the circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::with_callbacks(self.name, self.config, self.callbacks)
    }
}
