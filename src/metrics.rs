//! Prometheus metrics sink for circuit breaker adapters
//!
//! The engine itself records nothing; transport adapters and harnesses drive
//! this sink on its behalf. Rejection latency is deliberately not observed:
//! a fail-fast rejection says nothing about downstream latency.

use crate::State;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

/// Label value for successful outcomes in the duration histogram
pub const STATUS_SUCCESS: &str = "success";
/// Label value for failed outcomes in the duration histogram
pub const STATUS_FAILURE: &str = "failure";

/// Prometheus collectors for circuit breaker observability
#[derive(Clone)]
pub struct Metrics {
    requests: CounterVec,
    successes: CounterVec,
    failures: CounterVec,
    rejections: CounterVec,
    state_changes: CounterVec,
    current_state: GaugeVec,
    request_duration: HistogramVec,
}

impl Metrics {
    /// Create the collectors under the given namespace and register them
    /// with the registry.
    pub fn register(namespace: &str, registry: &Registry) -> prometheus::Result<Self> {
        let requests = CounterVec::new(
            Opts::new("circuit_breaker_requests_total", "Total number of requests")
                .namespace(namespace),
            &["name"],
        )?;
        let successes = CounterVec::new(
            Opts::new(
                "circuit_breaker_successes_total",
                "Total number of successful requests",
            )
            .namespace(namespace),
            &["name"],
        )?;
        let failures = CounterVec::new(
            Opts::new(
                "circuit_breaker_failures_total",
                "Total number of failed requests",
            )
            .namespace(namespace),
            &["name"],
        )?;
        let rejections = CounterVec::new(
            Opts::new(
                "circuit_breaker_rejections_total",
                "Total number of rejected requests (circuit open or probe budget exhausted)",
            )
            .namespace(namespace),
            &["name"],
        )?;
        let state_changes = CounterVec::new(
            Opts::new(
                "circuit_breaker_state_changes_total",
                "Total number of state changes",
            )
            .namespace(namespace),
            &["name", "from", "to"],
        )?;
        let current_state = GaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Current state of the circuit breaker (0=closed, 1=half-open, 2=open)",
            )
            .namespace(namespace),
            &["name"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "circuit_breaker_request_duration_seconds",
                "Request duration in seconds",
            )
            .namespace(namespace),
            &["name", "status"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(successes.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(rejections.clone()))?;
        registry.register(Box::new(state_changes.clone()))?;
        registry.register(Box::new(current_state.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            requests,
            successes,
            failures,
            rejections,
            state_changes,
            current_state,
            request_duration,
        })
    }

    /// Record an attempted request
    pub fn record_request(&self, name: &str) {
        self.requests.with_label_values(&[name]).inc();
    }

    /// Record a successful request
    pub fn record_success(&self, name: &str) {
        self.successes.with_label_values(&[name]).inc();
    }

    /// Record a failed request
    pub fn record_failure(&self, name: &str) {
        self.failures.with_label_values(&[name]).inc();
    }

    /// Record a rejected request
    pub fn record_rejection(&self, name: &str) {
        self.rejections.with_label_values(&[name]).inc();
    }

    /// Record a state change and move the state gauge
    pub fn record_state_change(&self, name: &str, from: State, to: State) {
        self.state_changes
            .with_label_values(&[name, &from.to_string(), &to.to_string()])
            .inc();
        self.current_state
            .with_label_values(&[name])
            .set(f64::from(to.code()));
    }

    /// Record a request duration labelled by outcome status
    pub fn record_duration(&self, name: &str, status: &str, seconds: f64) {
        self.request_duration
            .with_label_values(&[name, status])
            .observe(seconds);
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
