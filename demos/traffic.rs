//! Synthetic traffic demo
//!
//! Drives a circuit with a downstream whose health varies over time:
//! attempts 1-10 fail ~70% of the time (tripping the circuit), attempts
//! 11-20 fail ~30% (recovery probing), and attempts 21+ are healthy. Engine
//! transitions are logged as they happen, and the Prometheus text exposition
//! is printed at the end.

use breakwater::metrics::{Metrics, STATUS_FAILURE, STATUS_SUCCESS};
use breakwater::transport::{HttpError, is_http_success};
use breakwater::{CircuitBreaker, SlidingWindow, WindowPolicy};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let registry = Registry::new();
    let metrics = Metrics::register("demo", &registry).expect("register collectors");

    let policy = WindowPolicy {
        size: Duration::from_secs(10),
        buckets: 10,
        min_requests: 3,
        failure_rate_threshold: 0.6,
    };
    let window = Arc::new(SlidingWindow::new(policy.size, policy.buckets));
    let trip = policy.ready_to_trip(Arc::clone(&window));

    let notifier_metrics = metrics.clone();
    let breaker = CircuitBreaker::builder("example-service")
        .max_requests(3)
        .timeout(Duration::from_secs(2))
        .interval(Duration::from_secs(10))
        .ready_to_trip(move |counts| (*trip)(counts))
        .on_state_change(move |name, from, to| {
            notifier_metrics.record_state_change(name, from, to);
        })
        .build();

    println!("Circuit breaker demo: downstream health varies over time\n");

    for attempt in 1..=50u32 {
        let status = simulated_status(attempt);
        let started = Instant::now();

        metrics.record_request(breaker.name());
        let result = breaker.execute(|| {
            if is_http_success(status) {
                Ok(status)
            } else {
                Err(HttpError { status })
            }
        });
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(status) => {
                window.record(true);
                metrics.record_success(breaker.name());
                metrics.record_duration(breaker.name(), STATUS_SUCCESS, elapsed);
                tracing::info!(attempt, status = *status, "request succeeded");
            }
            Err(err) if err.is_rejection() => {
                metrics.record_rejection(breaker.name());
                tracing::warn!(attempt, "request rejected (fast fail)");
            }
            Err(err) => {
                window.record(false);
                metrics.record_failure(breaker.name());
                metrics.record_duration(breaker.name(), STATUS_FAILURE, elapsed);
                tracing::warn!(attempt, error = %err, "request failed");
            }
        }

        let counts = breaker.counts();
        tracing::info!(
            state = %breaker.state(),
            requests = counts.requests,
            successes = counts.total_successes,
            failures = counts.total_failures,
            consecutive_failures = counts.consecutive_failures,
            "engine"
        );

        std::thread::sleep(Duration::from_millis(100));
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .expect("encode metrics");
    println!("\n{}", String::from_utf8(buffer).expect("text exposition is utf-8"));
}

/// Downstream health per attempt number
fn simulated_status(attempt: u32) -> u16 {
    let failure_rate = if attempt <= 10 {
        0.7
    } else if attempt <= 20 {
        0.3
    } else {
        0.0
    };

    if rand::random::<f64>() < failure_rate {
        500
    } else {
        200
    }
}
