//! Slow-call detection
//!
//! Latency-driven degradation is its own failure signal: a downstream that
//! answers, but slowly, never shows up in the failure counters. The detector
//! keeps an independent tally of calls whose measured duration exceeds a
//! threshold.

use std::time::Duration;

const DEFAULT_SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(5);
const DEFAULT_SLOW_CALL_RATE: f64 = 0.5;

/// Thresholds for slow-call detection
#[derive(Debug, Clone, Copy)]
pub struct SlowCallConfig {
    /// Calls strictly longer than this are slow
    pub threshold: Duration,
    /// Slow-call rate at or above which the detector trips (0.0-1.0)
    pub rate_threshold: f64,
}

impl Default for SlowCallConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SLOW_CALL_THRESHOLD,
            rate_threshold: DEFAULT_SLOW_CALL_RATE,
        }
    }
}

/// Tracks call durations and flags latency-driven degradation
#[derive(Debug)]
pub struct SlowCallDetector {
    config: SlowCallConfig,
    slow_calls: u32,
    total_calls: u32,
}

impl SlowCallDetector {
    /// Create a detector. A zero threshold falls back to 5 seconds, a zero
    /// rate threshold to 0.5.
    pub fn new(mut config: SlowCallConfig) -> Self {
        if config.threshold.is_zero() {
            config.threshold = DEFAULT_SLOW_CALL_THRESHOLD;
        }
        if config.rate_threshold == 0.0 {
            config.rate_threshold = DEFAULT_SLOW_CALL_RATE;
        }

        Self {
            config,
            slow_calls: 0,
            total_calls: 0,
        }
    }

    /// Record one call duration.
    pub fn record(&mut self, duration: Duration) {
        self.total_calls += 1;
        if duration > self.config.threshold {
            self.slow_calls += 1;
        }
    }

    /// Slow calls divided by total calls; 0.0 with no traffic.
    pub fn slow_call_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            f64::from(self.slow_calls) / f64::from(self.total_calls)
        }
    }

    /// True iff the slow-call rate has reached the configured threshold.
    pub fn should_trip(&self) -> bool {
        self.slow_call_rate() >= self.config.rate_threshold
    }

    /// Zero both tallies.
    pub fn reset(&mut self) {
        self.slow_calls = 0;
        self.total_calls = 0;
    }
}
