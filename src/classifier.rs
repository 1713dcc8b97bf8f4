//! Success classification for failure values
//!
//! This module decides which failure values returned by guarded work should
//! count as failures for the engine's bookkeeping, and which should be
//! treated as successes (for example a client-side error that says nothing
//! about downstream health).

use std::any::Any;
use std::time::Duration;

/// Context provided to classifiers for evaluating a failure value
#[derive(Debug)]
pub struct FailureContext<'a> {
    /// Circuit name
    pub circuit: &'a str,
    /// The failure value returned by the work (can be downcast to its type)
    pub failure: &'a dyn Any,
    /// Measured duration of the invocation
    pub duration: Duration,
}

/// Trait for classifying failure values.
///
/// When guarded work returns a failure value, the engine asks the configured
/// classifier whether that value should nonetheless be recorded as a success.
/// Returning `false` records a failure. With no classifier configured, every
/// failure value is a failure.
///
/// # Examples
///
/// ```rust
/// use breakwater::{FailureContext, SuccessClassifier};
///
/// #[derive(Debug)]
/// struct ClientErrorsAreFine;
///
/// impl SuccessClassifier for ClientErrorsAreFine {
///     fn is_success(&self, ctx: &FailureContext<'_>) -> bool {
///         ctx.failure
///             .downcast_ref::<u16>()
///             .map(|status| *status < 500)
///             .unwrap_or(false)
///     }
/// }
/// ```
pub trait SuccessClassifier: Send + Sync {
    /// Returns `true` if this failure value should be counted as a success.
    fn is_success(&self, ctx: &FailureContext<'_>) -> bool;
}

/// Default classifier: the absence of a failure value is the only success
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl SuccessClassifier for DefaultClassifier {
    fn is_success(&self, _ctx: &FailureContext<'_>) -> bool {
        false
    }
}

/// Predicate-based classifier using a closure
pub struct PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    /// Create a new predicate-based classifier
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> SuccessClassifier for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn is_success(&self, ctx: &FailureContext<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl<F> std::fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classifier_counts_all_failures() {
        let classifier = DefaultClassifier;
        let ctx = FailureContext {
            circuit: "test",
            failure: &"any error" as &dyn Any,
            duration: Duration::from_millis(100),
        };

        assert!(!classifier.is_success(&ctx));
    }

    #[test]
    fn test_predicate_classifier_on_duration() {
        // Fast failures are forgiven, slow ones count
        let classifier =
            PredicateClassifier::new(|ctx| ctx.duration < Duration::from_secs(1));

        let fast = FailureContext {
            circuit: "test",
            failure: &"fast error" as &dyn Any,
            duration: Duration::from_millis(500),
        };
        let slow = FailureContext {
            circuit: "test",
            failure: &"slow error" as &dyn Any,
            duration: Duration::from_secs(2),
        };

        assert!(classifier.is_success(&fast));
        assert!(!classifier.is_success(&slow));
    }

    #[test]
    fn test_failure_value_downcast() {
        #[derive(Debug)]
        struct ApiError {
            server_side: bool,
        }

        let classifier = PredicateClassifier::new(|ctx| {
            ctx.failure
                .downcast_ref::<ApiError>()
                .map(|e| !e.server_side)
                .unwrap_or(false)
        });

        let server = FailureContext {
            circuit: "test",
            failure: &ApiError { server_side: true } as &dyn Any,
            duration: Duration::ZERO,
        };
        let client = FailureContext {
            circuit: "test",
            failure: &ApiError { server_side: false } as &dyn Any,
            duration: Duration::ZERO,
        };

        assert!(!classifier.is_success(&server));
        assert!(classifier.is_success(&client));
    }
}
