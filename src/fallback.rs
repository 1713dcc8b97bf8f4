//! Fallback composition for guarded invocations
//!
//! A fallback receives every failure of the guarded call, rejections
//! included, and may substitute a result. The strategies below cover the
//! common shapes; none of them are part of the engine's contract.

use crate::circuit::CircuitBreaker;
use crate::errors::CircuitError;
use std::fmt;

impl CircuitBreaker {
    /// Execute a fallible operation; on any failure, rejection included,
    /// invoke the fallback with the failure value and return its result.
    ///
    /// When admission is rejected the work is never invoked, but the
    /// fallback still is, with the rejection as its input.
    pub fn execute_with_fallback<T, E, F, FB>(
        &self,
        work: F,
        fallback: FB,
    ) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        FB: FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>>,
        E: 'static,
    {
        self.execute(work).or_else(fallback)
    }
}

/// Return a fixed value for every failure.
pub fn constant<T, E>(value: T) -> impl FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>> {
    move |_| Ok(value)
}

/// Return the default value of `T` for every failure.
pub fn ignore<T: Default, E>() -> impl FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>> {
    |_| Ok(T::default())
}

/// Surface the failure unchanged.
pub fn passthrough<T, E>() -> impl FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>> {
    Err
}

/// Serve a cached value if one is available, otherwise surface the failure.
pub fn cached<T, E, G>(get: G) -> impl FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>>
where
    G: FnOnce() -> Option<T>,
{
    move |err| get().ok_or(err)
}

/// Wrap the failure with an explanatory message.
pub fn wrap_message<T, E>(
    message: &str,
) -> impl FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>> + '_
where
    E: From<String> + fmt::Display,
{
    move |err| Err(CircuitError::Execution(E::from(format!("{}: {}", message, err))))
}

/// Try fallbacks in order; the first to produce a value wins, otherwise the
/// original failure is surfaced.
#[allow(clippy::type_complexity)]
pub fn chained<T, E>(
    fallbacks: Vec<Box<dyn FnOnce(&CircuitError<E>) -> Option<T>>>,
) -> impl FnOnce(CircuitError<E>) -> Result<T, CircuitError<E>> {
    move |err| {
        for fallback in fallbacks {
            if let Some(value) = fallback(&err) {
                return Ok(value);
            }
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Config;
    use crate::{Counts, State};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn open_breaker() -> CircuitBreaker {
        let breaker = CircuitBreaker::new(
            "test",
            Config {
                ready_to_trip: Some(Arc::new(|c: Counts| c.consecutive_failures >= 1)),
                ..Config::default()
            },
        );
        let _ = breaker.execute(|| Err::<(), _>("error"));
        assert_eq!(breaker.state(), State::Open);
        breaker
    }

    #[test]
    fn test_fallback_receives_the_rejection() {
        let breaker = open_breaker();

        let invoked = AtomicBool::new(false);
        let result: Result<&str, _> = breaker.execute_with_fallback(
            || {
                invoked.store(true, Ordering::SeqCst);
                Ok::<_, String>("primary")
            },
            |err| {
                assert!(err.is_rejection());
                Ok("from fallback")
            },
        );

        assert_eq!(result.unwrap(), "from fallback");
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_fallback_receives_execution_failures() {
        let breaker = CircuitBreaker::new("test", Config::default());

        let result = breaker.execute_with_fallback(
            || Err::<i32, _>("boom".to_string()),
            |err| match err {
                CircuitError::Execution(e) => {
                    assert_eq!(e, "boom");
                    Ok(-1)
                }
                other => Err(other),
            },
        );

        assert_eq!(result.unwrap(), -1);
    }

    #[test]
    fn test_fallback_not_invoked_on_success() {
        let breaker = CircuitBreaker::new("test", Config::default());

        let result = breaker
            .execute_with_fallback(|| Ok::<_, String>(7), |_| panic!("must not run"));
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_constant_fallback() {
        let breaker = open_breaker();

        let result = breaker.execute_with_fallback(|| Ok::<_, String>(0), constant(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_ignore_fallback() {
        let breaker = open_breaker();

        let result: Result<Vec<u8>, _> =
            breaker.execute_with_fallback(|| Ok::<_, String>(vec![1]), ignore());
        assert_eq!(result.unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_cached_fallback() {
        let breaker = open_breaker();

        let hit = breaker
            .execute_with_fallback(|| Ok::<_, String>("live"), cached(|| Some("stale")));
        assert_eq!(hit.unwrap(), "stale");

        let miss: Result<&str, _> =
            breaker.execute_with_fallback(|| Ok::<_, String>("live"), cached(|| None));
        assert!(matches!(miss, Err(CircuitError::Open { .. })));
    }

    #[test]
    fn test_wrap_message_fallback() {
        let breaker = open_breaker();

        let result: Result<(), _> = breaker
            .execute_with_fallback(|| Ok::<_, String>(()), wrap_message("quote service"));
        match result {
            Err(CircuitError::Execution(message)) => {
                assert!(message.starts_with("quote service: "));
                assert!(message.contains("open"));
            }
            other => panic!("expected wrapped failure, got ok={}", other.is_ok()),
        }
    }

    #[test]
    fn test_chained_fallback_first_hit_wins() {
        let breaker = open_breaker();

        let result = breaker.execute_with_fallback(
            || Ok::<_, String>("live"),
            chained(vec![
                Box::new(|_| None),
                Box::new(|_| Some("second")),
                Box::new(|_| Some("third")),
            ]),
        );
        assert_eq!(result.unwrap(), "second");
    }

    #[test]
    fn test_chained_fallback_exhausted_surfaces_original() {
        let breaker = open_breaker();

        let result: Result<&str, _> = breaker.execute_with_fallback(
            || Ok::<_, String>("live"),
            chained(vec![Box::new(|_| None), Box::new(|_| None)]),
        );
        assert!(matches!(result, Err(CircuitError::Open { .. })));
    }
}
