//! Error types for circuit breaker operations

use std::error::Error;
use std::fmt;

/// Errors that can occur during circuit breaker operations
#[derive(Debug)]
pub enum CircuitError<E = Box<dyn Error + Send + Sync>> {
    /// Circuit is open, the invocation was rejected without running
    Open { circuit: String },
    /// Half-open probe budget is exhausted, the invocation was rejected
    TooManyRequests { circuit: String },
    /// Concurrency limit reached, the invocation was rejected
    Saturated { circuit: String, limit: usize },
    /// The cancellation token fired before the work completed
    Canceled { circuit: String },
    /// The deadline elapsed before the work completed
    DeadlineExceeded { circuit: String },
    /// The guarded work itself failed
    Execution(E),
}

impl<E> CircuitError<E> {
    /// True for admission rejections: the caller's work was never invoked and
    /// no outcome was recorded against the engine's counters.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CircuitError::Open { .. } | CircuitError::TooManyRequests { .. }
        )
    }
}

impl<E: fmt::Display> fmt::Display for CircuitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::Open { circuit } => {
                write!(f, "circuit '{}' is open", circuit)
            }
            CircuitError::TooManyRequests { circuit } => {
                write!(f, "circuit '{}': too many requests", circuit)
            }
            CircuitError::Saturated { circuit, limit } => {
                write!(
                    f,
                    "circuit '{}' is saturated (concurrency limit: {})",
                    circuit, limit
                )
            }
            CircuitError::Canceled { circuit } => {
                write!(f, "circuit '{}': invocation canceled", circuit)
            }
            CircuitError::DeadlineExceeded { circuit } => {
                write!(f, "circuit '{}': deadline exceeded", circuit)
            }
            CircuitError::Execution(e) => write!(f, "circuit execution failed: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for CircuitError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CircuitError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kinds() {
        let open = CircuitError::<String>::Open {
            circuit: "api".to_string(),
        };
        let busy = CircuitError::<String>::TooManyRequests {
            circuit: "api".to_string(),
        };
        let canceled = CircuitError::<String>::Canceled {
            circuit: "api".to_string(),
        };
        let failed = CircuitError::Execution("boom".to_string());

        assert!(open.is_rejection());
        assert!(busy.is_rejection());
        assert!(!canceled.is_rejection());
        assert!(!failed.is_rejection());
    }

    #[test]
    fn test_display_includes_circuit_name() {
        let err = CircuitError::<String>::DeadlineExceeded {
            circuit: "search".to_string(),
        };
        assert_eq!(err.to_string(), "circuit 'search': deadline exceeded");
    }
}
