//! Cancellable and deadline-bound guarded execution
//!
//! The work unit runs on a spawned thread while the calling thread races its
//! completion against a cancellation token. Whichever side finishes first
//! determines the outcome, and only the calling thread ever reports to the
//! engine, so exactly one completion is recorded per admission. Work that
//! outlives the race keeps running in the background; its result is dropped
//! and the engine never hears about it.

use crate::circuit::CircuitBreaker;
use crate::errors::CircuitError;
use crossbeam_channel::{Receiver, Sender, after, bounded, never, select};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

/// Observes cancellation and/or a deadline for one guarded invocation.
///
/// Tokens are cheap to clone; clones observe the same cancellation.
#[derive(Clone)]
pub struct CancelToken {
    cancel_rx: Receiver<()>,
    deadline_rx: Receiver<Instant>,
}

impl CancelToken {
    /// A token cancelled explicitly through the returned [`Canceller`].
    ///
    /// Dropping the canceller without calling [`Canceller::cancel`] also
    /// fires the token, mirroring the scope-bound cancellation discipline of
    /// request contexts.
    pub fn manual() -> (CancelToken, Canceller) {
        let (tx, rx) = bounded(0);
        (
            CancelToken {
                cancel_rx: rx,
                deadline_rx: never(),
            },
            Canceller { _tx: tx },
        )
    }

    /// A token that fires once the given duration has elapsed.
    pub fn with_deadline(timeout: Duration) -> CancelToken {
        CancelToken {
            cancel_rx: never(),
            deadline_rx: after(timeout),
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken").finish_non_exhaustive()
    }
}

/// Fires the paired [`CancelToken`], on [`cancel`](Canceller::cancel) or drop
pub struct Canceller {
    _tx: Sender<()>,
}

impl Canceller {
    /// Cancel the paired token.
    pub fn cancel(self) {
        // The token observes the channel disconnecting
        drop(self);
    }
}

impl CircuitBreaker {
    /// Execute a fallible operation, racing it against a cancellation token.
    ///
    /// If the token fires first the invocation is recorded as a failure and a
    /// [`CircuitError::Canceled`] or [`CircuitError::DeadlineExceeded`] is
    /// returned; the work keeps running in the background but can no longer
    /// affect the engine.
    pub fn execute_with_cancel<T, E, F>(
        &self,
        token: &CancelToken,
        work: F,
    ) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let slot = self.acquire_slot()?;
        let generation = self.before_request()?;

        let start = Instant::now();
        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            // The slot stays claimed for as long as the work actually runs
            let _slot = slot;
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            let _ = done_tx.send(outcome);
        });

        let cancel_rx = token.cancel_rx.clone();
        let deadline_rx = token.deadline_rx.clone();
        select! {
            recv(cancel_rx) -> _ => {
                self.after_request(generation, false);
                Err(CircuitError::Canceled {
                    circuit: self.name().to_string(),
                })
            }
            recv(deadline_rx) -> _ => {
                self.after_request(generation, false);
                Err(CircuitError::DeadlineExceeded {
                    circuit: self.name().to_string(),
                })
            }
            recv(done_rx) -> outcome => {
                let result = match outcome.expect("worker reports exactly once") {
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
        }
    }

    /// Execute a fallible operation with a wall-time bound.
    ///
    /// Convenience over [`execute_with_cancel`](Self::execute_with_cancel)
    /// with a deadline-bearing token.
    pub fn execute_with_deadline<T, E, F>(
        &self,
        work: F,
        timeout: Duration,
    ) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.execute_with_cancel(&CancelToken::with_deadline(timeout), work)
    }
}
