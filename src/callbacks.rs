//! Notification hooks for circuit breaker state transitions

use crate::State;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// State-change notifier: receives (instance name, previous state, new state)
pub type StateChangeFn = Arc<dyn Fn(&str, State, State) + Send + Sync>;

/// Per-state hook: receives the instance name
pub type StateHookFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Hooks invoked by the engine on state transitions.
///
/// Hooks run inside the engine's critical section, on the thread that
/// performed the transition. They must be non-blocking and must not call back
/// into the same instance's entry points.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_state_change: Option<StateChangeFn>,
    pub on_open: Option<StateHookFn>,
    pub on_close: Option<StateHookFn>,
    pub on_half_open: Option<StateHookFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the configured hooks for one actual transition. A panicking
    /// hook is contained so the engine's bookkeeping stays consistent.
    pub(crate) fn trigger(&self, circuit: &str, from: State, to: State) {
        if let Some(ref callback) = self.on_state_change {
            let cb = AssertUnwindSafe(callback);
            let _ = catch_unwind(|| cb(circuit, from, to));
        }

        let hook = match to {
            State::Open => &self.on_open,
            State::Closed => &self.on_close,
            State::HalfOpen => &self.on_half_open,
        };
        if let Some(callback) = hook {
            let cb = AssertUnwindSafe(callback);
            let _ = catch_unwind(|| cb(circuit));
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
