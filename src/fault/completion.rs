// Licensed under the Apache-2.0 license

//! Single-shot completion handed from an interrupt handler to a blocked
//! waiter.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Armed,
    Fired,
    Cancelled,
}

/// How a wait ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Fired,
    Cancelled,
}

/// Fires at most once per [`reset`](Completion::reset).
#[derive(Debug)]
pub struct Completion {
    state: Mutex<State>,
    cond: Condvar,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Idle),
            cond: Condvar::new(),
        }
    }

    /// Arm for the next event. Any earlier outcome is discarded.
    pub fn reset(&self) {
        *self.state.lock() = State::Armed;
    }

    /// Returns `false` if nothing was armed or the completion already ended.
    pub fn complete(&self) -> bool {
        self.finish(State::Fired)
    }

    /// Wake the waiter without firing.
    pub fn cancel(&self) -> bool {
        self.finish(State::Cancelled)
    }

    fn finish(&self, to: State) -> bool {
        let mut state = self.state.lock();
        if *state != State::Armed {
            return false;
        }
        *state = to;
        self.cond.notify_all();
        true
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        *self.state.lock() == State::Armed
    }

    /// Block until fired or cancelled. Returns immediately if that already
    /// happened, and reports a wait on an idle completion as cancelled.
    pub fn wait(&self) -> WaitOutcome {
        let mut state = self.state.lock();
        while *state == State::Armed {
            self.cond.wait(&mut state);
        }
        let outcome = match *state {
            State::Fired => WaitOutcome::Fired,
            _ => WaitOutcome::Cancelled,
        };
        *state = State::Idle;
        outcome
    }
}

/// Handed to an interrupt source; firing it wakes the injector.
#[derive(Clone, Debug)]
pub struct IrqNotifier(pub(crate) Arc<Completion>);

impl IrqNotifier {
    /// Safe to call from any thread and any number of times; only the first
    /// call after arming counts.
    pub fn notify(&self) -> bool {
        self.0.complete()
    }
}

/// Aborts a pending interrupt wait, like a signal interrupting the waiter.
#[derive(Clone, Debug)]
pub struct Canceller(pub(crate) Arc<Completion>);

impl Canceller {
    pub fn cancel(&self) -> bool {
        self.0.cancel()
    }

    /// Whether an interrupt wait is currently pending.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.0.is_armed()
    }
}
