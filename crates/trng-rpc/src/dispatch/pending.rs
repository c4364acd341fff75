use crate::{Error, Request, Result};
use core::time::Duration;
use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use std::sync::Arc;

/// Lifecycle of a request queued on a [`SerializedDispatcher`].
///
/// `Cancelled` is only reachable from `Queued`: once the worker claims a
/// request it runs to completion.
///
/// [`SerializedDispatcher`]: crate::SerializedDispatcher
#[derive(Debug)]
enum SlotState {
    Queued,
    InProgress,
    Done(Result<Value>),
    Cancelled,
    Taken,
}

impl SlotState {
    const fn is_waiting(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
    done: Condvar,
}

/// The worker's half of a queued request.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    request: Request,
    slot: Arc<Slot>,
}

/// The caller's half of a queued request, used to wait for its outcome.
#[derive(Debug)]
#[must_use = "a ticket must be waited on to observe the response"]
pub struct Ticket {
    slot: Arc<Slot>,
}

impl PendingRequest {
    pub(crate) fn new(request: Request) -> (Self, Ticket) {
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState::Queued),
            done: Condvar::new(),
        });
        let ticket = Ticket {
            slot: Arc::clone(&slot),
        };
        (Self { request, slot }, ticket)
    }

    pub(crate) fn request(&self) -> &Request {
        &self.request
    }

    /// Moves the request from queued to in progress. Returns `false` if the
    /// caller already gave up on it.
    pub(crate) fn claim(&self) -> bool {
        let mut state = self.slot.state.lock();
        match *state {
            SlotState::Queued => {
                *state = SlotState::InProgress;
                true
            }
            _ => false,
        }
    }

    /// Stores the outcome and wakes the caller.
    pub(crate) fn complete(&self, outcome: Result<Value>) {
        *self.slot.state.lock() = SlotState::Done(outcome);
        self.slot.done.notify_all();
    }
}

impl Drop for PendingRequest {
    // A request dropped unfinished (worker gone, channel drained on shutdown)
    // must still release its caller.
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        if state.is_waiting() {
            *state = SlotState::Done(Err(Error::Shutdown));
            self.slot.done.notify_all();
        }
    }
}

impl Ticket {
    /// Blocks until the request completes, or until `budget` elapses while it
    /// is still queued. `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// - [`Error::SendTimeout`] if the worker had not picked the request up
    ///   within `budget`. The request is cancelled and will never be sent.
    /// - [`Error::Shutdown`] if the dispatcher stopped before running it.
    /// - Any error produced while executing the request.
    pub fn wait(self, budget: Option<Duration>) -> Result<Value> {
        let mut state = self.slot.state.lock();
        match budget {
            Some(budget) => {
                self.slot
                    .done
                    .wait_while_for(&mut state, |s| s.is_waiting(), budget);
            }
            None => self.slot.done.wait_while(&mut state, |s| s.is_waiting()),
        }

        if matches!(*state, SlotState::Queued) {
            *state = SlotState::Cancelled;
            let budget = budget.unwrap_or_default();
            return Err(Error::SendTimeout {
                reason: format!(
                    "request was not sent within the blocking budget of {:.3}s",
                    budget.as_secs_f64()
                ),
            });
        }

        // Claimed requests cannot be cancelled; wait for the exchange to end.
        self.slot
            .done
            .wait_while(&mut state, |s| matches!(s, SlotState::InProgress));

        match core::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Done(outcome) => outcome,
            _ => Err(Error::Shutdown),
        }
    }
}
