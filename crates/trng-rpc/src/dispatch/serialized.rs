//! Serialized request dispatch.
//!
//! A single background worker drains a FIFO queue of [`PendingRequest`]s and
//! runs them one at a time through the identity's [`Gate`]. Callers on any
//! thread enqueue and then block on their own [`Ticket`], so no two network
//! exchanges of one dispatcher ever overlap and they happen in submission
//! order.
//!
//! A caller whose blocking budget runs out while its request is still queued
//! cancels it; the worker skips cancelled requests without sending them.

use super::pending::{PendingRequest, Ticket};
use crate::{Clock, Dispatch, Error, Gate, Request, Result, Transport};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

/// Messages understood by the serialized worker.
enum Work {
    Request(PendingRequest),
    Shutdown { ack: Sender<()> },
}

/// Funnels concurrent callers through one ordered sequence of exchanges.
///
/// Dropping the dispatcher closes its queue; the worker finishes what is
/// already queued and exits. [`Self::shutdown`] does the same but also waits
/// for the worker to stop.
pub struct SerializedDispatcher<T, C> {
    gate: Arc<Gate<T, C>>,
    tx: Sender<Work>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T, C> SerializedDispatcher<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Starts the worker thread for `gate`.
    pub fn new(gate: Arc<Gate<T, C>>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker_gate = Arc::clone(&gate);
        let handle = thread::spawn(move || worker_loop(rx, worker_gate));
        Self {
            gate,
            tx,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn gate(&self) -> &Arc<Gate<T, C>> {
        &self.gate
    }

    /// Queues `request` behind everything already submitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] once the dispatcher has been shut down.
    pub fn enqueue(&self, request: Request) -> Result<Ticket> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        let (pending, ticket) = PendingRequest::new(request);
        self.tx
            .send(Work::Request(pending))
            .map_err(|_| Error::Shutdown)?;
        Ok(ticket)
    }

    /// Queues `request` and blocks until it completes, or until the gate's
    /// blocking budget elapses while it is still queued.
    ///
    /// # Errors
    ///
    /// See [`Ticket::wait`] and [`Gate::execute`].
    pub fn submit(&self, request: Request) -> Result<Value> {
        let budget = self.gate.config().blocking_timeout;
        self.enqueue(request)?.wait(budget)
    }

    /// Stops accepting requests, lets the worker finish the ones queued so
    /// far, and joins it. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Work::Shutdown { ack: ack_tx }).is_ok() {
            let _ = ack_rx.recv();
        }
        if handle.join().is_err() {
            #[cfg(feature = "tracing")]
            tracing::error!("Serialized dispatcher worker panicked");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T, C> Dispatch for SerializedDispatcher<T, C>
where
    T: Transport,
    C: Clock,
{
    fn dispatch(&self, request: &Request) -> Result<Value> {
        self.submit(request.clone())
    }
}

fn worker_loop<T, C>(rx: Receiver<Work>, gate: Arc<Gate<T, C>>)
where
    T: Transport,
    C: Clock,
{
    #[cfg(feature = "tracing")]
    tracing::debug!("Serialized dispatcher worker started");

    while let Ok(work) = rx.recv() {
        match work {
            Work::Request(pending) => {
                if !pending.claim() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Skipping cancelled request {}",
                        pending.request().id
                    );
                    continue;
                }
                let outcome = gate.execute(pending.request());
                pending.complete(outcome);
            }
            Work::Shutdown { ack } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Serialized dispatcher worker received shutdown signal");
                let _ = ack.send(());
                break;
            }
        }
    }

    // Anything queued after the shutdown signal is released with
    // `Error::Shutdown` as it is dropped.
    for _ in rx.try_iter() {}

    #[cfg(feature = "tracing")]
    tracing::debug!("Serialized dispatcher worker stopped");
}
