//! Result cache engine.
//!
//! A [`Cache`] keeps a bounded FIFO of ready results for one fixed request.
//! A background producer thread fetches through a [`Dispatch`] whenever the
//! queue has room and parks on a condition variable otherwise. Consumers pop
//! with [`Cache::get`], which never blocks.
//!
//! Producer failures never reach consumers. They are logged and the producer
//! retries after a short pause; consumers just see [`Error::CacheEmpty`] until
//! a fetch succeeds. The one exception is [`Error::Shutdown`] from the
//! dispatcher: the producer exits and the drained cache reports `Shutdown`.

mod descriptor;

pub use descriptor::*;

use crate::{Dispatch, Error, Result};
use core::time::Duration;
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    sync::Arc,
    thread::{self, JoinHandle},
};

struct State<I> {
    queue: VecDeque<Vec<I>>,
    paused: bool,
    shutdown: bool,
    /// Bumped by every pause or resume.
    epoch: u64,
}

/// Queue, flags and the single condition variable guarding them.
///
/// Every push, pop and flag change happens under `state` and is followed by
/// a notification on `signal`, so the producer cannot miss a wake-up between
/// its room check and its wait.
struct Shared<I> {
    state: Mutex<State<I>>,
    signal: Condvar,
    capacity: usize,
}

impl<I> Shared<I> {
    fn update(&self, f: impl FnOnce(&mut State<I>)) {
        f(&mut self.state.lock());
        self.signal.notify_all();
    }
}

/// A bounded, self-refilling queue of results.
///
/// Dropping the cache tells the producer to exit once its current fetch, if
/// any, returns. Use [`Self::shutdown`] to also wait for it.
pub struct Cache<I> {
    shared: Arc<Shared<I>>,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl<I> Cache<I>
where
    I: Send + 'static,
{
    /// Starts a producer fetching `spec`'s request through `dispatcher`.
    ///
    /// `retry_delay` is how long the producer pauses after a failed fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `spec` fails
    /// [`CacheSpec::validate`].
    pub fn spawn<D>(dispatcher: D, spec: CacheSpec<I>, retry_delay: Duration) -> Result<Self>
    where
        D: Dispatch,
    {
        spec.validate()?;
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(spec.capacity),
                paused: false,
                shutdown: false,
                epoch: 0,
            }),
            signal: Condvar::new(),
            capacity: spec.capacity,
        });
        let producer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || produce(&shared, &dispatcher, &spec, retry_delay))
        };
        Ok(Self {
            shared,
            producer: Mutex::new(Some(producer)),
        })
    }

    /// Pops the oldest ready result.
    ///
    /// # Errors
    ///
    /// - [`Error::CacheEmpty`] if nothing is ready. This is retryable.
    /// - [`Error::Shutdown`] if nothing is ready and the producer has been
    ///   shut down, or its dispatcher has.
    pub fn get(&self) -> Result<Vec<I>> {
        let (item, shutdown) = {
            let mut state = self.shared.state.lock();
            (state.queue.pop_front(), state.shutdown)
        };
        match item {
            Some(item) => {
                self.shared.signal.notify_all();
                Ok(item)
            }
            None if shutdown => Err(Error::Shutdown),
            None => Err(Error::CacheEmpty),
        }
    }

    /// Pauses refilling. Queued results stay available to [`Self::get`].
    pub fn stop(&self) {
        self.shared.update(|state| {
            state.paused = true;
            state.epoch += 1;
        });
    }

    /// Resumes refilling after [`Self::stop`].
    pub fn resume(&self) {
        self.shared.update(|state| {
            state.paused = false;
            state.epoch += 1;
        });
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Number of ready results.
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Stops the producer and waits for it to exit. A fetch in progress is
    /// allowed to finish first. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        self.shared.update(|state| state.shutdown = true);
        let Some(handle) = self.producer.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            #[cfg(feature = "tracing")]
            tracing::error!("Cache producer panicked");
        }
    }
}

impl<I> Drop for Cache<I> {
    fn drop(&mut self) {
        self.shared.update(|state| state.shutdown = true);
    }
}

impl<I> core::fmt::Debug for Cache<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Cache")
            .field("len", &state.queue.len())
            .field("capacity", &self.shared.capacity)
            .field("paused", &state.paused)
            .finish_non_exhaustive()
    }
}

fn produce<I, D>(shared: &Shared<I>, dispatcher: &D, spec: &CacheSpec<I>, retry_delay: Duration)
where
    D: Dispatch,
{
    #[cfg(feature = "tracing")]
    tracing::debug!("Cache producer started for {}", spec.request.method);

    let needed = spec.room_needed();
    loop {
        {
            let mut state = shared.state.lock();
            shared.signal.wait_while(&mut state, |s| {
                !s.shutdown && (s.paused || s.queue.len() + needed > shared.capacity)
            });
            if state.shutdown {
                break;
            }
        }

        match fetch(dispatcher, spec) {
            Ok(items) => {
                let mut state = shared.state.lock();
                state.queue.extend(items);
            }
            Err(Error::Shutdown) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Cache producer dispatcher is shut down");
                shared.update(|state| state.shutdown = true);
                break;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Cache producer fetch failed: {}", _e);

                let mut state = shared.state.lock();
                let epoch = state.epoch;
                shared.signal.wait_while_for(
                    &mut state,
                    |s| !s.shutdown && s.epoch == epoch,
                    retry_delay,
                );
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Cache producer stopped for {}", spec.request.method);
}

/// One fetch, extracted and split into queue items.
fn fetch<I, D>(dispatcher: &D, spec: &CacheSpec<I>) -> Result<Vec<Vec<I>>>
where
    D: Dispatch,
{
    let response = dispatcher.dispatch(&spec.request.renewed())?;
    let items = (spec.extractor)(&response, spec.decimal)?;
    match spec.bulk {
        Some(bulk) => bulk.split(items),
        None => Ok(vec![items]),
    }
}
