mod pending;
mod serialized;

pub use pending::Ticket;
pub use serialized::*;

use crate::{Clock, Gate, Request, Result, Transport};
use serde_json::Value;
use std::sync::Arc;

/// Anything that can take a request document and produce its response.
///
/// This is the seam between request producers (callers, the [`Cache`]
/// producer) and the machinery that actually sends requests.
///
/// [`Cache`]: crate::Cache
pub trait Dispatch: Send + Sync + 'static {
    /// Sends `request` and returns the full response document.
    ///
    /// # Errors
    ///
    /// Any error of the underlying gate or dispatcher.
    fn dispatch(&self, request: &Request) -> Result<Value>;
}

impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    fn dispatch(&self, request: &Request) -> Result<Value> {
        (**self).dispatch(request)
    }
}

/// Unserialized dispatch: every caller runs the gate on its own thread.
///
/// Concurrent callers may have overlapping exchanges; only the gate's pacing
/// state is mutually exclusive.
pub struct DirectDispatcher<T, C> {
    gate: Arc<Gate<T, C>>,
}

impl<T, C> DirectDispatcher<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn new(gate: Arc<Gate<T, C>>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &Arc<Gate<T, C>> {
        &self.gate
    }

    /// Sends `request` immediately, after any pacing wait.
    ///
    /// # Errors
    ///
    /// See [`Gate::execute`].
    pub fn submit(&self, request: &Request) -> Result<Value> {
        self.gate.execute(request)
    }
}

impl<T, C> Dispatch for DirectDispatcher<T, C>
where
    T: Transport,
    C: Clock,
{
    fn dispatch(&self, request: &Request) -> Result<Value> {
        self.submit(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        GateConfig, methods,
        testing::{ScriptedTransport, success},
    };
    use core::time::Duration;
    use serde_json::json;
    use std::{sync::Barrier, thread};

    #[test]
    fn direct_dispatch_allows_overlapping_exchanges() {
        let barrier = Arc::new(Barrier::new(4));
        let transport = {
            let barrier = Arc::clone(&barrier);
            ScriptedTransport::new(move |_| {
                // All four callers must be inside the transport at once.
                barrier.wait();
                Ok(success(json!({ "advisoryDelay": 0 })))
            })
        };
        let gate = Arc::new(Gate::new(
            Arc::clone(&transport),
            crate::SystemClock::new(),
            GateConfig {
                blocking_timeout: None,
                http_timeout: Duration::from_secs(5),
                default_delay: Duration::ZERO,
            },
        ));
        let dispatcher = Arc::new(DirectDispatcher::new(gate));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    dispatcher.dispatch(&Request::new(methods::GET_USAGE, json!({})))
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(transport.calls(), 4);
        assert_eq!(transport.max_in_flight(), 4);
    }
}
