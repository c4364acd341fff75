//! Test doubles shared by the unit tests.

use crate::{Clock, Request, Transport, TransportError};
use chrono::{DateTime, TimeZone, Utc};
use core::time::Duration;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Monotonic reading of a fresh [`ManualClock`].
const START: Duration = Duration::from_secs(100);

/// A clock that only moves when told to. Sleeping advances it instantly.
pub(crate) struct ManualClock {
    elapsed: Mutex<Duration>,
    utc_origin: DateTime<Utc>,
    slept: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Starts at 2024-05-01 12:00:00 UTC with a monotonic reading of 100s.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            elapsed: Mutex::new(START),
            utc_origin: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            slept: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn advance(&self, dur: Duration) {
        *self.elapsed.lock() += dur;
    }

    pub(crate) fn slept(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.elapsed() - START).unwrap();
        self.utc_origin + offset
    }

    fn sleep(&self, dur: Duration) {
        self.slept.lock().push(dur);
        self.advance(dur);
    }
}

type Responder = Box<dyn Fn(&Request) -> Result<Value, TransportError> + Send + Sync>;

/// A transport answering from a closure and recording every call.
pub(crate) struct ScriptedTransport {
    respond: Responder,
    requests: Mutex<Vec<Request>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(
        respond: impl Fn(&Request) -> Result<Value, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Always answers with a successful envelope around `result`.
    pub(crate) fn replying(result: Value) -> Arc<Self> {
        Self::new(move |_| Ok(success(result.clone())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn exchange(&self, request: &Request, _timeout: Duration) -> Result<Value, TransportError> {
        self.requests.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let response = (self.respond)(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

pub(crate) fn success(result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "result": result, "id": "test" })
}

pub(crate) fn failure(code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message },
        "id": "test",
    })
}

/// A `result` member carrying `data` the way generate methods return it.
pub(crate) fn random_result(data: Value) -> Value {
    json!({
        "random": { "data": data, "completionTime": "2024-05-01 12:00:00Z" },
        "bitsUsed": 16,
        "bitsLeft": 249_984,
        "requestsLeft": 999,
        "advisoryDelay": 0,
    })
}
