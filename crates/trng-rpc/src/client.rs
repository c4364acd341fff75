use crate::{
    Cache, CacheSpec, Clock, DirectDispatcher, Dispatch, Error, Gate, GateConfig, Request, Result,
    SerializedDispatcher, SystemClock, Transport, UsageSnapshot, methods,
};
use core::time::Duration;
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

pub const DEFAULT_BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_USAGE_REFRESH: Duration = Duration::from_secs(3600);
pub const DEFAULT_CACHE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Per-client settings.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use trng_rpc::ClientConfig;
///
/// let config = ClientConfig::default()
///     .blocking_timeout(None)
///     .http_timeout(Duration::from_secs(30))
///     .serialized(false);
/// assert_eq!(config.blocking_timeout, None);
/// assert!(!config.serialized);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Longest a caller waits before its request is sent. `None` is
    /// unbounded.
    pub blocking_timeout: Option<Duration>,
    /// Network timeout of one exchange.
    pub http_timeout: Duration,
    /// Funnel all requests through one background worker.
    pub serialized: bool,
    /// Spacing observed after responses without an advisory delay.
    pub default_delay: Duration,
    /// Age after which usage counters are fetched again.
    pub usage_refresh: Duration,
    /// Pause of a cache producer after a failed fetch.
    pub cache_retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            blocking_timeout: Some(DEFAULT_BLOCKING_TIMEOUT),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            serialized: true,
            default_delay: DEFAULT_DELAY,
            usage_refresh: DEFAULT_USAGE_REFRESH,
            cache_retry_delay: DEFAULT_CACHE_RETRY_DELAY,
        }
    }
}

impl ClientConfig {
    pub fn blocking_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.blocking_timeout = timeout;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn serialized(mut self, serialized: bool) -> Self {
        self.serialized = serialized;
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn usage_refresh(mut self, max_age: Duration) -> Self {
        self.usage_refresh = max_age;
        self
    }

    pub fn cache_retry_delay(mut self, delay: Duration) -> Self {
        self.cache_retry_delay = delay;
        self
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            blocking_timeout: self.blocking_timeout,
            http_timeout: self.http_timeout,
            default_delay: self.default_delay,
        }
    }
}

enum Mode<T, C> {
    Serialized(SerializedDispatcher<T, C>),
    Direct(DirectDispatcher<T, C>),
}

/// Everything one identity needs to talk to the service: a [`Gate`] holding
/// its pacing state and the dispatcher selected by
/// [`ClientConfig::serialized`].
///
/// Share a client behind an [`Arc`], typically handed out by a
/// [`Registry`](crate::Registry).
pub struct Client<T, C = SystemClock> {
    identity: String,
    config: ClientConfig,
    gate: Arc<Gate<T, C>>,
    mode: Mode<T, C>,
    closed: AtomicBool,
}

impl<T> Client<T, SystemClock>
where
    T: Transport,
{
    pub fn new(identity: impl Into<String>, config: ClientConfig, transport: T) -> Self {
        Self::with_clock(identity, config, transport, SystemClock::new())
    }
}

impl<T, C> Client<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn with_clock(
        identity: impl Into<String>,
        config: ClientConfig,
        transport: T,
        clock: C,
    ) -> Self {
        let identity = identity.into();
        let gate = Arc::new(Gate::new(transport, clock, config.gate_config()));
        let mode = if config.serialized {
            Mode::Serialized(SerializedDispatcher::new(Arc::clone(&gate)))
        } else {
            Mode::Direct(DirectDispatcher::new(Arc::clone(&gate)))
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            serialized = config.serialized,
            "Client created for identity {}",
            redact(&identity)
        );

        Self {
            identity,
            config,
            gate,
            mode,
            closed: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<Gate<T, C>> {
        &self.gate
    }

    pub fn is_serialized(&self) -> bool {
        matches!(self.mode, Mode::Serialized(_))
    }

    /// Sends `request` and returns the full response document.
    ///
    /// # Errors
    ///
    /// - [`Error::Shutdown`] after [`Self::shutdown`].
    /// - [`Error::SendTimeout`] if the request could not be sent within
    ///   [`ClientConfig::blocking_timeout`].
    /// - Any error of [`Gate::execute`].
    pub fn send(&self, request: Request) -> Result<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        match &self.mode {
            Mode::Serialized(dispatcher) => dispatcher.submit(request),
            Mode::Direct(dispatcher) => dispatcher.submit(&request),
        }
    }

    /// Remaining daily requests of this identity.
    ///
    /// # Errors
    ///
    /// Any error of the `getUsage` request issued when the cached counters
    /// are missing or stale.
    pub fn requests_left(&self) -> Result<i64> {
        Ok(self.usage()?.requests_left)
    }

    /// Remaining daily bits of this identity.
    ///
    /// # Errors
    ///
    /// See [`Self::requests_left`].
    pub fn bits_left(&self) -> Result<i64> {
        Ok(self.usage()?.bits_left)
    }

    fn usage(&self) -> Result<UsageSnapshot> {
        let now = self.gate.clock().elapsed();
        if let Some(usage) = self.gate.usage() {
            if !usage.is_stale(now, self.config.usage_refresh) {
                return Ok(usage);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Refreshing usage counters");
        self.send(Request::with_identity(
            methods::GET_USAGE,
            &self.identity,
            json!({}),
        ))?;
        self.gate
            .usage()
            .ok_or_else(|| Error::malformed("usage response carries no counters"))
    }

    /// Starts a cache that fetches `spec`'s request through this client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the bulk shape cannot fit the
    /// queue, and [`Error::Shutdown`] after [`Self::shutdown`].
    pub fn cache<I>(self: &Arc<Self>, spec: CacheSpec<I>) -> Result<Cache<I>>
    where
        I: Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        Cache::spawn(Arc::clone(self), spec, self.config.cache_retry_delay)
    }

    /// Refuses further requests. A serialized client still runs what was
    /// queued before the call and then stops its worker.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Mode::Serialized(dispatcher) = &self.mode {
            dispatcher.shutdown();
        }
    }
}

impl<T, C> Dispatch for Client<T, C>
where
    T: Transport,
    C: Clock,
{
    fn dispatch(&self, request: &Request) -> Result<Value> {
        self.send(request.clone())
    }
}

impl<T, C> core::fmt::Debug for Client<T, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &redact(&self.identity))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// First four characters of an identity, for logs.
pub(crate) fn redact(identity: &str) -> String {
    let shown: String = identity.chars().take(4).collect();
    format!("{shown}…")
}
