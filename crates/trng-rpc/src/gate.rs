use crate::{
    Backoff, Clock, Envelope, Error, ErrorKind, PacingHints, PacingState, Request, Result,
    Transport, UsageSnapshot, classify, next_utc_midnight,
};
use core::time::Duration;
use parking_lot::Mutex;
use serde_json::Value;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Timeouts and defaults applied by a [`Gate`] to every exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateConfig {
    /// Longest a caller will wait before its request is sent. `None` waits
    /// as long as pacing requires.
    pub blocking_timeout: Option<Duration>,
    /// Network timeout handed to the transport.
    pub http_timeout: Duration,
    /// Delay to observe after a response that carries no advisory delay.
    pub default_delay: Duration,
}

/// Wraps one request/response exchange with the service.
///
/// Before sending, the gate refuses requests during a quota backoff and waits
/// out the server's advisory delay. After receiving, it classifies error
/// envelopes and records the pacing hints and usage counters of successful
/// ones. It never retries and never queues.
///
/// A gate is shared by every dispatch path of one identity. Its pacing state
/// sits behind one mutex which is never held across the advisory sleep or
/// the network exchange.
pub struct Gate<T, C> {
    transport: T,
    clock: C,
    config: GateConfig,
    state: Mutex<PacingState>,
}

impl<T, C> Gate<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn new(transport: T, clock: C, config: GateConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            state: Mutex::new(PacingState::default()),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// A copy of the current pacing state.
    pub fn pacing(&self) -> PacingState {
        self.state.lock().clone()
    }

    /// The last usage counters reported by the service.
    pub fn usage(&self) -> Option<UsageSnapshot> {
        self.state.lock().usage
    }

    /// Performs one paced exchange for `request`.
    ///
    /// # Errors
    ///
    /// - The quota-exceeded [`Error::Remote`] while a backoff is in effect,
    ///   without contacting the transport.
    /// - [`Error::SendTimeout`] if the advisory delay exceeds the blocking
    ///   budget, without contacting the transport.
    /// - [`Error::Transport`] if the exchange fails.
    /// - [`Error::MalformedResponse`] or a classified [`Error::Remote`] for
    ///   unusable or failed responses.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, request), fields(method = %request.method, id = %request.id))
    )]
    pub fn execute(&self, request: &Request) -> Result<Value> {
        let wait = {
            let mut state = self.state.lock();
            #[cfg(feature = "tracing")]
            let backing_off = state.backoff.is_some();
            if let Some(backoff) = state.active_backoff(self.clock.utc_now()) {
                return Err(backoff.error());
            }
            #[cfg(feature = "tracing")]
            {
                if backing_off {
                    tracing::info!("Request allowance backoff expired");
                }
            }
            state.remaining_delay(self.clock.elapsed())
        };

        if !wait.is_zero() {
            if let Some(budget) = self.config.blocking_timeout {
                if wait > budget {
                    return Err(Error::SendTimeout {
                        reason: format!(
                            "advisory delay of {:.3}s exceeds the blocking budget of {:.3}s",
                            wait.as_secs_f64(),
                            budget.as_secs_f64()
                        ),
                    });
                }
            }
            #[cfg(feature = "tracing")]
            tracing::trace!("Waiting {:?} for advisory delay", wait);
            self.clock.sleep(wait);
        }

        let response = self
            .transport
            .exchange(request, self.config.http_timeout)
            .map_err(Error::Transport)?;

        match Envelope::parse(&response)? {
            Envelope::Failure(remote) => {
                let kind = classify(remote.code);
                if kind == ErrorKind::InsufficientRequests {
                    let deadline = next_utc_midnight(self.clock.utc_now());
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Request allowance exceeded, backing off until {}", deadline);
                    self.state.lock().backoff = Some(Backoff {
                        deadline,
                        message: remote.message.clone(),
                    });
                }
                Err(Error::Remote {
                    kind,
                    code: remote.code,
                    message: remote.message,
                })
            }
            Envelope::Success(result) => {
                let hints = PacingHints::from_result(result);
                self.state.lock().record_success(
                    hints,
                    self.clock.elapsed(),
                    self.config.default_delay,
                );
                Ok(response)
            }
        }
    }
}
