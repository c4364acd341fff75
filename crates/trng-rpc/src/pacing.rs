use crate::{Error, ErrorKind, PacingHints, QUOTA_EXCEEDED};
use chrono::{DateTime, Utc};
use core::time::Duration;

/// A daily-quota backoff in effect until `deadline`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub deadline: DateTime<Utc>,
    pub message: String,
}

impl Backoff {
    /// The error handed to every caller while the backoff lasts.
    pub fn error(&self) -> Error {
        Error::Remote {
            kind: ErrorKind::InsufficientRequests,
            code: QUOTA_EXCEEDED,
            message: self.message.clone(),
        }
    }
}

/// Remaining allowance as last reported by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub requests_left: i64,
    pub bits_left: i64,
    /// Monotonic clock reading when the snapshot was taken.
    pub captured_at: Duration,
}

impl UsageSnapshot {
    /// Whether the snapshot is older than `max_age` at monotonic time `now`.
    pub fn is_stale(&self, now: Duration, max_age: Duration) -> bool {
        now.saturating_sub(self.captured_at) > max_age
    }
}

/// Pacing and usage state shared by every dispatch path of one identity.
///
/// The [`Gate`] holds this behind a single mutex; all reads and writes,
/// including the backoff expiry check, happen under that lock.
///
/// [`Gate`]: crate::Gate
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PacingState {
    /// Minimum spacing the server asked for between responses and the next
    /// request.
    pub advisory_delay: Duration,
    /// Monotonic clock reading of the last successful response.
    pub last_response: Duration,
    pub backoff: Option<Backoff>,
    pub usage: Option<UsageSnapshot>,
}

impl PacingState {
    /// Returns the active backoff, clearing it first if `now` has reached its
    /// deadline.
    pub fn active_backoff(&mut self, now: DateTime<Utc>) -> Option<&Backoff> {
        if self.backoff.as_ref().is_some_and(|b| now >= b.deadline) {
            self.backoff = None;
        }
        self.backoff.as_ref()
    }

    /// How long a request at monotonic time `now` must wait to honour the
    /// advisory delay. Zero when no wait is needed.
    pub fn remaining_delay(&self, now: Duration) -> Duration {
        self.advisory_delay
            .saturating_sub(now.saturating_sub(self.last_response))
    }

    /// Records a successful response received at monotonic time `now`.
    ///
    /// A response without an advisory delay resets the delay to `default`.
    pub fn record_success(&mut self, hints: PacingHints, now: Duration, default: Duration) {
        if let (Some(requests_left), Some(bits_left)) = (hints.requests_left, hints.bits_left) {
            self.usage = Some(UsageSnapshot {
                requests_left,
                bits_left,
                captured_at: now,
            });
        }
        self.advisory_delay = hints.advisory_delay.unwrap_or(default);
        self.last_response = now;
    }
}
