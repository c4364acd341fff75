use chrono::{DateTime, Utc};
use core::time::Duration;
use std::time::Instant;

/// A trait for the time sources used to pace requests.
///
/// Pacing needs two notions of time: a monotonic one to measure how long ago
/// the last response arrived, and UTC wall-clock time to know when a daily
/// quota resets. Sleeping goes through the clock as well so a mocked clock can
/// advance virtual time instead of blocking.
///
/// # Example
///
/// ```
/// use chrono::{DateTime, Utc};
/// use core::time::Duration;
/// use trng_rpc::Clock;
///
/// struct FrozenClock;
/// impl Clock for FrozenClock {
///     fn elapsed(&self) -> Duration {
///         Duration::from_secs(42)
///     }
///     fn utc_now(&self) -> DateTime<Utc> {
///         DateTime::UNIX_EPOCH
///     }
///     fn sleep(&self, _dur: Duration) {}
/// }
///
/// assert_eq!(FrozenClock.elapsed().as_secs(), 42);
/// ```
pub trait Clock: Send + Sync + 'static {
    /// Monotonic time elapsed since an arbitrary, fixed origin.
    fn elapsed(&self) -> Duration;

    /// Current UTC wall-clock time.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Blocks the calling thread for `dur`.
    fn sleep(&self, dur: Duration);
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        (**self).utc_now()
    }

    fn sleep(&self, dur: Duration) {
        (**self).sleep(dur)
    }
}

/// The process clock: one [`Instant`] origin for monotonic time and the
/// system clock for UTC.
///
/// All elapsed-time arithmetic is measured from the same origin, so a clock
/// never mixes time sources.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur);
    }
}

/// Returns the first UTC midnight strictly after `now`.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use trng_rpc::next_utc_midnight;
///
/// let now = Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 59).unwrap();
/// let midnight = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
/// assert_eq!(next_utc_midnight(now), midnight);
/// ```
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MAX_UTC, |midnight| midnight.and_utc())
}
