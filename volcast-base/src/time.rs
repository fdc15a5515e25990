//! Time sources and frame time statistics.
//!
//! The renderer never reads the system clock directly; it asks a [`Clock`], so that the
//! feedback loop that picks image resolution can be driven deterministically in tests.

use core::fmt;
use core::ops;
use std::sync::Mutex;

#[doc(no_inline)]
pub use core::time::Duration;
#[doc(no_inline)]
pub use web_time::Instant;

// -------------------------------------------------------------------------------------------------

/// A source of the current time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Instant;
}

/// [`Clock`] which reports the real, monotonic time.
#[derive(Clone, Copy, Debug, Default)]
#[expect(clippy::exhaustive_structs)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// [`Clock`] which only advances when told to.
///
/// ```
/// use volcast_base::time::{Clock, Duration, ManualClock};
///
/// let clock = ManualClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_millis(40));
/// assert_eq!(clock.now() - before, Duration::from_millis(40));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Instant>,
}

impl ManualClock {
    /// Creates a clock that reads as an arbitrary fixed instant until advanced.
    #[inline]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Instant::now()),
        }
    }

    /// Moves this clock's time forward.
    #[inline]
    pub fn advance(&self, duration: Duration) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *current += duration;
    }
}

impl Default for ManualClock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Instant {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// -------------------------------------------------------------------------------------------------

/// Summary of the time taken by a set of events.
///
/// It may be created by [`TimeStats::default()`] (empty), or [`TimeStats::one()`] (single event),
/// and multiple events may be aggregated using the `+=` operator.
/// It may be formatted for reading using the [`fmt::Display`] implementation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions)]
pub struct TimeStats {
    /// The number of events aggregated into this [`TimeStats`].
    pub count: usize,
    /// The sum of the durations of all events.
    pub sum: Duration,
    /// The minimum duration of all events, or [`None`] if there were no events.
    pub min: Option<Duration>,
    /// The maximum duration of all events, or [`Duration::ZERO`] if there were no events.
    pub max: Duration,
}

impl TimeStats {
    /// Constructs a [`TimeStats`] for a single event.
    #[inline]
    pub const fn one(duration: Duration) -> Self {
        Self {
            count: 1,
            sum: duration,
            min: Some(duration),
            max: duration,
        }
    }

    /// Mean duration of the events, or [`None`] if there were none.
    #[inline]
    pub fn mean(&self) -> Option<Duration> {
        let count = u32::try_from(self.count).ok().filter(|&c| c > 0)?;
        Some(self.sum / count)
    }
}

impl ops::AddAssign for TimeStats {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = TimeStats {
            count: self.count + rhs.count,
            sum: self.sum + rhs.sum,
            min: self.min.map_or(rhs.min, |value| Some(value.min(rhs.min?))),
            max: self.max.max(rhs.max),
        };
    }
}

impl fmt::Display for TimeStats {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TimeStats {
            count,
            sum,
            min,
            max,
        } = *self;
        match min {
            None => write!(f, "(-------- .. {max:.3?}) for {count:3}, total {sum:.3?}"),
            Some(min) => write!(f, "({min:.3?} .. {max:.3?}) for {count:3}, total {sum:.3?}"),
        }
    }
}

// -------------------------------------------------------------------------------------------------
