// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant, SystemTime};

/// A moment in time, in nanoseconds since the origin of the clock that produced it.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a Timestamp from the number of nanoseconds.
    pub fn from_nanos(t: u64) -> Self {
        Timestamp(t)
    }

    /// Create a Timestamp from a Duration since the clock origin.
    ///
    /// Saturates at the limit of the representation, around 584 years.
    pub fn from_duration(d: Duration) -> Self {
        Timestamp(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// The time since the clock origin, in nanoseconds.
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// The time elapsed from `earlier` to this Timestamp, or zero if `earlier`
    /// is actually later.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// The Timestamp `d` after this one, or None on overflow.
    pub fn checked_add(&self, d: Duration) -> Option<Timestamp> {
        let d = u64::try_from(d.as_nanos()).ok()?;
        self.0.checked_add(d).map(Timestamp)
    }
}

impl From<Timestamp> for Duration {
    fn from(ts: Timestamp) -> Self {
        Duration::from_nanos(ts.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

/// A source of Timestamps.
///
/// The dispatcher times the settling of candidate levels using its clock,
/// so the clock must not run backwards.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// A [`Clock`] backed by [`std::time::Instant`], with its origin at creation.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock with its origin at the current instant.
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.origin.elapsed())
    }
}

/// A [`Clock`] reading the system time, with its origin at the UNIX epoch.
///
/// The system time may be stepped, so this clock is only suitable where
/// timestamps are to be correlated with wall time.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealtimeClock;

impl Clock for RealtimeClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(Timestamp::from_duration)
            .unwrap_or_default()
    }
}

/// The clocks available to time the debounce and timestamp events.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventClock {
    /// A [`MonotonicClock`].
    #[default]
    Monotonic,

    /// A [`RealtimeClock`].
    Realtime,
}

impl EventClock {
    /// Create an instance of the clock.
    pub fn clock(&self) -> std::sync::Arc<dyn Clock> {
        match self {
            EventClock::Monotonic => std::sync::Arc::new(MonotonicClock::new()),
            EventClock::Realtime => std::sync::Arc::new(RealtimeClock),
        }
    }
}
