// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A level is only accepted as the new stable level once it has been read
//! continuously for at least the debounce period.
//!
//! The state machine is fed every level read from the input, along with the
//! time of the read.  A read that differs from the stable level starts a
//! candidate transition.  The candidate is promoted when it is read again
//! after the period has elapsed, and is discarded if the level bounces back
//! before then.
//!
//! ```
//! # use gpiomirror::debounce::Debouncer;
//! # use gpiomirror::{LogicalLevel, Timestamp};
//! # use std::time::Duration;
//! let ms = |t: u64| Timestamp::from_nanos(t * 1_000_000);
//! let mut d = Debouncer::new(LogicalLevel::Deasserted, Duration::from_millis(30));
//! assert_eq!(d.update(LogicalLevel::Asserted, ms(20)), None);
//! assert_eq!(d.update(LogicalLevel::Asserted, ms(50)), Some(LogicalLevel::Asserted));
//! ```

use crate::clock::Timestamp;
use crate::level::LogicalLevel;
use std::time::Duration;

/// The states of the [`Debouncer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// The level has settled.
    Stable(LogicalLevel),

    /// A candidate level was first read at `since` and has not yet been
    /// read after the debounce period elapsed.
    Settling {
        candidate: LogicalLevel,
        since: Timestamp,
    },
}

/// A snapshot of the debounce state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DebounceState {
    /// The most recently promoted, or initial, level.
    pub last_stable_level: LogicalLevel,

    /// The level waiting to settle, if any.
    pub pending_level: Option<LogicalLevel>,

    /// When the pending level was first read.
    ///
    /// Set if and only if `pending_level` is set.
    pub pending_since: Option<Timestamp>,
}

/// The debounce state machine for a single input.
#[derive(Clone, Debug)]
pub struct Debouncer {
    period: Duration,
    stable: LogicalLevel,
    state: State,
}

impl Debouncer {
    /// Create a Debouncer that is stable at the `initial` level.
    pub fn new(initial: LogicalLevel, period: Duration) -> Self {
        Debouncer {
            period,
            stable: initial,
            state: State::Stable(initial),
        }
    }

    /// Feed a level read at time `now` into the state machine.
    ///
    /// Returns the new stable level if the read promotes a candidate.
    pub fn update(&mut self, level: LogicalLevel, now: Timestamp) -> Option<LogicalLevel> {
        match self.state {
            State::Stable(stable) => {
                if level != stable {
                    self.state = State::Settling {
                        candidate: level,
                        since: now,
                    };
                }
                None
            }
            State::Settling { candidate, since } => {
                if level == candidate {
                    if now.saturating_duration_since(since) < self.period {
                        return None;
                    }
                    self.stable = candidate;
                    self.state = State::Stable(candidate);
                    return Some(candidate);
                }
                // With only two levels, a read contradicting the candidate is
                // a bounce back to the stable level.
                self.state = State::Stable(self.stable);
                None
            }
        }
    }

    /// The time at which the pending candidate may be promoted, if one is pending.
    pub fn deadline(&self) -> Option<Timestamp> {
        match self.state {
            State::Stable(_) => None,
            State::Settling { since, .. } => Some(
                since
                    .checked_add(self.period)
                    .unwrap_or_else(|| Timestamp::from_nanos(u64::MAX)),
            ),
        }
    }

    /// The period a candidate must be held to be promoted.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The most recently promoted, or initial, level.
    pub fn stable_level(&self) -> LogicalLevel {
        self.stable
    }

    /// The current state of the machine.
    pub fn raw_state(&self) -> State {
        self.state
    }

    /// A snapshot of the state, flattened into a [`DebounceState`].
    pub fn state(&self) -> DebounceState {
        match self.state {
            State::Stable(level) => DebounceState {
                last_stable_level: level,
                pending_level: None,
                pending_since: None,
            },
            State::Settling { candidate, since } => DebounceState {
                last_stable_level: self.stable,
                pending_level: Some(candidate),
                pending_since: Some(since),
            },
        }
    }
}
