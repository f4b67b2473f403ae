// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// The electrical level of a pin, as exchanged with the [`Provider`].
///
/// [`Provider`]: crate::provider::Provider
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RawLevel {
    /// The pin is physically low.
    #[default]
    Low,
    /// The pin is physically high.
    High,
}

impl RawLevel {
    /// The opposite level.
    pub fn not(&self) -> RawLevel {
        match self {
            RawLevel::High => RawLevel::Low,
            RawLevel::Low => RawLevel::High,
        }
    }
}

impl fmt::Display for RawLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RawLevel::High => "high",
            RawLevel::Low => "low",
        };
        write!(f, "{}", s)
    }
}

impl From<bool> for RawLevel {
    fn from(b: bool) -> Self {
        if b {
            RawLevel::High
        } else {
            RawLevel::Low
        }
    }
}

/// The logical state of a pin, independent of its electrical polarity.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LogicalLevel {
    /// The pin is inactive, e.g. the button is released.
    #[default]
    Deasserted,
    /// The pin is active, e.g. the button is pressed.
    Asserted,
}

impl LogicalLevel {
    /// The opposite level.
    pub fn not(&self) -> LogicalLevel {
        match self {
            LogicalLevel::Asserted => LogicalLevel::Deasserted,
            LogicalLevel::Deasserted => LogicalLevel::Asserted,
        }
    }
}

impl fmt::Display for LogicalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalLevel::Asserted => "asserted",
            LogicalLevel::Deasserted => "deasserted",
        };
        write!(f, "{}", s)
    }
}

impl From<LogicalLevel> for bool {
    fn from(l: LogicalLevel) -> bool {
        match l {
            LogicalLevel::Deasserted => false,
            LogicalLevel::Asserted => true,
        }
    }
}

impl From<bool> for LogicalLevel {
    fn from(b: bool) -> Self {
        if b {
            LogicalLevel::Asserted
        } else {
            LogicalLevel::Deasserted
        }
    }
}

/// The mapping between electrical and logical levels for a pin.
///
/// Fixed when the pin is opened.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Polarity {
    /// A high level is asserted.
    #[default]
    ActiveHigh,
    /// A low level is asserted, as for a button pulled up and shorted to ground
    /// when pressed.
    ActiveLow,
}

impl Polarity {
    /// The logical level corresponding to a raw level read from the pin.
    pub fn to_logical(&self, raw: RawLevel) -> LogicalLevel {
        match (self, raw) {
            (Polarity::ActiveHigh, RawLevel::High) | (Polarity::ActiveLow, RawLevel::Low) => {
                LogicalLevel::Asserted
            }
            _ => LogicalLevel::Deasserted,
        }
    }

    /// The raw level to write to the pin to present a logical level.
    pub fn to_raw(&self, level: LogicalLevel) -> RawLevel {
        match (self, level) {
            (Polarity::ActiveHigh, LogicalLevel::Asserted)
            | (Polarity::ActiveLow, LogicalLevel::Deasserted) => RawLevel::High,
            _ => RawLevel::Low,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Polarity::ActiveHigh => "active-high",
            Polarity::ActiveLow => "active-low",
        };
        write!(f, "{}", s)
    }
}

/// The edges of an input that generate notifications.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EdgeDetection {
    /// Notify on transitions from low to high.
    Rising,
    /// Notify on transitions from high to low.
    Falling,
    /// Notify on all transitions.
    Both,
}

/// The direction a pin was opened with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    /// The pin is read.
    Input,
    /// The pin is driven.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Input => "input",
            Direction::Output => "output",
        };
        write!(f, "{}", s)
    }
}
