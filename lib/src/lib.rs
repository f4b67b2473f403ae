// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library for turning the noisy edges of a GPIO input, such as a push
//! button, into a clean stream of debounced state changes, and mirroring
//! those changes onto a GPIO output, such as an LED.
//!
//! The hardware is accessed through a [`Provider`], which opens named pins
//! and delivers raw edge notifications.  Two providers are included:
//! [`cdev::Cdev`] for the Linux GPIO character device, and [`sim::Sim`], an
//! in-memory simulation for testing.
//!
//! The [`Dispatcher`] owns an input and an output pin, filters input edges
//! through the [`debounce`] state machine, drives the output and reports
//! each state change to a [`StatusSink`].
//!
//! The [`Mirror`] bundles opening the pins, building the dispatcher and
//! closing the pins again:
//!
//! ```no_run
//! # #[cfg(feature = "cdev")]
//! # fn example() -> gpiomirror::Result<()> {
//! use gpiomirror::{cdev::Cdev, mirror, LogSink, Mirror};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut cfg = mirror::Config::default();
//! cfg.with_input("GPIO_174")
//!     .with_output("GPIO_34")
//!     .with_debounce_period(Duration::from_millis(30));
//! let m = Mirror::open(Arc::new(Cdev::new("gpiomirror")), &cfg, LogSink)?;
//! // ... the LED now follows the button ...
//! m.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Provider`]: provider::Provider
//! [`Dispatcher`]: dispatcher::Dispatcher
//! [`StatusSink`]: sink::StatusSink
//! [`Mirror`]: mirror::Mirror

#![warn(missing_docs)]

use std::fmt;

/// A Provider for the Linux GPIO character device.
#[cfg(feature = "cdev")]
pub mod cdev;

/// Timestamps and the clocks that produce them.
pub mod clock;
pub use clock::{Clock, EventClock, MonotonicClock, RealtimeClock, Timestamp};

/// The debounce state machine.
pub mod debounce;

/// The debounced edge dispatcher.
///
/// The [`Dispatcher`] is constructed by a [`Builder`] from an open input pin, an open
/// output pin and a [`StatusSink`].
///
/// [`Builder`]: dispatcher::Builder
/// [`Dispatcher`]: dispatcher::Dispatcher
/// [`StatusSink`]: crate::sink::StatusSink
pub mod dispatcher;
pub use dispatcher::{ConstructionError, Dispatcher, EdgeEvent};

/// Types describing pin levels and their interpretation.
pub mod level;
pub use level::{Direction, EdgeDetection, LogicalLevel, Polarity, RawLevel};

/// Mirroring a named input pin onto a named output pin.
pub mod mirror;
pub use mirror::Mirror;

/// The interface to the platform GPIO.
pub mod provider;
pub use provider::{EdgeCallback, PinHandle, PinId, Provider, Subscription};

/// Receivers of state changes and runtime errors.
pub mod sink;
pub use sink::{ChannelSink, ErrorKind, LogSink, Status, StatusSink};

/// An in-memory simulated Provider.
pub mod sim;

/// Errors returned by [`gpiomirror`] functions.
///
/// [`gpiomirror`]: crate
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum Error {
    /// A pin could not be opened.
    #[error("cannot open pin \"{0}\": {1}.")]
    Open(String, OpenErrorKind),

    /// A read, write or other operation on an open pin failed.
    #[error("{0} on pin \"{1}\" failed: {2}")]
    Io(IoOp, String, String),

    /// The pin is not open on the provider.
    #[error("pin \"{0}\" is closed.")]
    Closed(String),

    /// An error returned when there is a problem with an argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// The dispatcher could not be constructed.
    #[error("dispatcher construction failed: {0}")]
    Construction(Box<Error>),

    /// A background thread could not be started.
    #[error("cannot start thread: {0}")]
    Thread(String),

    /// The platform GPIO could not be queried.
    #[error("{0}")]
    Platform(String),
}

/// The reasons a pin may fail to open.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OpenErrorKind {
    /// No pin with that name exists.
    NotFound,

    /// The pin is already claimed.
    Busy,

    /// The pin does not support the requested configuration.
    Unsupported(String),

    /// The underlying platform reported an error.
    Backend(String),
}

impl fmt::Display for OpenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenErrorKind::NotFound => write!(f, "no such pin"),
            OpenErrorKind::Busy => write!(f, "pin is already in use"),
            OpenErrorKind::Unsupported(s) => write!(f, "unsupported configuration - {}", s),
            OpenErrorKind::Backend(s) => write!(f, "{}", s),
        }
    }
}

/// Identifiers for the operations performed on open pins.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoOp {
    /// Reading the level of a pin.
    Read,
    /// Setting the level of an output.
    Write,
    /// Subscribing to edge notifications.
    Subscribe,
    /// Releasing a pin.
    Close,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IoOp::Read => "read",
            IoOp::Write => "write",
            IoOp::Subscribe => "subscribe",
            IoOp::Close => "close",
        };
        write!(f, "{}", name)
    }
}

/// The result for [`gpiomirror`] functions.
///
/// [`gpiomirror`]: crate
pub type Result<T> = std::result::Result<T, Error>;
