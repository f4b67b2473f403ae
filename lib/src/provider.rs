// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::level::{Direction, EdgeDetection, LogicalLevel, Polarity, RawLevel};
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// The identifier a [`Provider`] assigns to an open pin.
pub type PinId = u64;

/// The function a [`Provider`] calls when an edge is detected on a subscribed input.
///
/// The callback carries no level.  The level must be read from the pin, as it
/// may already have changed again since the edge.
///
/// Callbacks may be invoked from any thread, but the calls for a single
/// subscription are never concurrent.
pub type EdgeCallback = Arc<dyn Fn() + Send + Sync>;

/// An open pin.
///
/// Holding the PinHandle grants exclusive access to the pin.
/// The handle is returned to the [`Provider`] by [`close`], after which the pin
/// may be opened again, but not through this handle.
///
/// [`close`]: Provider::close
#[derive(Debug, Eq, PartialEq)]
pub struct PinHandle {
    id: PinId,
    name: String,
    direction: Direction,
    edge_detection: Option<EdgeDetection>,
    polarity: Polarity,
}

impl PinHandle {
    /// Create a handle for an input pin.
    ///
    /// Intended for use by [`Provider`] implementations.
    pub fn input<N: Into<String>>(
        id: PinId,
        name: N,
        edges: EdgeDetection,
        polarity: Polarity,
    ) -> Self {
        PinHandle {
            id,
            name: name.into(),
            direction: Direction::Input,
            edge_detection: Some(edges),
            polarity,
        }
    }

    /// Create a handle for an output pin.
    ///
    /// Intended for use by [`Provider`] implementations.
    pub fn output<N: Into<String>>(id: PinId, name: N, polarity: Polarity) -> Self {
        PinHandle {
            id,
            name: name.into(),
            direction: Direction::Output,
            edge_detection: None,
            polarity,
        }
    }

    /// The identifier assigned by the provider.
    pub fn id(&self) -> PinId {
        self.id
    }

    /// The name the pin was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the pin was opened as an input or an output.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The edges that generate notifications.  Only set for inputs.
    pub fn edge_detection(&self) -> Option<EdgeDetection> {
        self.edge_detection
    }

    /// The mapping between the raw and logical levels of the pin.
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
}

impl fmt::Display for PinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({} {})", self.name, self.polarity, self.direction)
    }
}

/// A registration of an [`EdgeCallback`] with a [`Provider`].
///
/// Returned to the provider by [`unsubscribe`].
///
/// [`unsubscribe`]: Provider::unsubscribe
#[derive(Debug, Eq, PartialEq)]
pub struct Subscription {
    id: u64,
    pin: PinId,
}

impl Subscription {
    /// Intended for use by [`Provider`] implementations.
    pub fn new(id: u64, pin: PinId) -> Self {
        Subscription { id, pin }
    }

    /// The identifier assigned by the provider.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The pin the subscription is watching.
    pub fn pin(&self) -> PinId {
        self.pin
    }
}

/// The platform GPIO.
///
/// Providers deal only in raw levels.  The polarity of a pin is recorded in
/// its [`PinHandle`] and applied by the caller.
pub trait Provider: Send + Sync {
    /// Open a named pin as an input with the given edge detection.
    fn open_input(&self, name: &str, edges: EdgeDetection, polarity: Polarity)
        -> Result<PinHandle>;

    /// Open a named pin as an output, driven to the `initial` level.
    fn open_output(
        &self,
        name: &str,
        polarity: Polarity,
        initial: LogicalLevel,
    ) -> Result<PinHandle>;

    /// Read the current level of a pin.
    fn read_level(&self, pin: &PinHandle) -> Result<RawLevel>;

    /// Drive an output pin to a level.
    fn write_level(&self, pin: &PinHandle, level: RawLevel) -> Result<()>;

    /// Register a callback for edges detected on an input pin.
    fn subscribe_edges(&self, pin: &PinHandle, callback: EdgeCallback) -> Result<Subscription>;

    /// Remove a registration.
    ///
    /// Must not wait for an in-progress callback to return, as the callback
    /// may itself be waiting on the caller.  Once this returns the callback
    /// will not be invoked again, other than an invocation already in progress.
    fn unsubscribe(&self, sub: Subscription);

    /// Release a pin.
    fn close(&self, pin: PinHandle) -> Result<()>;

    /// The names of the pins available to open.
    fn pin_names(&self) -> Result<Vec<String>>;
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn open_input(
        &self,
        name: &str,
        edges: EdgeDetection,
        polarity: Polarity,
    ) -> Result<PinHandle> {
        (**self).open_input(name, edges, polarity)
    }

    fn open_output(
        &self,
        name: &str,
        polarity: Polarity,
        initial: LogicalLevel,
    ) -> Result<PinHandle> {
        (**self).open_output(name, polarity, initial)
    }

    fn read_level(&self, pin: &PinHandle) -> Result<RawLevel> {
        (**self).read_level(pin)
    }

    fn write_level(&self, pin: &PinHandle, level: RawLevel) -> Result<()> {
        (**self).write_level(pin, level)
    }

    fn subscribe_edges(&self, pin: &PinHandle, callback: EdgeCallback) -> Result<Subscription> {
        (**self).subscribe_edges(pin, callback)
    }

    fn unsubscribe(&self, sub: Subscription) {
        (**self).unsubscribe(sub)
    }

    fn close(&self, pin: PinHandle) -> Result<()> {
        (**self).close(pin)
    }

    fn pin_names(&self) -> Result<Vec<String>> {
        (**self).pin_names()
    }
}
