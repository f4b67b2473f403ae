// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::dispatcher::EdgeEvent;
use crate::Error;
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// The kinds of runtime errors reported to a [`StatusSink`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Reading the input pin failed.  The debounce state is unchanged.
    Read,

    /// Writing the output pin failed.  The logical state still changed.
    Write,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Read => write!(f, "read error"),
            ErrorKind::Write => write!(f, "write error"),
        }
    }
}

/// The receiver of state changes and runtime errors from a [`Dispatcher`].
///
/// Calls are made from whichever thread evaluated the input - typically the
/// provider's notification thread - and never while the dispatcher is
/// holding its internal lock.  Implementations should return promptly.
///
/// [`Dispatcher`]: crate::dispatcher::Dispatcher
pub trait StatusSink: Send + Sync {
    /// Called once for each debounced change of the input level.
    fn state_changed(&self, event: &EdgeEvent);

    /// Called for each failed access to the input or output pin.
    fn error(&self, kind: ErrorKind, err: &Error);
}

impl<S: StatusSink + ?Sized> StatusSink for Arc<S> {
    fn state_changed(&self, event: &EdgeEvent) {
        (**self).state_changed(event)
    }

    fn error(&self, kind: ErrorKind, err: &Error) {
        (**self).error(kind, err)
    }
}

/// A [`StatusSink`] that reports through the [`log`] facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn state_changed(&self, event: &EdgeEvent) {
        log::info!("input {} at {}", event.level, event.observed_at);
    }

    fn error(&self, kind: ErrorKind, err: &Error) {
        log::warn!("{}: {}", kind, err);
    }
}

/// The reports forwarded by a [`ChannelSink`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// A change reported via [`StatusSink::state_changed`].
    Changed(EdgeEvent),
    /// An error reported via [`StatusSink::error`].
    Failed(ErrorKind, Error),
}

/// A [`StatusSink`] that forwards reports over a channel.
///
/// Sending never blocks, so the receiver may take as long as it needs to
/// present each report.  Reports are dropped once the receiver is gone.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: Sender<Status>,
}

impl ChannelSink {
    /// Create a sink forwarding to `tx`.
    pub fn new(tx: Sender<Status>) -> Self {
        ChannelSink { tx }
    }
}

impl StatusSink for ChannelSink {
    fn state_changed(&self, event: &EdgeEvent) {
        _ = self.tx.send(Status::Changed(*event));
    }

    fn error(&self, kind: ErrorKind, err: &Error) {
        _ = self.tx.send(Status::Failed(kind, err.clone()));
    }
}
