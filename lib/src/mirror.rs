// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::clock::{Clock, EventClock};
use crate::dispatcher::{Builder, Dispatcher, DEFAULT_DEBOUNCE_PERIOD};
use crate::level::{EdgeDetection, LogicalLevel, Polarity};
use crate::provider::{PinHandle, Provider};
use crate::sink::StatusSink;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// The configuration of a [`Mirror`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The name of the input pin.
    pub input: String,

    /// The name of the output pin.
    pub output: String,

    /// The polarity of the input.
    ///
    /// Defaults to active-low, suiting a button that shorts a pulled-up
    /// input to ground.
    pub input_polarity: Polarity,

    /// The polarity of the output.
    pub output_polarity: Polarity,

    /// The period the input must be stable before a change is accepted.
    pub debounce_period: Duration,

    /// The clock used to time the debounce and timestamp events.
    pub event_clock: EventClock,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: String::new(),
            output: String::new(),
            input_polarity: Polarity::ActiveLow,
            output_polarity: Polarity::ActiveHigh,
            debounce_period: DEFAULT_DEBOUNCE_PERIOD,
            event_clock: EventClock::Monotonic,
        }
    }
}

impl Config {
    /// Set the name of the input line.
    pub fn with_input<N: Into<String>>(&mut self, name: N) -> &mut Self {
        self.input = name.into();
        self
    }

    /// Set the name of the output line.
    pub fn with_output<N: Into<String>>(&mut self, name: N) -> &mut Self {
        self.output = name.into();
        self
    }

    /// Set the polarity of the input line.
    pub fn with_input_polarity(&mut self, polarity: Polarity) -> &mut Self {
        self.input_polarity = polarity;
        self
    }

    /// Set the polarity of the output line.
    pub fn with_output_polarity(&mut self, polarity: Polarity) -> &mut Self {
        self.output_polarity = polarity;
        self
    }

    /// Set the period the input must be stable before a change is reported.
    pub fn with_debounce_period(&mut self, period: Duration) -> &mut Self {
        self.debounce_period = period;
        self
    }

    /// Set the clock used to timestamp changes.
    pub fn with_event_clock(&mut self, clock: EventClock) -> &mut Self {
        self.event_clock = clock;
        self
    }
}

/// A [`Dispatcher`] together with the pins it uses.
///
/// The Mirror opens the named pins, closes them again if the dispatcher
/// cannot be constructed, and closes them when the mirror is closed or
/// dropped.
///
/// The output is initially deasserted, then set to match the input as the
/// dispatcher is constructed.
pub struct Mirror<P: Provider + 'static> {
    provider: Arc<P>,
    dispatcher: Option<Dispatcher<P>>,
}

impl<P: Provider + 'static> Mirror<P> {
    /// Open the pins and start mirroring.
    pub fn open<S: StatusSink + 'static>(provider: Arc<P>, cfg: &Config, sink: S) -> Result<Self> {
        Self::open_with(provider, cfg, None, sink)
    }

    /// Open the pins and start mirroring, timing the debounce with the given
    /// clock, rather than the configured event clock, and without a settle
    /// timer.
    ///
    /// Pending levels are only promoted when the input is next evaluated,
    /// so the caller is expected to [`poll`] the mirror.
    ///
    /// [`poll`]: Mirror::poll
    pub fn open_with_clock<S: StatusSink + 'static>(
        provider: Arc<P>,
        cfg: &Config,
        clock: Arc<dyn Clock>,
        sink: S,
    ) -> Result<Self> {
        Self::open_with(provider, cfg, Some(clock), sink)
    }

    fn open_with<S: StatusSink + 'static>(
        provider: Arc<P>,
        cfg: &Config,
        clock: Option<Arc<dyn Clock>>,
        sink: S,
    ) -> Result<Self> {
        let input = provider.open_input(&cfg.input, EdgeDetection::Both, cfg.input_polarity)?;
        let output = match provider.open_output(
            &cfg.output,
            cfg.output_polarity,
            LogicalLevel::Deasserted,
        ) {
            Ok(output) => output,
            Err(e) => {
                close_quietly(&*provider, input);
                return Err(e);
            }
        };
        let mut builder = Builder::new();
        builder.with_debounce_period(cfg.debounce_period);
        match clock {
            Some(clock) => builder.with_clock(clock).without_settle_timer(),
            None => builder.with_clock(cfg.event_clock.clock()),
        };
        match builder.build(provider.clone(), input, output, sink) {
            Ok(dispatcher) => Ok(Mirror {
                provider,
                dispatcher: Some(dispatcher),
            }),
            Err(e) => {
                let err = e.error().clone();
                let (input, output) = e.into_pins();
                close_quietly(&*provider, input);
                close_quietly(&*provider, output);
                Err(Error::Construction(Box::new(err)))
            }
        }
    }

    /// The dispatcher driving the output.
    pub fn dispatcher(&self) -> Option<&Dispatcher<P>> {
        self.dispatcher.as_ref()
    }

    /// The current stable level of the input.
    pub fn level(&self) -> Option<LogicalLevel> {
        self.dispatcher.as_ref().map(Dispatcher::level)
    }

    /// Evaluate the input now.
    pub fn poll(&self) {
        if let Some(d) = &self.dispatcher {
            d.poll();
        }
    }

    /// Stop mirroring and close both pins.
    ///
    /// Both pins are closed even if closing the first fails, and the first
    /// error is returned.
    pub fn close(mut self) -> Result<()> {
        self.do_close()
    }

    fn do_close(&mut self) -> Result<()> {
        let Some(dispatcher) = self.dispatcher.take() else {
            return Ok(());
        };
        let (input, output) = dispatcher.into_pins();
        let res = self.provider.close(input);
        let res2 = self.provider.close(output);
        log::debug!("mirror closed");
        res.and(res2)
    }
}

impl<P: Provider + 'static> Drop for Mirror<P> {
    fn drop(&mut self) {
        if let Err(e) = self.do_close() {
            log::warn!("failed to close mirror: {}", e);
        }
    }
}

fn close_quietly<P: Provider + ?Sized>(provider: &P, pin: PinHandle) {
    let name = pin.name().to_string();
    if let Err(e) = provider.close(pin) {
        log::warn!("failed to close pin \"{}\": {}", name, e);
    }
}
