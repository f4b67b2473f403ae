// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::clock::{Clock, MonotonicClock, Timestamp};
use crate::debounce::{DebounceState, Debouncer};
use crate::level::{Direction, EdgeDetection, LogicalLevel};
use crate::provider::{EdgeCallback, PinHandle, Provider, Subscription};
use crate::sink::{ErrorKind, StatusSink};
use crate::Error;
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// The debounce period used unless the [`Builder`] is told otherwise.
///
/// Typical mechanical switches settle within 20-50ms.
pub const DEFAULT_DEBOUNCE_PERIOD: Duration = Duration::from_millis(30);

/// A debounced change of the input level.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeEvent {
    /// The new stable level of the input.
    pub level: LogicalLevel,

    /// When the level was promoted to stable.
    pub observed_at: Timestamp,
}

/// The error returned when a [`Dispatcher`] cannot be constructed.
///
/// The pins passed to the [`Builder`] are returned so they can be closed.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct ConstructionError {
    source: Error,
    input: PinHandle,
    output: PinHandle,
}

impl ConstructionError {
    fn new(source: Error, input: PinHandle, output: PinHandle) -> Self {
        ConstructionError {
            source,
            input,
            output,
        }
    }

    /// The reason construction failed.
    pub fn error(&self) -> &Error {
        &self.source
    }

    /// Recover the input and output pins.
    pub fn into_pins(self) -> (PinHandle, PinHandle) {
        (self.input, self.output)
    }
}

/// A builder of [`Dispatcher`]s.
///
/// # Examples
///
/// ```
/// # fn example() -> gpiomirror::Result<()> {
/// use gpiomirror::sim::Sim;
/// use gpiomirror::dispatcher::Builder;
/// use gpiomirror::{EdgeDetection, LogSink, LogicalLevel, Polarity, Provider};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let sim = Arc::new(Sim::new(&["BUTTON", "LED"]));
/// let button = sim.open_input("BUTTON", EdgeDetection::Both, Polarity::ActiveLow)?;
/// let led = sim.open_output("LED", Polarity::ActiveHigh, LogicalLevel::Deasserted)?;
/// let d = Builder::new()
///     .with_debounce_period(Duration::from_millis(20))
///     .build(sim.clone(), button, led, LogSink)
///     .map_err(|e| e.error().clone())?;
/// let (button, led) = d.into_pins();
/// sim.close(button)?;
/// sim.close(led)?;
/// # Ok(())
/// # }
/// ```
pub struct Builder {
    period: Duration,
    clock: Option<Arc<dyn Clock>>,
    settle_timer: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            period: DEFAULT_DEBOUNCE_PERIOD,
            clock: None,
            settle_timer: true,
        }
    }
}

impl Builder {
    /// Start building a new dispatcher.
    pub fn new() -> Self {
        Builder::default()
    }

    /// Set the period a level must be held before it is accepted.
    ///
    /// The period must be non-zero.
    pub fn with_debounce_period(&mut self, period: Duration) -> &mut Self {
        self.period = period;
        self
    }

    /// Set the clock used to time the debounce period.
    ///
    /// Defaults to a [`MonotonicClock`].
    pub fn with_clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
        self.clock = Some(clock);
        self
    }

    /// Do not start a settle timer.
    ///
    /// Without the timer a pending level is only promoted when the input is
    /// next evaluated, either due to an edge notification or a call to
    /// [`Dispatcher::poll`].
    pub fn without_settle_timer(&mut self) -> &mut Self {
        self.settle_timer = false;
        self
    }

    /// Build the dispatcher.
    ///
    /// The input must be open with detection of both edges, and the output
    /// open as an output.  The input is read and the output driven to match
    /// before the dispatcher subscribes to input edges.
    pub fn build<P, S>(
        &self,
        provider: Arc<P>,
        input: PinHandle,
        output: PinHandle,
        sink: S,
    ) -> Result<Dispatcher<P>, ConstructionError>
    where
        P: Provider + 'static,
        S: StatusSink + 'static,
    {
        if let Err(e) = self.validate(&input, &output) {
            return Err(ConstructionError::new(e, input, output));
        }
        let initial = match provider.read_level(&input) {
            Ok(raw) => input.polarity().to_logical(raw),
            Err(e) => return Err(ConstructionError::new(e, input, output)),
        };
        if let Err(e) = provider.write_level(&output, output.polarity().to_raw(initial)) {
            sink.error(ErrorKind::Write, &e);
        }
        log::debug!(
            "dispatching {} to {} with {:?} debounce, initially {}",
            input,
            output,
            self.period,
            initial
        );

        let clock: Arc<dyn Clock> = match &self.clock {
            Some(c) => c.clone(),
            None => Arc::new(MonotonicClock::new()),
        };
        let mut failure = None;
        let shared = Arc::new_cyclic(|weak: &Weak<Shared<P>>| {
            let weak = weak.clone();
            let callback: EdgeCallback = Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.evaluate();
                }
            });
            let subscription = match provider.subscribe_edges(&input, callback) {
                Ok(sub) => Some(sub),
                Err(e) => {
                    failure = Some(e);
                    None
                }
            };
            Shared {
                provider,
                clock,
                sink: Box::new(sink),
                inner: Mutex::new(Inner {
                    debouncer: Debouncer::new(initial, self.period),
                    input: Some(input),
                    output: Some(output),
                    subscription,
                    shutdown: false,
                    in_flight: Vec::new(),
                }),
                idle: Condvar::new(),
                settle: Condvar::new(),
            }
        });
        if let Some(e) = failure {
            return Err(shared.abandon(e));
        }

        let mut timer = None;
        if self.settle_timer {
            let s = shared.clone();
            match thread::Builder::new()
                .name("gpiomirror-settle".into())
                .spawn(move || settle(s))
            {
                Ok(handle) => timer = Some(handle),
                Err(e) => return Err(shared.abandon(Error::Thread(e.to_string()))),
            }
        }

        // catch any edge that arrived before the subscription was in place
        shared.evaluate();

        Ok(Dispatcher {
            shared,
            timer: Mutex::new(timer),
        })
    }

    fn validate(&self, input: &PinHandle, output: &PinHandle) -> crate::Result<()> {
        if self.period.is_zero() {
            return Err(Error::InvalidArgument(
                "debounce period must be non-zero".into(),
            ));
        }
        if input.direction() != Direction::Input {
            return Err(Error::InvalidArgument(format!(
                "pin \"{}\" is not an input",
                input.name()
            )));
        }
        if input.edge_detection() != Some(EdgeDetection::Both) {
            return Err(Error::InvalidArgument(format!(
                "input \"{}\" must detect both edges",
                input.name()
            )));
        }
        if output.direction() != Direction::Output {
            return Err(Error::InvalidArgument(format!(
                "pin \"{}\" is not an output",
                output.name()
            )));
        }
        Ok(())
    }
}

/// Mirrors the debounced level of an input pin onto an output pin.
///
/// The dispatcher subscribes to edges on the input.  On each notification it
/// reads the input and runs the level through the [`Debouncer`].  When a level
/// is promoted to stable the output is driven to match, in its own polarity,
/// and the [`StatusSink`] is told of the [`EdgeEvent`].
///
/// Failures to read the input or write the output are reported to the sink
/// and otherwise ignored.  The logical level is considered authoritative
/// even if the output could not be written.
///
/// # Shutdown
///
/// Once [`shutdown`] returns no further events are reported and the output
/// is not written again.  If a notification is being handled on another
/// thread when [`shutdown`] is called then [`shutdown`] waits for it to
/// complete.  [`shutdown`] may be called from within the sink, in which case
/// it does not wait for any notification, so reports already in progress on
/// other threads may complete after it returns.
///
/// Use [`into_pins`] to recover the pins.  Pins still held by the dispatcher
/// when it is dropped are closed.
///
/// [`shutdown`]: Dispatcher::shutdown
/// [`into_pins`]: Dispatcher::into_pins
pub struct Dispatcher<P: Provider + 'static> {
    shared: Arc<Shared<P>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<P: Provider + 'static> Dispatcher<P> {
    /// Evaluate the input now, as if an edge had been detected.
    pub fn poll(&self) {
        self.shared.evaluate();
    }

    /// The current stable level of the input.
    pub fn level(&self) -> LogicalLevel {
        lock(&self.shared.inner).debouncer.stable_level()
    }

    /// A snapshot of the debounce state machine.
    pub fn debounce_state(&self) -> DebounceState {
        lock(&self.shared.inner).debouncer.state()
    }

    /// The period a level must be held before it is accepted.
    pub fn debounce_period(&self) -> Duration {
        lock(&self.shared.inner).debouncer.period()
    }

    /// Whether [`shutdown`](Dispatcher::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        lock(&self.shared.inner).shutdown
    }

    /// Stop dispatching.
    ///
    /// Unsubscribes from the input and stops the settle timer.
    /// Safe to call repeatedly.
    ///
    /// When called from within the sink, returns without waiting for reports
    /// in progress on other threads.
    pub fn shutdown(&self) {
        let me = thread::current().id();
        let mut inner = lock(&self.shared.inner);
        if !inner.shutdown {
            inner.shutdown = true;
            if let Some(sub) = inner.subscription.take() {
                self.shared.provider.unsubscribe(sub);
            }
            self.shared.settle.notify_all();
            log::debug!("dispatcher shutdown");
        }
        // a caller reporting to the sink cannot wait for other reports, as
        // they may in turn be waiting on it.
        if !inner.in_flight.contains(&me) {
            while !inner.in_flight.is_empty() {
                inner = self
                    .shared
                    .idle
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        drop(inner);

        let timer = lock(&self.timer).take();
        if let Some(handle) = timer {
            // when called from the sink on the timer thread itself, the
            // thread exits on its own once the sink returns.
            if handle.thread().id() != me && handle.join().is_err() {
                log::warn!("settle timer panicked");
            }
        }
    }

    /// Shutdown the dispatcher and return the input and output pins.
    pub fn into_pins(self) -> (PinHandle, PinHandle) {
        self.shutdown();
        let mut inner = lock(&self.shared.inner);
        match (inner.input.take(), inner.output.take()) {
            (Some(input), Some(output)) => (input, output),
            _ => unreachable!("pins are only taken by into_pins"),
        }
    }
}

impl<P: Provider + 'static> Drop for Dispatcher<P> {
    fn drop(&mut self) {
        self.shutdown();
        let (input, output) = {
            let mut inner = lock(&self.shared.inner);
            (inner.input.take(), inner.output.take())
        };
        for pin in [input, output].into_iter().flatten() {
            let name = pin.name().to_string();
            if let Err(e) = self.shared.provider.close(pin) {
                log::warn!("failed to close pin \"{}\": {}", name, e);
            }
        }
    }
}

/// The state shared with the edge callback and the settle timer.
struct Shared<P: Provider> {
    provider: Arc<P>,
    clock: Arc<dyn Clock>,
    sink: Box<dyn StatusSink>,
    inner: Mutex<Inner>,

    // signalled when an in-flight report completes
    idle: Condvar,

    // signalled when the settle deadline may have changed, or on shutdown
    settle: Condvar,
}

struct Inner {
    debouncer: Debouncer,
    input: Option<PinHandle>,
    output: Option<PinHandle>,
    subscription: Option<Subscription>,
    shutdown: bool,

    // threads reporting to the sink, outside the lock
    in_flight: Vec<ThreadId>,
}

enum Outcome {
    Unchanged,
    Changed(EdgeEvent, Option<Error>),
    ReadFailed(Error),
}

impl Inner {
    fn step<P: Provider + ?Sized>(&mut self, provider: &P, clock: &dyn Clock) -> Outcome {
        let Some(input) = &self.input else {
            return Outcome::Unchanged;
        };
        let level = match provider.read_level(input) {
            Ok(raw) => input.polarity().to_logical(raw),
            Err(e) => return Outcome::ReadFailed(e),
        };
        let now = clock.now();
        let Some(level) = self.debouncer.update(level, now) else {
            return Outcome::Unchanged;
        };
        log::debug!("{} now {}", input, level);
        let event = EdgeEvent {
            level,
            observed_at: now,
        };
        let res = match &self.output {
            Some(output) => provider.write_level(output, output.polarity().to_raw(level)),
            None => Ok(()),
        };
        Outcome::Changed(event, res.err())
    }
}

impl<P: Provider> Shared<P> {
    /// Read the input and act on any change.
    fn evaluate(&self) {
        let mut inner = lock(&self.inner);
        if inner.shutdown {
            return;
        }
        let deadline = inner.debouncer.deadline();
        let outcome = inner.step(&*self.provider, &*self.clock);
        if inner.debouncer.deadline() != deadline {
            self.settle.notify_all();
        }
        if let Outcome::Unchanged = outcome {
            return;
        }
        let _guard = InFlight::enter(self, inner);
        match outcome {
            Outcome::Changed(event, write_err) => {
                self.sink.state_changed(&event);
                if let Some(e) = write_err {
                    self.sink.error(ErrorKind::Write, &e);
                }
            }
            Outcome::ReadFailed(e) => self.sink.error(ErrorKind::Read, &e),
            Outcome::Unchanged => {}
        }
    }

    /// Unwind a partially constructed dispatcher.
    fn abandon(&self, e: Error) -> ConstructionError {
        let mut inner = lock(&self.inner);
        inner.shutdown = true;
        if let Some(sub) = inner.subscription.take() {
            self.provider.unsubscribe(sub);
        }
        match (inner.input.take(), inner.output.take()) {
            (Some(input), Some(output)) => ConstructionError::new(e, input, output),
            _ => unreachable!("pins are held until construction completes"),
        }
    }
}

/// Marks the current thread as reporting to the sink until dropped.
struct InFlight<'a, P: Provider> {
    shared: &'a Shared<P>,
    id: ThreadId,
}

impl<'a, P: Provider> InFlight<'a, P> {
    fn enter(shared: &'a Shared<P>, mut inner: MutexGuard<'_, Inner>) -> Self {
        let id = thread::current().id();
        inner.in_flight.push(id);
        InFlight { shared, id }
    }
}

impl<P: Provider> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        let mut inner = lock(&self.shared.inner);
        if let Some(idx) = inner.in_flight.iter().position(|t| *t == self.id) {
            inner.in_flight.swap_remove(idx);
        }
        if inner.in_flight.is_empty() {
            self.shared.idle.notify_all();
        }
    }
}

/// Promote pending levels once their deadline passes, even if no further
/// edges arrive.
fn settle<P: Provider>(shared: Arc<Shared<P>>) {
    let mut retry_at: Option<Timestamp> = None;
    let mut inner = lock(&shared.inner);
    loop {
        if inner.shutdown {
            return;
        }
        let Some(deadline) = inner.debouncer.deadline() else {
            retry_at = None;
            inner = shared
                .settle
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
            continue;
        };
        let due = match retry_at {
            Some(r) if r > deadline => r,
            _ => deadline,
        };
        let now = shared.clock.now();
        if now < due {
            inner = shared
                .settle
                .wait_timeout(inner, due.saturating_duration_since(now))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }
        drop(inner);
        shared.evaluate();
        inner = lock(&shared.inner);
        // a failed read leaves the candidate pending - back off for a period
        // rather than spinning on the pin.
        retry_at = if inner.debouncer.deadline() == Some(deadline) {
            now.checked_add(inner.debouncer.period())
        } else {
            None
        };
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
