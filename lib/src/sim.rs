// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A simulated GPIO for testing [`Dispatcher`]s without hardware.
//!
//! The levels of input lines are controlled by setting the pull on the line,
//! and edge notifications are delivered synchronously on the thread changing
//! the pull.  Failures can be injected into opening, reading and writing
//! individual lines.
//!
//! ```
//! # fn example() -> gpiomirror::Result<()> {
//! use gpiomirror::sim::Sim;
//! use gpiomirror::{EdgeDetection, Polarity, Provider, RawLevel};
//!
//! let sim = Sim::new(&["BUTTON"]);
//! let button = sim.open_input("BUTTON", EdgeDetection::Both, Polarity::ActiveLow)?;
//! sim.pullup("BUTTON")?;
//! assert_eq!(sim.read_level(&button)?, RawLevel::High);
//! # Ok(())
//! # }
//! ```
//!
//! [`Dispatcher`]: crate::dispatcher::Dispatcher

use crate::clock::{Clock, Timestamp};
use crate::level::{Direction, EdgeDetection, LogicalLevel, Polarity, RawLevel};
use crate::provider::{EdgeCallback, PinHandle, PinId, Provider, Subscription};
use crate::{Error, IoOp, OpenErrorKind, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const INJECTED: &str = "injected failure";

/// A simulated set of named GPIO lines.
#[derive(Debug)]
pub struct Sim {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    lines: Vec<Line>,
    next_pin: PinId,
    next_sub: u64,
}

struct Line {
    name: String,
    level: RawLevel,
    owner: Option<PinId>,
    direction: Option<Direction>,
    edges: Option<EdgeDetection>,
    writes: Vec<RawLevel>,
    subscribers: Vec<(u64, EdgeCallback)>,
    fail_opens: bool,
    fail_reads: bool,
    fail_writes: bool,
}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("owner", &self.owner)
            .field("direction", &self.direction)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Line {
    fn new(name: &str) -> Self {
        Line {
            name: name.into(),
            level: RawLevel::Low,
            owner: None,
            direction: None,
            edges: None,
            writes: Vec::new(),
            subscribers: Vec::new(),
            fail_opens: false,
            fail_reads: false,
            fail_writes: false,
        }
    }

    fn detects(&self, from: RawLevel, to: RawLevel) -> bool {
        match self.edges {
            Some(EdgeDetection::Both) => from != to,
            Some(EdgeDetection::Rising) => from == RawLevel::Low && to == RawLevel::High,
            Some(EdgeDetection::Falling) => from == RawLevel::High && to == RawLevel::Low,
            None => false,
        }
    }
}

impl Sim {
    /// Create a simulation with the named lines, all initially low.
    pub fn new(names: &[&str]) -> Self {
        Sim {
            state: Mutex::new(State {
                lines: names.iter().map(|n| Line::new(n)).collect(),
                next_pin: 1,
                next_sub: 1,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the level an input line is pulled to.
    ///
    /// If the level changes then subscribers to the line are notified on the
    /// calling thread.  Output lines ignore the pull.
    pub fn set_pull(&self, name: &str, level: RawLevel) -> Result<()> {
        let callbacks = {
            let mut state = self.state();
            let line = state.line_mut(name)?;
            if line.direction == Some(Direction::Output) || line.level == level {
                return Ok(());
            }
            let from = line.level;
            line.level = level;
            if !line.detects(from, level) {
                return Ok(());
            }
            line.callbacks()
        };
        for cb in callbacks {
            cb();
        }
        Ok(())
    }

    /// Pull a line high.
    pub fn pullup(&self, name: &str) -> Result<()> {
        self.set_pull(name, RawLevel::High)
    }

    /// Pull a line low.
    pub fn pulldown(&self, name: &str) -> Result<()> {
        self.set_pull(name, RawLevel::Low)
    }

    /// Invert the pull on a line.
    pub fn toggle(&self, name: &str) -> Result<RawLevel> {
        let level = self.get_level(name)?.not();
        self.set_pull(name, level)?;
        Ok(level)
    }

    /// Notify the subscribers to a line without changing its level,
    /// as for a glitch too short to be read.
    pub fn notify(&self, name: &str) -> Result<()> {
        let callbacks = self.state().line_mut(name)?.callbacks();
        for cb in callbacks {
            cb();
        }
        Ok(())
    }

    /// The current level of a line.
    pub fn get_level(&self, name: &str) -> Result<RawLevel> {
        Ok(self.state().line_mut(name)?.level)
    }

    /// The levels written to a line, oldest first.
    pub fn writes(&self, name: &str) -> Result<Vec<RawLevel>> {
        Ok(self.state().line_mut(name)?.writes.clone())
    }

    /// Make opening the line fail, or succeed again.
    pub fn fail_opens(&self, name: &str, fail: bool) -> Result<()> {
        self.state().line_mut(name)?.fail_opens = fail;
        Ok(())
    }

    /// Make reading the line fail, or succeed again.
    pub fn fail_reads(&self, name: &str, fail: bool) -> Result<()> {
        self.state().line_mut(name)?.fail_reads = fail;
        Ok(())
    }

    /// Make writing the line fail, or succeed again.
    pub fn fail_writes(&self, name: &str, fail: bool) -> Result<()> {
        self.state().line_mut(name)?.fail_writes = fail;
        Ok(())
    }

    /// A copy of the first callback subscribed to the line.
    ///
    /// The copy remains callable after the subscription is removed, to
    /// simulate a notification delivered late.
    pub fn notifier(&self, name: &str) -> Option<EdgeCallback> {
        let mut state = self.state();
        let line = state.line_mut(name).ok()?;
        line.subscribers.first().map(|(_, cb)| cb.clone())
    }

    /// The number of callbacks subscribed to the line.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.state()
            .line_mut(name)
            .map(|l| l.subscribers.len())
            .unwrap_or(0)
    }

    /// Whether the line is currently open.
    pub fn is_claimed(&self, name: &str) -> bool {
        self.state()
            .line_mut(name)
            .map(|l| l.owner.is_some())
            .unwrap_or(false)
    }
}

impl Line {
    fn callbacks(&self) -> Vec<EdgeCallback> {
        self.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
    }
}

impl State {
    fn line_mut(&mut self, name: &str) -> Result<&mut Line> {
        self.lines
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::InvalidArgument(format!("no line named \"{}\"", name)))
    }

    fn owned_mut(&mut self, pin: &PinHandle) -> Result<&mut Line> {
        self.lines
            .iter_mut()
            .find(|l| l.owner == Some(pin.id()))
            .ok_or_else(|| Error::Closed(pin.name().into()))
    }

    fn claim(&mut self, name: &str, direction: Direction) -> Result<(PinId, &mut Line)> {
        let id = self.next_pin;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::Open(name.into(), OpenErrorKind::NotFound))?;
        if line.fail_opens {
            return Err(Error::Open(
                name.into(),
                OpenErrorKind::Backend(INJECTED.into()),
            ));
        }
        if line.owner.is_some() {
            return Err(Error::Open(name.into(), OpenErrorKind::Busy));
        }
        line.owner = Some(id);
        line.direction = Some(direction);
        self.next_pin += 1;
        Ok((id, line))
    }
}

impl Provider for Sim {
    fn open_input(
        &self,
        name: &str,
        edges: EdgeDetection,
        polarity: Polarity,
    ) -> Result<PinHandle> {
        let mut state = self.state();
        let (id, line) = state.claim(name, Direction::Input)?;
        line.edges = Some(edges);
        Ok(PinHandle::input(id, name, edges, polarity))
    }

    fn open_output(
        &self,
        name: &str,
        polarity: Polarity,
        initial: LogicalLevel,
    ) -> Result<PinHandle> {
        let mut state = self.state();
        let (id, line) = state.claim(name, Direction::Output)?;
        line.edges = None;
        line.level = polarity.to_raw(initial);
        Ok(PinHandle::output(id, name, polarity))
    }

    fn read_level(&self, pin: &PinHandle) -> Result<RawLevel> {
        let mut state = self.state();
        let line = state.owned_mut(pin)?;
        if line.fail_reads {
            return Err(Error::Io(IoOp::Read, line.name.clone(), INJECTED.into()));
        }
        Ok(line.level)
    }

    fn write_level(&self, pin: &PinHandle, level: RawLevel) -> Result<()> {
        let mut state = self.state();
        let line = state.owned_mut(pin)?;
        if line.direction != Some(Direction::Output) {
            return Err(Error::Io(
                IoOp::Write,
                line.name.clone(),
                "not an output".into(),
            ));
        }
        if line.fail_writes {
            return Err(Error::Io(IoOp::Write, line.name.clone(), INJECTED.into()));
        }
        line.level = level;
        line.writes.push(level);
        Ok(())
    }

    fn subscribe_edges(&self, pin: &PinHandle, callback: EdgeCallback) -> Result<Subscription> {
        let mut state = self.state();
        let id = state.next_sub;
        let line = state.owned_mut(pin)?;
        if line.edges.is_none() {
            return Err(Error::Io(
                IoOp::Subscribe,
                line.name.clone(),
                "edge detection not enabled".into(),
            ));
        }
        line.subscribers.push((id, callback));
        state.next_sub += 1;
        Ok(Subscription::new(id, pin.id()))
    }

    fn unsubscribe(&self, sub: Subscription) {
        let mut state = self.state();
        for line in state.lines.iter_mut() {
            line.subscribers.retain(|(id, _)| *id != sub.id());
        }
    }

    fn close(&self, pin: PinHandle) -> Result<()> {
        let mut state = self.state();
        let line = state.owned_mut(&pin)?;
        line.owner = None;
        line.direction = None;
        line.edges = None;
        line.subscribers.clear();
        Ok(())
    }

    fn pin_names(&self) -> Result<Vec<String>> {
        Ok(self.state().lines.iter().map(|l| l.name.clone()).collect())
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Create a clock stopped at its origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time since the clock origin.
    pub fn set(&self, t: Duration) {
        self.0
            .store(Timestamp::from_duration(t).as_nanos(), Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, d: Duration) {
        let d = Timestamp::from_duration(d).as_nanos();
        self.0.fetch_add(d, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.0.load(Ordering::SeqCst))
    }
}
