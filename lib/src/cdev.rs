// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pins are identified either by line name, such as `GPIO22`, or by chip and
//! offset, such as `gpiochip0:22` or `0:22`.
//!
//! Each pin is requested from the kernel as a separate single line request.
//! Edge notifications are delivered from a watcher thread per subscription.

use crate::level::{EdgeDetection, LogicalLevel, Polarity, RawLevel};
use crate::provider::{EdgeCallback, PinHandle, PinId, Provider, Subscription};
use crate::{Error, IoOp, OpenErrorKind, Result};
use gpiocdev::chip::{chips, Chip};
use gpiocdev::line::{self, Offset, Value};
use gpiocdev::request::Builder;
use gpiocdev::Request;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// how long a watcher waits for an edge before checking if it should stop
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// A [`Provider`] for the Linux GPIO character device.
#[derive(Debug)]
pub struct Cdev {
    consumer: String,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    lines: HashMap<PinId, Line>,
    watchers: HashMap<u64, Watcher>,
    next_pin: PinId,
    next_sub: u64,
}

#[derive(Debug)]
struct Line {
    req: Arc<Request>,
    offset: Offset,
}

#[derive(Debug)]
struct Watcher {
    pin: PinId,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Cdev {
    /// Create a provider that labels the lines it requests with `consumer`.
    pub fn new<N: Into<String>>(consumer: N) -> Self {
        Cdev {
            consumer: consumer.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, name: &str, cfg: impl FnOnce(&mut Builder)) -> Result<PinId> {
        let mut builder = Request::builder();
        let offset = match parse_chip_offset(name) {
            Some((chip, offset)) => {
                builder.on_chip(chip).with_line(offset);
                offset
            }
            None => {
                let fl = gpiocdev::find_named_line(name)
                    .ok_or_else(|| Error::Open(name.into(), OpenErrorKind::NotFound))?;
                builder.with_found_line(&fl);
                fl.info.offset
            }
        };
        builder.with_consumer(&self.consumer);
        cfg(&mut builder);
        let req = builder.request().map_err(|e| open_error(name, e))?;

        let mut state = self.state();
        let id = state.next_pin;
        state.next_pin += 1;
        state.lines.insert(
            id,
            Line {
                req: Arc::new(req),
                offset,
            },
        );
        Ok(id)
    }

    fn line(&self, pin: &PinHandle) -> Result<(Arc<Request>, Offset)> {
        self.state()
            .lines
            .get(&pin.id())
            .map(|l| (l.req.clone(), l.offset))
            .ok_or_else(|| Error::Closed(pin.name().into()))
    }
}

impl Provider for Cdev {
    fn open_input(
        &self,
        name: &str,
        edges: EdgeDetection,
        polarity: Polarity,
    ) -> Result<PinHandle> {
        let id = self.request(name, |b| {
            b.as_input().with_edge_detection(match edges {
                EdgeDetection::Rising => line::EdgeDetection::RisingEdge,
                EdgeDetection::Falling => line::EdgeDetection::FallingEdge,
                EdgeDetection::Both => line::EdgeDetection::BothEdges,
            });
        })?;
        log::debug!("requested input \"{}\"", name);
        Ok(PinHandle::input(id, name, edges, polarity))
    }

    fn open_output(
        &self,
        name: &str,
        polarity: Polarity,
        initial: LogicalLevel,
    ) -> Result<PinHandle> {
        let value = raw_to_value(polarity.to_raw(initial));
        let id = self.request(name, |b| {
            b.as_output(value);
        })?;
        log::debug!("requested output \"{}\"", name);
        Ok(PinHandle::output(id, name, polarity))
    }

    fn read_level(&self, pin: &PinHandle) -> Result<RawLevel> {
        let (req, offset) = self.line(pin)?;
        req.value(offset)
            .map(value_to_raw)
            .map_err(|e| Error::Io(IoOp::Read, pin.name().into(), e.to_string()))
    }

    fn write_level(&self, pin: &PinHandle, level: RawLevel) -> Result<()> {
        let (req, offset) = self.line(pin)?;
        req.set_value(offset, raw_to_value(level))
            .map_err(|e| Error::Io(IoOp::Write, pin.name().into(), e.to_string()))
    }

    fn subscribe_edges(&self, pin: &PinHandle, callback: EdgeCallback) -> Result<Subscription> {
        let (req, _) = self.line(pin)?;
        if pin.edge_detection().is_none() {
            return Err(Error::Io(
                IoOp::Subscribe,
                pin.name().into(),
                "edge detection not enabled".into(),
            ));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let name = pin.name().to_string();
        let s = stop.clone();
        let handle = thread::Builder::new()
            .name(format!("gpiomirror-watch-{}", pin.id()))
            .spawn(move || watch(req, name, s, callback))
            .map_err(|e| Error::Io(IoOp::Subscribe, pin.name().into(), e.to_string()))?;

        let mut state = self.state();
        let id = state.next_sub;
        state.next_sub += 1;
        state.watchers.insert(
            id,
            Watcher {
                pin: pin.id(),
                stop,
                handle,
            },
        );
        Ok(Subscription::new(id, pin.id()))
    }

    fn unsubscribe(&self, sub: Subscription) {
        // the watcher is joined when the pin is closed
        if let Some(w) = self.state().watchers.get(&sub.id()) {
            w.stop.store(true, Ordering::Release);
        }
    }

    fn close(&self, pin: PinHandle) -> Result<()> {
        let (line, watchers) = {
            let mut state = self.state();
            let line = state
                .lines
                .remove(&pin.id())
                .ok_or_else(|| Error::Closed(pin.name().into()))?;
            let ids: Vec<u64> = state
                .watchers
                .iter()
                .filter(|(_, w)| w.pin == pin.id())
                .map(|(id, _)| *id)
                .collect();
            let watchers: Vec<Watcher> = ids
                .iter()
                .filter_map(|id| state.watchers.remove(id))
                .collect();
            (line, watchers)
        };
        let me = thread::current().id();
        for w in watchers {
            w.stop.store(true, Ordering::Release);
            if w.handle.thread().id() != me && w.handle.join().is_err() {
                log::warn!("watcher for \"{}\" panicked", pin.name());
            }
        }
        drop(line);
        log::debug!("released \"{}\"", pin.name());
        Ok(())
    }

    fn pin_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for p in chips().map_err(|e| Error::Platform(e.to_string()))? {
            let chip = match Chip::from_path(&p) {
                Ok(c) => c,
                Err(e) => {
                    log::debug!("skipping {}: {}", p.display(), e);
                    continue;
                }
            };
            let iter = chip
                .line_info_iter()
                .map_err(|e| Error::Platform(format!("{}: {}", p.display(), e)))?;
            names.extend(iter.filter_map(|li| li.ok()).filter_map(|li| {
                if li.name.is_empty() {
                    None
                } else {
                    Some(li.name)
                }
            }));
        }
        Ok(names)
    }
}

fn watch(req: Arc<Request>, name: String, stop: Arc<AtomicBool>, callback: EdgeCallback) {
    while !stop.load(Ordering::Acquire) {
        match req.wait_edge_event(WATCH_INTERVAL) {
            Ok(false) => {}
            Ok(true) => {
                // the event itself is discarded - the subscriber reads the level
                if let Err(e) = req.read_edge_event() {
                    log::warn!("reading edge on \"{}\" failed: {}", name, e);
                    return;
                }
                if stop.load(Ordering::Acquire) {
                    return;
                }
                callback();
            }
            Err(e) => {
                log::warn!("waiting for edge on \"{}\" failed: {}", name, e);
                return;
            }
        }
    }
}

fn open_error(name: &str, e: gpiocdev::Error) -> Error {
    let msg = e.to_string();
    if msg.contains("busy") {
        return Error::Open(name.into(), OpenErrorKind::Busy);
    }
    Error::Open(name.into(), OpenErrorKind::Backend(msg))
}

fn raw_to_value(level: RawLevel) -> Value {
    match level {
        RawLevel::High => Value::Active,
        RawLevel::Low => Value::Inactive,
    }
}

fn value_to_raw(value: Value) -> RawLevel {
    match value {
        Value::Active => RawLevel::High,
        Value::Inactive => RawLevel::Low,
    }
}

fn chip_path_from_id(id: &str) -> PathBuf {
    if id.chars().all(char::is_numeric) {
        return format!("/dev/gpiochip{id}").into();
    }
    if !id.contains('/') {
        let mut p: PathBuf = "/dev".into();
        p.push(id);
        return p;
    }
    id.into()
}

// Split a "chip:offset" identifier.
fn parse_chip_offset(name: &str) -> Option<(PathBuf, Offset)> {
    let (chip, offset) = name.rsplit_once(':')?;
    if chip.is_empty() {
        return None;
    }
    let offset = offset.parse::<Offset>().ok()?;
    Some((chip_path_from_id(chip), offset))
}
