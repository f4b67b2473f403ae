// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code)]

use gpiomirror::sim::Sim;
use gpiomirror::{ChannelSink, EdgeDetection, LogicalLevel, PinHandle, Polarity, Provider, Status};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

pub const BUTTON: &str = "BUTTON";
pub const LED: &str = "LED";

// the debounce period used by most tests
pub const PERIOD: Duration = Duration::from_millis(30);

// max time to wait for a status from a background thread
pub const STATUS_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// A sim with the button released and the LED off.
pub fn sim() -> Arc<Sim> {
    let sim = Arc::new(Sim::new(&[BUTTON, LED]));
    sim.pullup(BUTTON).unwrap();
    sim
}

pub fn open_pins(sim: &Sim, output_polarity: Polarity) -> (PinHandle, PinHandle) {
    let button = sim
        .open_input(BUTTON, EdgeDetection::Both, Polarity::ActiveLow)
        .unwrap();
    let led = sim
        .open_output(LED, output_polarity, LogicalLevel::Deasserted)
        .unwrap();
    (button, led)
}

pub fn channel() -> (ChannelSink, Receiver<Status>) {
    let (tx, rx) = mpsc::channel();
    (ChannelSink::new(tx), rx)
}

pub fn drain(rx: &Receiver<Status>) -> Vec<Status> {
    rx.try_iter().collect()
}
